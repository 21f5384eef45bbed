// Raw per-day inverter payload, as decoded from the portal
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Channel carrying AC power output in watts.
pub const POWER_CHANNEL: &str = "POWR";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSample {
    pub timestamp: i64,
    pub value: f64,
}

#[cfg(test)]
impl ChannelSample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Samples for one device keyed by channel name (`POWR`, `DCV`, `ACHZ`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceChannels {
    pub channels: BTreeMap<String, Vec<ChannelSample>>,
}

impl DeviceChannels {
    #[cfg(test)]
    pub fn with_power(samples: Vec<ChannelSample>) -> Self {
        let mut channels = BTreeMap::new();
        channels.insert(POWER_CHANNEL.to_string(), samples);
        Self { channels }
    }

    pub fn power(&self) -> &[ChannelSample] {
        self.channels
            .get(POWER_CHANNEL)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDaySample {
    pub date: NaiveDate,
    pub devices: BTreeMap<String, DeviceChannels>,
}

impl RawDaySample {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            devices: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with_device(mut self, device_id: impl Into<String>, channels: DeviceChannels) -> Self {
        self.devices.insert(device_id.into(), channels);
        self
    }
}
