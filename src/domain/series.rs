// Query view models derived from a day matrix
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSeries {
    pub device_id: String,
    pub time_axis: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    /// One row per device.
    DeviceMajor,
    /// One row per time slot.
    TimeMajor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSeries {
    pub time_axis: Vec<DateTime<Utc>>,
    pub devices: Vec<String>,
    pub orientation: Orientation,
    pub rows: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsSeries {
    pub time_axis: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl TotalsSeries {
    /// Highest whole-system power of the day with its instant.
    pub fn peak(&self) -> Option<PowerReading> {
        self.time_axis
            .iter()
            .zip(&self.values)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(at, watts)| PowerReading {
                at: *at,
                watts: *watts,
            })
    }

    /// Last slot that reported any power.
    pub fn latest(&self) -> Option<PowerReading> {
        self.time_axis
            .iter()
            .zip(&self.values)
            .rev()
            .find(|(_, watts)| **watts != 0.0)
            .map(|(at, watts)| PowerReading {
                at: *at,
                watts: *watts,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerReading {
    pub at: DateTime<Utc>,
    pub watts: f64,
}

/// Per-device power at a single grid instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayPower {
    pub at: DateTime<Utc>,
    pub devices: Vec<String>,
    pub values: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn totals(values: Vec<f64>) -> TotalsSeries {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let time_axis = (0..values.len())
            .map(|i| start + chrono::Duration::hours(i as i64))
            .collect();
        TotalsSeries { time_axis, values }
    }

    #[test]
    fn test_peak_and_latest() {
        let series = totals(vec![0.0, 120.0, 480.5, 300.0, 0.0]);

        let peak = series.peak().unwrap();
        assert_eq!(peak.watts, 480.5);
        assert_eq!(peak.at, series.time_axis[2]);

        let latest = series.latest().unwrap();
        assert_eq!(latest.watts, 300.0);
        assert_eq!(latest.at, series.time_axis[3]);
    }

    #[test]
    fn test_latest_of_dark_day_is_none() {
        assert!(totals(vec![0.0; 4]).latest().is_none());
        assert!(totals(Vec::new()).peak().is_none());
    }
}
