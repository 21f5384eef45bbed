// Device topology domain model
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A module as placed on the array layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedModule {
    pub device_id: String,
    pub x: f64,
}

/// Inverter ids ordered by physical position along the array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTopology {
    devices: Vec<String>,
}

impl DeviceTopology {
    /// Builds a topology from ids already in array order. Duplicates keep
    /// their first position.
    pub fn new(devices: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let devices = devices
            .into_iter()
            .filter(|d| seen.insert(d.clone()))
            .collect();
        Self { devices }
    }

    /// Orders modules by ascending x-position.
    pub fn from_layout(mut modules: Vec<PlacedModule>) -> Self {
        modules.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self::new(modules.into_iter().map(|m| m.device_id).collect())
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn position(&self, device_id: &str) -> Option<usize> {
        self.devices.iter().position(|d| d == device_id)
    }
}
