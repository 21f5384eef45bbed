// Dense device x slot power matrix for one day

use chrono::NaiveDate;

/// Power per device (rows) per time slot (columns) for one calendar day.
///
/// Rows follow `devices`; every row has `slot_count` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct DayMatrix {
    date: NaiveDate,
    devices: Vec<String>,
    rows: Vec<Vec<f64>>,
    slot_count: usize,
    dropped_samples: usize,
}

impl DayMatrix {
    /// Zero-filled matrix for the given devices.
    pub fn zeros(date: NaiveDate, devices: Vec<String>, slot_count: usize) -> Self {
        let rows = vec![vec![0.0; slot_count]; devices.len()];
        Self {
            date,
            devices,
            rows,
            slot_count,
            dropped_samples: 0,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Samples that fell outside the day while the matrix was built.
    pub fn dropped_samples(&self) -> usize {
        self.dropped_samples
    }

    pub fn position(&self, device_id: &str) -> Option<usize> {
        self.devices.iter().position(|d| d == device_id)
    }

    pub fn device_row(&self, device_id: &str) -> Option<&[f64]> {
        self.position(device_id).map(|i| self.rows[i].as_slice())
    }

    pub(crate) fn set(&mut self, device: usize, slot: usize, value: f64) {
        self.rows[device][slot] = value;
    }

    pub(crate) fn record_dropped(&mut self) {
        self.dropped_samples += 1;
    }

    /// Time-major view: one row per slot, one value per device.
    pub fn transpose(&self) -> Vec<Vec<f64>> {
        (0..self.slot_count)
            .map(|slot| self.rows.iter().map(|row| row[slot]).collect())
            .collect()
    }

    /// Whole-system power per slot.
    pub fn totals(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.slot_count];
        for row in &self.rows {
            for (total, value) in totals.iter_mut().zip(row) {
                *total += value;
            }
        }
        totals
    }
}
