// Resampling of raw inverter samples onto the day grid
use crate::domain::day_matrix::DayMatrix;
use crate::domain::raw_day::RawDaySample;
use crate::domain::time_grid::TimeGrid;
use crate::domain::topology::DeviceTopology;

/// Row order for a day: topology devices present in the payload first, then
/// devices the topology does not know in ascending id order.
fn row_order(raw: &RawDaySample, topology: Option<&DeviceTopology>) -> Vec<String> {
    let Some(topology) = topology else {
        return raw.devices.keys().cloned().collect();
    };

    let mut order: Vec<String> = topology
        .devices()
        .iter()
        .filter(|d| raw.devices.contains_key(d.as_str()))
        .cloned()
        .collect();

    let unknown: Vec<String> = raw
        .devices
        .keys()
        .filter(|d| topology.position(d).is_none())
        .cloned()
        .collect();
    if !unknown.is_empty() {
        tracing::warn!(
            "{} device(s) on {} missing from topology, appending: {:?}",
            unknown.len(),
            raw.date,
            unknown
        );
    }
    order.extend(unknown);
    order
}

/// Builds the dense matrix for one day.
///
/// Samples are placed at `floor((ts - local_midnight) / step)`; later samples
/// overwrite earlier ones in the same slot and samples outside the day are
/// dropped.
pub fn resample_day(
    raw: &RawDaySample,
    grid: &TimeGrid,
    topology: Option<&DeviceTopology>,
) -> DayMatrix {
    let start_ts = grid.start_timestamp(raw.date);
    let devices = row_order(raw, topology);
    let mut matrix = DayMatrix::zeros(raw.date, devices.clone(), grid.len());

    for (row, device_id) in devices.iter().enumerate() {
        let Some(channels) = raw.devices.get(device_id) else {
            continue;
        };
        for sample in channels.power() {
            match grid.slot_for_timestamp(start_ts, sample.timestamp) {
                Some(slot) => matrix.set(row, slot, sample.value),
                None => {
                    tracing::debug!(
                        "Dropping out-of-day sample for {} at {} (day starts {})",
                        device_id,
                        sample.timestamp,
                        start_ts
                    );
                    matrix.record_dropped();
                }
            }
        }
    }

    if matrix.dropped_samples() > 0 {
        tracing::debug!(
            "Resampled {}: {} device(s), {} sample(s) dropped",
            raw.date,
            matrix.devices().len(),
            matrix.dropped_samples()
        );
    }
    matrix
}
