// Domain layer - Grid, topology and resampling of inverter telemetry
pub mod day_matrix;
pub mod error;
pub mod raw_day;
pub mod resampling;
pub mod series;
pub mod time_grid;
pub mod topology;
