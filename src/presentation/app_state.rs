// Application state for HTTP handlers
use crate::application::day_series_store::DaySeriesStore;

pub struct AppState {
    pub store: DaySeriesStore,
}
