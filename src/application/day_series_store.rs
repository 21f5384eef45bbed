// Day series store - Cached resampled matrices and the views built on them
use crate::application::portal_repository::PortalRepository;
use crate::domain::day_matrix::DayMatrix;
use crate::domain::error::{EnlightenError, Result};
use crate::domain::resampling::resample_day;
use crate::domain::series::{ArrayPower, DeviceSeries, Orientation, SystemSeries, TotalsSeries};
use crate::domain::time_grid::TimeGrid;
use crate::domain::topology::DeviceTopology;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, RwLock};

/// Owns the time grid and one resampled matrix per requested date.
///
/// Each date has its own cell, so concurrent callers for the same date share
/// a single fetch. A failed fetch removes the date's cell and the next call
/// tries again.
pub struct DaySeriesStore {
    repository: Arc<dyn PortalRepository>,
    grid: TimeGrid,
    topology: RwLock<Option<Arc<DeviceTopology>>>,
    days: Mutex<HashMap<NaiveDate, Arc<OnceCell<Arc<DayMatrix>>>>>,
}

impl DaySeriesStore {
    pub fn new(repository: Arc<dyn PortalRepository>, grid: TimeGrid) -> Self {
        Self {
            repository,
            grid,
            topology: RwLock::new(None),
            days: Mutex::new(HashMap::new()),
        }
    }

    /// Device ordering, loaded from the repository on first use.
    pub async fn topology(&self) -> Result<Arc<DeviceTopology>> {
        if let Some(topology) = self.topology.read().await.as_ref() {
            return Ok(topology.clone());
        }

        let mut slot = self.topology.write().await;
        if let Some(topology) = slot.as_ref() {
            return Ok(topology.clone());
        }
        let topology = Arc::new(self.repository.device_topology().await?);
        if topology.is_empty() {
            tracing::warn!("Portal reported an empty device topology");
        } else {
            tracing::info!("Loaded topology with {} device(s)", topology.len());
        }
        *slot = Some(topology.clone());
        Ok(topology)
    }

    /// Rediscovers the device ordering. Cached days keep the order they were
    /// built with.
    pub async fn refresh_topology(&self) -> Result<Arc<DeviceTopology>> {
        let topology = Arc::new(self.repository.refresh_device_topology().await?);
        tracing::info!("Refreshed topology: {} device(s)", topology.len());
        *self.topology.write().await = Some(topology.clone());
        Ok(topology)
    }

    /// Drops a cached day so the next query fetches it again.
    pub async fn evict(&self, date: NaiveDate) -> bool {
        self.days.lock().await.remove(&date).is_some()
    }

    async fn day(&self, date: NaiveDate) -> Result<Arc<DayMatrix>> {
        let cell = {
            let mut days = self.days.lock().await;
            days.entry(date).or_default().clone()
        };
        match cell.get_or_try_init(|| self.ingest(date)).await {
            Ok(matrix) => Ok(matrix.clone()),
            Err(e) => {
                let mut days = self.days.lock().await;
                let unfilled = days
                    .get(&date)
                    .is_some_and(|current| Arc::ptr_eq(current, &cell) && current.get().is_none());
                if unfilled {
                    days.remove(&date);
                }
                Err(e)
            }
        }
    }

    #[cfg(test)]
    async fn cached_dates(&self) -> usize {
        self.days.lock().await.len()
    }

    async fn ingest(&self, date: NaiveDate) -> Result<Arc<DayMatrix>> {
        tracing::info!("Fetching inverter data for {}", date);
        let raw = self.repository.fetch_raw_day(date).await?;
        if raw.date != date {
            return Err(EnlightenError::Payload(format!(
                "requested {} but portal returned {}",
                date, raw.date
            )));
        }

        let topology = match self.topology().await {
            Ok(topology) => Some(topology),
            Err(e) => {
                tracing::warn!("Topology unavailable, ordering rows by device id: {}", e);
                None
            }
        };

        let matrix = resample_day(&raw, &self.grid, topology.as_deref());
        tracing::debug!(
            "Cached {} with {} device(s) x {} slot(s)",
            matrix.date(),
            matrix.devices().len(),
            matrix.slot_count()
        );
        Ok(Arc::new(matrix))
    }

    /// Power series of one device, or `None` when the device reported
    /// nothing that day.
    pub async fn device_series(
        &self,
        date: NaiveDate,
        device_id: &str,
    ) -> Result<Option<DeviceSeries>> {
        let matrix = self.day(date).await?;
        Ok(matrix.device_row(device_id).map(|row| DeviceSeries {
            device_id: device_id.to_string(),
            time_axis: self.grid.time_axis(date),
            values: row.to_vec(),
        }))
    }

    pub async fn system_series(&self, date: NaiveDate, transpose: bool) -> Result<SystemSeries> {
        let matrix = self.day(date).await?;
        let (orientation, rows) = if transpose {
            (Orientation::TimeMajor, matrix.transpose())
        } else {
            (Orientation::DeviceMajor, matrix.rows().to_vec())
        };

        Ok(SystemSeries {
            time_axis: self.grid.time_axis(date),
            devices: matrix.devices().to_vec(),
            orientation,
            rows,
        })
    }

    pub async fn totals_series(&self, date: NaiveDate) -> Result<TotalsSeries> {
        let matrix = self.day(date).await?;
        Ok(TotalsSeries {
            time_axis: self.grid.time_axis(date),
            values: matrix.totals(),
        })
    }

    /// Per-device power at the grid slot nearest to `instant`.
    pub async fn power_at_instant(&self, instant: DateTime<Utc>) -> Result<ArrayPower> {
        let (date, slot) = self.grid.nearest_slot(instant);
        let series = self.system_series(date, true).await?;

        Ok(ArrayPower {
            at: series.time_axis[slot],
            devices: series.devices,
            values: series.rows[slot].clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::raw_day::{ChannelSample, DeviceChannels, RawDaySample};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockPortal {
        days: HashMap<NaiveDate, RawDaySample>,
        topology: DeviceTopology,
        fetches: AtomicUsize,
        failures_left: AtomicUsize,
    }

    impl MockPortal {
        fn new(days: Vec<RawDaySample>, topology: Vec<&str>) -> Self {
            Self {
                days: days.into_iter().map(|d| (d.date, d)).collect(),
                topology: DeviceTopology::new(topology.into_iter().map(String::from).collect()),
                fetches: AtomicUsize::new(0),
                failures_left: AtomicUsize::new(0),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PortalRepository for MockPortal {
        async fn fetch_raw_day(&self, date: NaiveDate) -> Result<RawDaySample> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(EnlightenError::AuthenticationExpired);
            }
            self.days
                .get(&date)
                .cloned()
                .ok_or_else(|| EnlightenError::InvalidDate(date.to_string()))
        }

        async fn device_topology(&self) -> Result<DeviceTopology> {
            Ok(self.topology.clone())
        }

        async fn refresh_device_topology(&self) -> Result<DeviceTopology> {
            Ok(DeviceTopology::new(vec!["NEW".to_string()]))
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 4, 22).unwrap()
    }

    fn grid() -> TimeGrid {
        TimeGrid::new(-5, 15).unwrap()
    }

    fn power(samples: &[(i64, f64)]) -> DeviceChannels {
        DeviceChannels::with_power(
            samples
                .iter()
                .map(|(ts, p)| ChannelSample::new(*ts, *p))
                .collect(),
        )
    }

    /// Two inverters; INV2 sits left of INV1 on the array.
    fn sample_day() -> RawDaySample {
        let ts0 = grid().start_timestamp(date());
        RawDaySample::new(date())
            .with_device("INV1", power(&[(ts0 + 900, 250.0), (ts0 + 48 * 900, 310.0)]))
            .with_device("INV2", power(&[(ts0 + 900, 120.0), (ts0 + 49 * 900 + 30, 90.0)]))
    }

    fn store_with(portal: Arc<MockPortal>) -> DaySeriesStore {
        DaySeriesStore::new(portal, grid())
    }

    #[tokio::test]
    async fn test_device_series_places_sample() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal.clone());

        let series = store.device_series(date(), "INV1").await.unwrap().unwrap();
        assert_eq!(series.values.len(), 96);
        assert_eq!(series.values[1], 250.0);
        assert_eq!(series.values[48], 310.0);
        assert_eq!(series.time_axis[0], grid().day_start(date()));
    }

    #[tokio::test]
    async fn test_unknown_device_is_none_after_fetch() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal.clone());

        let result = store.device_series(date(), "unknown-device").await.unwrap();
        assert!(result.is_none());
        assert_eq!(portal.fetches(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_refetch() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal.clone());

        store.totals_series(date()).await.unwrap();
        store.system_series(date(), false).await.unwrap();
        store.device_series(date(), "INV2").await.unwrap();
        assert_eq!(portal.fetches(), 1);

        assert!(store.evict(date()).await);
        store.totals_series(date()).await.unwrap();
        assert_eq!(portal.fetches(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_queries_share_one_fetch() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal.clone());

        let (a, b, c) = tokio::join!(
            store.totals_series(date()),
            store.system_series(date(), true),
            store.device_series(date(), "INV1"),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(portal.fetches(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates_and_retries() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        portal.failures_left.store(1, Ordering::SeqCst);
        let store = store_with(portal.clone());

        let first = store.totals_series(date()).await;
        assert!(matches!(first, Err(EnlightenError::AuthenticationExpired)));

        let second = store.totals_series(date()).await.unwrap();
        assert_eq!(second.values[1], 370.0);
        assert_eq!(portal.fetches(), 2);
    }

    #[tokio::test]
    async fn test_invalid_date_propagates() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal);

        let other = NaiveDate::from_ymd_opt(2020, 4, 23).unwrap();
        assert!(matches!(
            store.system_series(other, false).await,
            Err(EnlightenError::InvalidDate(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_dates_are_not_cached() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal);

        for day in 1..=20 {
            let rejected = NaiveDate::from_ymd_opt(2021, 1, day).unwrap();
            assert!(store.totals_series(rejected).await.is_err());
        }
        assert_eq!(store.cached_dates().await, 0);

        store.totals_series(date()).await.unwrap();
        assert_eq!(store.cached_dates().await, 1);
    }

    #[tokio::test]
    async fn test_rows_follow_topology_order() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal);

        let system = store.system_series(date(), false).await.unwrap();
        assert_eq!(system.devices, ["INV2", "INV1"]);
        assert_eq!(system.orientation, Orientation::DeviceMajor);
        assert_eq!(system.rows[0][1], 120.0);
        assert_eq!(system.rows[1][1], 250.0);
    }

    #[tokio::test]
    async fn test_transpose_and_totals_agree_with_matrix() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal);

        let by_device = store.system_series(date(), false).await.unwrap();
        let by_time = store.system_series(date(), true).await.unwrap();
        let totals = store.totals_series(date()).await.unwrap();

        assert_eq!(by_time.orientation, Orientation::TimeMajor);
        assert_eq!(by_time.rows.len(), 96);
        for slot in 0..96 {
            let mut sum = 0.0;
            for device in 0..by_device.rows.len() {
                assert_eq!(by_time.rows[slot][device], by_device.rows[device][slot]);
                sum += by_device.rows[device][slot];
            }
            assert_eq!(totals.values[slot], sum);
        }
    }

    #[tokio::test]
    async fn test_power_at_instant_on_boundary() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal);

        let noon = grid().day_start(date()) + Duration::minutes(48 * 15);
        let reading = store.power_at_instant(noon).await.unwrap();

        assert_eq!(reading.at, noon);
        assert_eq!(reading.devices, ["INV2", "INV1"]);
        assert_eq!(reading.values, vec![0.0, 310.0]);
    }

    #[tokio::test]
    async fn test_power_at_instant_rounds_to_nearest_slot() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal);

        // 12:07:30 local is exactly half way and rounds up to 12:15.
        let halfway = Utc.with_ymd_and_hms(2020, 4, 22, 17, 7, 30).unwrap();
        let reading = store.power_at_instant(halfway).await.unwrap();
        assert_eq!(reading.at, Utc.with_ymd_and_hms(2020, 4, 22, 17, 15, 0).unwrap());
        assert_eq!(reading.values, vec![90.0, 0.0]);
    }

    #[tokio::test]
    async fn test_refresh_topology_replaces_order() {
        let portal = Arc::new(MockPortal::new(vec![sample_day()], vec!["INV2", "INV1"]));
        let store = store_with(portal);

        assert_eq!(store.topology().await.unwrap().devices(), ["INV2", "INV1"]);
        assert_eq!(store.refresh_topology().await.unwrap().devices(), ["NEW"]);
        assert_eq!(store.topology().await.unwrap().devices(), ["NEW"]);
    }
}
