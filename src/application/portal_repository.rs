// Repository trait for monitoring portal access
use crate::domain::error::Result;
use crate::domain::raw_day::RawDaySample;
use crate::domain::topology::DeviceTopology;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait PortalRepository: Send + Sync {
    /// Raw inverter samples for one calendar day.
    /// Fails with `AuthenticationExpired` or `InvalidDate` where the portal says so.
    async fn fetch_raw_day(&self, date: NaiveDate) -> Result<RawDaySample>;

    /// Device ordering, from persisted config when available.
    async fn device_topology(&self) -> Result<DeviceTopology>;

    /// Rediscover the device ordering from the portal.
    async fn refresh_device_topology(&self) -> Result<DeviceTopology>;
}
