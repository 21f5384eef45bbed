// HTTP request handlers
use crate::domain::series::{ArrayPower, DeviceSeries, PowerReading, SystemSeries, TotalsSeries};
use crate::domain::topology::DeviceTopology;
use crate::presentation::api_error::ApiError;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct DevicesQuery {
    pub refresh: Option<bool>,
}

#[derive(Deserialize)]
pub struct SystemQuery {
    pub transpose: Option<bool>,
}

#[derive(Deserialize)]
pub struct PowerQuery {
    pub at: String,
}

#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    #[serde(flatten)]
    pub series: TotalsSeries,
    pub peak: Option<PowerReading>,
    pub latest: Option<PowerReading>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("expected YYYY-MM-DD, got {:?}", raw)))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Inverters in array order
pub async fn list_devices(
    Query(query): Query<DevicesQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeviceTopology>, ApiError> {
    let topology = if query.refresh.unwrap_or(false) {
        state.store.refresh_topology().await?
    } else {
        state.store.topology().await?
    };
    Ok(Json(topology.as_ref().clone()))
}

pub async fn device_series(
    Path((date, device_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeviceSeries>, ApiError> {
    let date = parse_date(&date)?;
    state
        .store
        .device_series(date, &device_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no data for device {} on {}", device_id, date)))
}

pub async fn system_series(
    Path(date): Path<String>,
    Query(query): Query<SystemQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemSeries>, ApiError> {
    let date = parse_date(&date)?;
    let series = state
        .store
        .system_series(date, query.transpose.unwrap_or(false))
        .await?;
    Ok(Json(series))
}

pub async fn totals_series(
    Path(date): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<TotalsResponse>, ApiError> {
    let date = parse_date(&date)?;
    let series = state.store.totals_series(date).await?;
    let peak = series.peak();
    let latest = series.latest();
    Ok(Json(TotalsResponse {
        series,
        peak,
        latest,
    }))
}

/// Per-inverter power at the grid slot nearest to `at` (RFC 3339)
pub async fn array_power(
    Query(query): Query<PowerQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ArrayPower>, ApiError> {
    let at = DateTime::parse_from_rfc3339(&query.at)
        .map_err(|e| ApiError::BadRequest(format!("bad instant {:?}: {}", query.at, e)))?
        .with_timezone(&Utc);
    Ok(Json(state.store.power_at_instant(at).await?))
}
