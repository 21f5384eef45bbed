// Fixed per-day time grid
use crate::domain::error::{EnlightenError, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Evenly spaced minute offsets covering one local day.
///
/// Offsets are minutes past UTC midnight of the requested date, so the first
/// entry is local midnight under the configured whole-hour UTC offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeGrid {
    time_step: u32,
    zone: FixedOffset,
    offsets: Vec<i64>,
}

impl TimeGrid {
    pub fn new(utc_offset: i32, time_step: u32) -> Result<Self> {
        if time_step == 0 || MINUTES_PER_DAY % time_step != 0 {
            return Err(EnlightenError::Configuration(format!(
                "time_step must be a positive divisor of {} minutes, got {}",
                MINUTES_PER_DAY, time_step
            )));
        }
        if !(-12..=14).contains(&utc_offset) {
            return Err(EnlightenError::Configuration(format!(
                "utc_offset must be within -12..=14 hours, got {}",
                utc_offset
            )));
        }

        let zone = FixedOffset::east_opt(utc_offset * 3600).ok_or_else(|| {
            EnlightenError::Configuration(format!("invalid utc_offset {}", utc_offset))
        })?;

        let start = -i64::from(utc_offset) * 60;
        let end = (24 - i64::from(utc_offset)) * 60;
        let offsets = (start..end).step_by(time_step as usize).collect();

        Ok(Self {
            time_step,
            zone,
            offsets,
        })
    }

    pub fn step_seconds(&self) -> i64 {
        i64::from(self.time_step) * 60
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    /// Most negative offset; the grid is never empty.
    pub fn first_offset(&self) -> i64 {
        self.offsets[0]
    }

    /// Local midnight of `date` as an absolute instant (slot 0).
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc() + Duration::minutes(self.first_offset())
    }

    pub fn start_timestamp(&self, date: NaiveDate) -> i64 {
        self.day_start(date).timestamp()
    }

    /// Absolute instants of every slot for `date`.
    pub fn time_axis(&self, date: NaiveDate) -> Vec<DateTime<Utc>> {
        let midnight = date.and_time(NaiveTime::MIN).and_utc();
        self.offsets()
            .iter()
            .map(|m| midnight + Duration::minutes(*m))
            .collect()
    }

    /// Slot a raw sample falls into, or `None` when it lies outside the day.
    pub fn slot_for_timestamp(&self, start_ts: i64, timestamp: i64) -> Option<usize> {
        let slot = timestamp.checked_sub(start_ts)?.div_euclid(self.step_seconds());
        usize::try_from(slot).ok().filter(|s| *s < self.len())
    }

    /// Calendar date of `instant` in the grid's local zone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.zone).date_naive()
    }

    /// Nearest slot to `instant`, with the local date that slot belongs to.
    ///
    /// Exact halves round up (`f64::round`). An instant in the last half step
    /// of a day is nearest to slot 0 of the following day.
    pub fn nearest_slot(&self, instant: DateTime<Utc>) -> (NaiveDate, usize) {
        let date = self.local_date(instant);
        let elapsed_ms = (instant - self.day_start(date)).num_milliseconds() as f64;
        let slot = (elapsed_ms / (self.step_seconds() as f64 * 1000.0)).round() as usize;

        if slot < self.len() {
            return (date, slot);
        }
        match date.succ_opt() {
            Some(next) => (next, 0),
            None => (date, self.len() - 1),
        }
    }
}
