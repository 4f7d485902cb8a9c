//! Oldest-allowed timestamp resolution.
//!
//! The discovery window for a channel is bounded below by the later of two
//! dates: the configured horizon (shared by every channel of a run) and the
//! channel's own watermark. Taking the later of the two guarantees that
//! already-seen videos are never re-fetched and that the configured horizon
//! is never exceeded even for a channel seen for the first time.

use anyhow::{Context, Result};
use chrono::{DateTime, Days, Local, Months, NaiveDate, TimeZone, Utc};

use crate::config::{DurationUnit, SyncConfig, WindowMode};

/// Horizon shared by all channels of one run: local midnight of the
/// configured fixed date, or local midnight of `today` minus the configured
/// duration.
pub fn configured_horizon(sync: &SyncConfig, today: NaiveDate) -> Result<DateTime<Utc>> {
    let date = match sync.window {
        WindowMode::Duration => match sync.duration.unit {
            DurationUnit::Month => today
                .checked_sub_months(Months::new(sync.duration.value))
                .context("horizon underflows the calendar")?,
            DurationUnit::Day => today
                .checked_sub_days(Days::new(u64::from(sync.duration.value)))
                .context("horizon underflows the calendar")?,
        },
        // Presence and parseability are validated at configuration load.
        WindowMode::Date => sync
            .date
            .context("sync.date must be set when sync.window is \"date\"")?,
    };
    local_midnight(date)
}

/// Effective lower bound for one channel.
pub fn oldest_allowed(horizon: DateTime<Utc>, watermark: DateTime<Utc>) -> DateTime<Utc> {
    horizon.max(watermark)
}

pub(crate) fn local_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .context("invalid time of day")?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("could not resolve local midnight of {date}"))
        .map(|local| local.with_timezone(&Utc))
}
