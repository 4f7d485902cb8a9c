//! Upload date → playlist name assignment.
//!
//! The assignment is a pure function of the upload timestamp, the configured
//! strategy, and the playlist prefix, so repeated calls with the same input
//! always name the same playlist. Dates are taken in local time. Weekly
//! buckets pair the ISO week number with the ISO week-year, so the week
//! spanning a calendar-year boundary maps to a single playlist.

use chrono::{DateTime, Datelike, Local, Utc};

use crate::config::Strategy;

/// Playlist name for a video uploaded at `uploaded`.
///
/// Monthly: `"{prefix}{year} {MonthName}"`, e.g. `"PF - 2024 March"`.
/// Weekly: `"{prefix}{iso_year} Week {iso_week}"`, e.g. `"PF - 2024 Week 10"`.
pub fn playlist_for(uploaded: DateTime<Utc>, strategy: Strategy, prefix: &str) -> String {
    let local = uploaded.with_timezone(&Local);
    match strategy {
        Strategy::Month => format!("{}{} {}", prefix, local.year(), local.format("%B")),
        Strategy::Week => {
            let week = local.iso_week();
            format!("{}{} Week {}", prefix, week.year(), week.week())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn monthly_names_year_and_month() {
        assert_eq!(
            playlist_for(noon(2024, 3, 15), Strategy::Month, "PF - "),
            "PF - 2024 March"
        );
    }

    #[test]
    fn weekly_names_iso_week() {
        // 2024-03-05 falls in ISO week 10 of 2024.
        assert_eq!(
            playlist_for(noon(2024, 3, 5), Strategy::Week, "PF - "),
            "PF - 2024 Week 10"
        );
    }

    #[test]
    fn weekly_uses_iso_week_year_at_boundary() {
        // 2025-12-29 is a Monday belonging to ISO week 1 of 2026.
        assert_eq!(
            playlist_for(noon(2025, 12, 29), Strategy::Week, "PF - "),
            "PF - 2026 Week 1"
        );
    }

    #[test]
    fn assignment_is_deterministic() {
        let ts = noon(2024, 7, 4);
        let first = playlist_for(ts, Strategy::Week, "Mirror ");
        let second = playlist_for(ts, Strategy::Week, "Mirror ");
        assert_eq!(first, second);
    }
}
