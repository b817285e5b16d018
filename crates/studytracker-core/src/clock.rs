//! Wall-clock access and duration formatting.
//!
//! Everything that needs "now" goes through a [`Clock`] so tests can move
//! time independently of the ticks an engine receives.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local, NaiveDate, SecondsFormat, SubsecRound, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current UTC instant.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Calendar date in the local timezone at `now_utc()`.
    fn today(&self) -> NaiveDate {
        self.now_utc().with_timezone(&Local).date_naive()
    }
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Current instant truncated to whole seconds.
pub fn utc_now_secs(clock: &dyn Clock) -> DateTime<Utc> {
    clock.now_utc().trunc_subsecs(0)
}

/// ISO-8601 text used for every stored timestamp, e.g. `2024-03-01T08:15:00+00:00`.
pub fn to_iso(at: DateTime<Utc>) -> String {
    at.trunc_subsecs(0).to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// `YYYY-MM-DD`, the grouping key for all daily aggregates.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Format seconds as `HH:MM:SS`. Hours keep counting past 24.
pub fn fmt_hms(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// Countdown display, `MM:SS`.
pub fn fmt_mmss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hms_formatting() {
        assert_eq!(fmt_hms(0), "00:00:00");
        assert_eq!(fmt_hms(59), "00:00:59");
        assert_eq!(fmt_hms(3661), "01:01:01");
        assert_eq!(fmt_hms(90_000), "25:00:00");
    }

    #[test]
    fn mmss_formatting() {
        assert_eq!(fmt_mmss(25 * 60), "25:00");
        assert_eq!(fmt_mmss(61), "01:01");
    }

    #[test]
    fn iso_drops_subseconds() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 0).unwrap()
            + Duration::milliseconds(750);
        assert_eq!(to_iso(at), "2024-03-01T08:15:00+00:00");
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let other = clock.clone();
        other.advance_secs(90);
        assert_eq!(clock.now_utc(), start + Duration::seconds(90));
    }

    #[test]
    fn date_key_is_iso_date() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(date_key(d), "2024-01-09");
    }
}
