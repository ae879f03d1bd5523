//! Fixed schedules that drive acquisition cycles.
//!
//! Two independent schedules exist:
//! - a [`WeeklySlot`] at the publisher's usual release day and time
//! - an [`HourlyCadence`] update check, aligned to midnight (every 6 hours
//!   fires at 00:00, 06:00, 12:00 and 18:00)
//!
//! Both compute their next firing time from "now" in any chrono time zone,
//! which keeps the background tasks in [`scheduler_task`](crate::scheduler_task)
//! trivial and the calendar arithmetic testable.
//!
//! # Example
//!
//! ```rust
//! use issue_dl::scheduler::{HourlyCadence, WeeklySlot, Weekday};
//! use chrono::{NaiveTime, TimeZone, Utc};
//!
//! let slot = WeeklySlot {
//!     day: Weekday::Wednesday,
//!     time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
//! };
//! // Monday 2024-01-01 12:00 UTC
//! let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
//! assert_eq!(
//!     slot.next_after(&now),
//!     Some(Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap())
//! );
//!
//! let cadence = HourlyCadence::new(6).unwrap();
//! assert_eq!(
//!     cadence.next_after(&now),
//!     Some(Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap())
//! );
//! ```

use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

/// Days of the week
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Weekday {
    /// Monday
    Monday,
    /// Tuesday
    Tuesday,
    /// Wednesday
    Wednesday,
    /// Thursday
    Thursday,
    /// Friday
    Friday,
    /// Saturday
    Saturday,
    /// Sunday
    Sunday,
}

impl Weekday {
    /// Convert from chrono::Weekday to our Weekday
    pub fn from_chrono(wd: chrono::Weekday) -> Self {
        use chrono::Weekday as ChronoWd;
        match wd {
            ChronoWd::Mon => Weekday::Monday,
            ChronoWd::Tue => Weekday::Tuesday,
            ChronoWd::Wed => Weekday::Wednesday,
            ChronoWd::Thu => Weekday::Thursday,
            ChronoWd::Fri => Weekday::Friday,
            ChronoWd::Sat => Weekday::Saturday,
            ChronoWd::Sun => Weekday::Sunday,
        }
    }

    /// Convert to chrono::Weekday
    pub fn to_chrono(self) -> chrono::Weekday {
        use chrono::Weekday as ChronoWd;
        match self {
            Weekday::Monday => ChronoWd::Mon,
            Weekday::Tuesday => ChronoWd::Tue,
            Weekday::Wednesday => ChronoWd::Wed,
            Weekday::Thursday => ChronoWd::Thu,
            Weekday::Friday => ChronoWd::Fri,
            Weekday::Saturday => ChronoWd::Sat,
            Weekday::Sunday => ChronoWd::Sun,
        }
    }
}

/// Weekly release slot: a day of the week and a local wall-clock time
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklySlot {
    /// Day of the week
    pub day: Weekday,

    /// Time of day (HH:MM:SS, 24-hour format)
    #[serde(with = "time_format")]
    pub time: NaiveTime,
}

impl Default for WeeklySlot {
    /// Wednesday 09:00
    fn default() -> Self {
        Self {
            day: Weekday::Wednesday,
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl WeeklySlot {
    /// First occurrence of this slot strictly after `now`
    ///
    /// Returns `None` only if the wall-clock time cannot be represented in
    /// the time zone on any candidate day, which chrono's DST handling makes
    /// practically impossible.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        let today = now.date_naive();
        let target = self.day.to_chrono();

        (0..=7)
            .filter_map(|offset| today.checked_add_signed(TimeDelta::days(offset)))
            .filter(|date| date.weekday() == target)
            .filter_map(|date| resolve_local(&tz, date.and_time(self.time)))
            .find(|candidate| candidate > now)
    }
}

/// Update-check cadence in whole hours, aligned to local midnight
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HourlyCadence {
    every_hours: u32,
}

impl HourlyCadence {
    /// Create a cadence; `every_hours` must divide 24
    pub fn new(every_hours: u32) -> Option<Self> {
        (every_hours > 0 && 24 % every_hours == 0).then_some(Self { every_hours })
    }

    /// Hours between checks
    pub fn every_hours(&self) -> u32 {
        self.every_hours
    }

    /// First aligned hour strictly after `now`
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        let hour_start = now.date_naive().and_hms_opt(now.hour(), 0, 0)?;

        // Two days of candidates covers any cadence plus a DST shift.
        (1..=48)
            .filter_map(|step| hour_start.checked_add_signed(TimeDelta::hours(step)))
            .filter(|candidate| candidate.hour() % self.every_hours == 0)
            .filter_map(|candidate| resolve_local(&tz, candidate))
            .find(|candidate| candidate > now)
    }
}

/// What the weekly slot does when the cache is already current
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeeklyPolicy {
    /// Run a full acquisition cycle unconditionally; the cycle's own
    /// comparison step turns it into a no-op when nothing changed
    #[default]
    Always,
    /// Behave like the update check: compare first, run the cycle only for a newer issue
    WhenNewer,
}

/// Map a local wall-clock time to an instant, stepping over DST gaps
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive).earliest().or_else(|| {
        let shifted = naive.checked_add_signed(TimeDelta::hours(1))?;
        tz.from_local_datetime(&shifted).earliest()
    })
}

/// Serde module for serializing/deserializing NaiveTime as HH:MM:SS strings
mod time_format {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = time.format("%H:%M:%S").to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M"))
            .map_err(serde::de::Error::custom)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
