#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

/// Source of "what calendar day is it" for the whole application.
///
/// Streaks and the daily task selection compare plain `NaiveDate`s in the
/// configured timezone, never UTC instants, so a task scheduled for
/// "2024-06-01" activates at local midnight regardless of UTC offset.
/// The `Fixed` variant lets tests pin the day.
#[derive(Debug, Clone, Copy)]
pub enum DayClock {
    System(Tz),
    Fixed(NaiveDate),
}

impl DayClock {
    /// Parses an IANA timezone name ("Europe/Berlin"). `None` if unknown.
    pub fn from_tz_name(name: &str) -> Option<Self> {
        name.trim().parse::<Tz>().ok().map(DayClock::System)
    }

    pub fn today(&self) -> NaiveDate {
        match self {
            DayClock::System(tz) => Utc::now().with_timezone(tz).date_naive(),
            DayClock::Fixed(day) => *day,
        }
    }

    pub fn yesterday(&self) -> NaiveDate {
        self.today() - Duration::days(1)
    }

    /// Projects a stored UTC instant onto the local calendar day.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            DayClock::System(tz) => instant.with_timezone(tz).date_naive(),
            DayClock::Fixed(_) => instant.date_naive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_timezone_parses() {
        assert!(DayClock::from_tz_name("Europe/Berlin").is_some());
        assert!(DayClock::from_tz_name(" UTC ").is_some());
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        assert!(DayClock::from_tz_name("Mars/Olympus_Mons").is_none());
    }

    #[test]
    fn test_fixed_clock_pins_the_day() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let clock = DayClock::Fixed(day);
        assert_eq!(clock.today(), day);
        assert_eq!(
            clock.yesterday(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()
        );
    }
}
