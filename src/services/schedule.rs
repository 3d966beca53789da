//! Daily trigger time in a fixed UTC offset.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone, Utc};

/// Fires once a day at `at`, local to `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    pub at: NaiveTime,
    pub offset: FixedOffset,
}

impl DailySchedule {
    /// `offset_hours` east of UTC, e.g. 7 for Asia/Ho_Chi_Minh.
    pub fn new(at: NaiveTime, offset_hours: i32) -> anyhow::Result<Self> {
        let offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow::anyhow!("UTC offset out of range: {}", offset_hours))?;
        Ok(Self { at, offset })
    }

    /// First firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_now = now.with_timezone(&self.offset);
        let mut date = local_now.date_naive();
        loop {
            // A fixed offset has no gaps, so every local time maps to one instant
            if let Some(candidate) = self.offset.from_local_datetime(&date.and_time(self.at)).single() {
                let candidate = candidate.with_timezone(&Utc);
                if candidate > now {
                    return candidate;
                }
            }
            date = match date.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => return now,
            };
        }
    }

    /// Time to sleep from `now` until the next firing.
    pub fn until_next(&self, now: DateTime<Utc>) -> Duration {
        (self.next_after(now) - now).to_std().unwrap_or(Duration::ZERO)
    }
}

impl fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (UTC{})", self.at.format("%H:%M"), self.offset)
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| anyhow::anyhow!("Invalid time of day {:?}: {}", s, e))
}

impl FromStr for DailySchedule {
    type Err = anyhow::Error;

    /// `HH:MM` in UTC, or `HH:MM@+7` with an hour offset.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (time, offset) = match s.split_once('@') {
            Some((time, offset)) => (time, offset.trim_start_matches('+').parse()?),
            None => (s, 0),
        };
        Self::new(parse_time_of_day(time.trim())?, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn hanoi_morning() -> DailySchedule {
        DailySchedule::new(NaiveTime::from_hms_opt(7, 30, 0).unwrap(), 7).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        // 06:00 in Hanoi
        let next = hanoi_morning().next_after(utc("2024-05-01T23:00:00Z"));
        assert_eq!(next, utc("2024-05-02T00:30:00Z"));
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        // 08:00 in Hanoi
        let next = hanoi_morning().next_after(utc("2024-05-02T01:00:00Z"));
        assert_eq!(next, utc("2024-05-03T00:30:00Z"));
    }

    #[test]
    fn test_exact_firing_time_schedules_next_day() {
        let next = hanoi_morning().next_after(utc("2024-05-02T00:30:00Z"));
        assert_eq!(next, utc("2024-05-03T00:30:00Z"));
    }

    #[test]
    fn test_until_next() {
        let wait = hanoi_morning().until_next(utc("2024-05-02T00:00:00Z"));
        assert_eq!(wait, Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_parse_schedule() {
        let schedule: DailySchedule = "07:30@+7".parse().unwrap();
        assert_eq!(schedule, hanoi_morning());
        let utc_schedule: DailySchedule = "18:05".parse().unwrap();
        assert_eq!(utc_schedule.offset, FixedOffset::east_opt(0).unwrap());
        assert!("25:00".parse::<DailySchedule>().is_err());
        assert!(DailySchedule::new(NaiveTime::MIN, 30).is_err());
        assert!(DailySchedule::new(NaiveTime::MIN, 1_000_000).is_err());
        assert!(DailySchedule::new(NaiveTime::MIN, i32::MIN).is_err());
    }
}
