//! Reporting window arithmetic.
//!
//! A report covers the week ending on the configured weekday and hour. Items are
//! filtered against a wider retention floor reaching six months further back, so
//! slow-moving work still shows up in the weekly report.

use crate::error::ConfigError;
use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

const RETENTION_MONTHS: u32 = 6;

/// A validated day-of-week and hour at which a reporting week ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportingSchedule {
    day: Weekday,
    time: NaiveTime,
}

impl ReportingSchedule {
    /// `day_of_week` is ISO numbered, Monday = 1 through Sunday = 7.
    pub fn new(day_of_week: u32, hour: u32) -> Result<Self, ConfigError> {
        let day = day_of_week
            .checked_sub(1)
            .and_then(|idx| WEEKDAYS.get(idx as usize))
            .copied()
            .ok_or(ConfigError::InvalidDayOfWeek(day_of_week))?;
        let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or(ConfigError::InvalidHour(hour))?;
        Ok(Self { day, time })
    }

    pub fn day(&self) -> Weekday {
        self.day
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingWindow {
    /// Start of the current reporting week.
    pub start: DateTime<Utc>,
    /// End of the current reporting week.
    pub end: DateTime<Utc>,
    /// Oldest activity still considered by collection.
    pub min_start: DateTime<Utc>,
    pub min_end: DateTime<Utc>,
}

impl ReportingWindow {
    /// Computes the window for the week containing `now`.
    ///
    /// `end` lands on the schedule's weekday within the same Monday-based week as
    /// `now`, so it may lie ahead of `now`.
    pub fn compute(now: DateTime<Utc>, schedule: &ReportingSchedule) -> Self {
        let today = now.date_naive();
        let offset = i64::from(schedule.day.num_days_from_monday())
            - i64::from(today.weekday().num_days_from_monday());
        let end = (today + Duration::days(offset))
            .and_time(schedule.time)
            .and_utc();
        let start = end - Duration::weeks(1);
        let min_start = start
            .checked_sub_months(Months::new(RETENTION_MONTHS))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Self {
            start,
            end,
            min_start,
            min_end: end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_schedule_validation() {
        assert!(ReportingSchedule::new(1, 0).is_ok());
        assert!(ReportingSchedule::new(7, 23).is_ok());
        assert!(matches!(
            ReportingSchedule::new(0, 12),
            Err(ConfigError::InvalidDayOfWeek(0))
        ));
        assert!(matches!(
            ReportingSchedule::new(8, 12),
            Err(ConfigError::InvalidDayOfWeek(8))
        ));
        assert!(matches!(
            ReportingSchedule::new(4, 24),
            Err(ConfigError::InvalidHour(24))
        ));
    }

    #[test]
    fn test_compute_default_schedule() {
        // 2024-01-10 is a Wednesday.
        let now = utc(2024, 1, 10, 15, 37, 12);
        let schedule = ReportingSchedule::new(4, 12).unwrap();
        let window = ReportingWindow::compute(now, &schedule);

        assert_eq!(window.end, utc(2024, 1, 11, 12, 0, 0));
        assert_eq!(window.start, utc(2024, 1, 4, 12, 0, 0));
        assert_eq!(window.min_start, utc(2023, 7, 4, 12, 0, 0));
        assert_eq!(window.min_end, window.end);
    }

    #[test]
    fn test_compute_stays_in_same_week() {
        // Sunday, asking for Monday: the Monday six days earlier.
        let now = utc(2024, 1, 14, 1, 0, 0);
        let schedule = ReportingSchedule::new(1, 9).unwrap();
        let window = ReportingWindow::compute(now, &schedule);
        assert_eq!(window.end, utc(2024, 1, 8, 9, 0, 0));
    }

    #[test]
    fn test_min_start_clamps_to_month_end() {
        // Schedule Saturday, week of 2024-09-07: start is 2024-08-31.
        let now = utc(2024, 9, 5, 0, 0, 0);
        let schedule = ReportingSchedule::new(6, 0).unwrap();
        let window = ReportingWindow::compute(now, &schedule);
        assert_eq!(window.start, utc(2024, 8, 31, 0, 0, 0));
        assert_eq!(window.min_start, utc(2024, 2, 29, 0, 0, 0));
    }

    #[test]
    fn test_compute_properties_hold_for_all_schedules() {
        let nows = [
            utc(2023, 12, 31, 23, 59, 59),
            utc(2024, 2, 29, 0, 0, 1),
            utc(2024, 7, 15, 8, 30, 0),
        ];
        for now in nows {
            for day in 1..=7 {
                for hour in 0..24 {
                    let schedule = ReportingSchedule::new(day, hour).unwrap();
                    let window = ReportingWindow::compute(now, &schedule);

                    assert_eq!(window.end.weekday().number_from_monday(), day);
                    assert_eq!(window.end.hour(), hour);
                    assert_eq!(window.end.minute(), 0);
                    assert_eq!(window.end.second(), 0);
                    assert_eq!(window.end.nanosecond(), 0);
                    assert_eq!(window.end - window.start, Duration::days(7));
                    assert_eq!(
                        window.min_start,
                        window.start.checked_sub_months(Months::new(6)).unwrap()
                    );
                    assert_eq!(window.min_end, window.end);
                    assert!((window.end.date_naive() - now.date_naive()).num_days().abs() < 7);
                }
            }
        }
    }
}
