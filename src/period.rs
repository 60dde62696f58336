// Calendar periods and the baseline tags that anchor them.
// Day tag "YYYY-MM-DD", week tag "WEEK-<monday>", month tag "MONTH-<first day>".

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::history_repo::day_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Week,
    Month,
}

impl Period {
    /// First day of the period containing `today`.
    pub fn start(self, today: NaiveDate) -> NaiveDate {
        match self {
            Period::Today => today,
            Period::Week => start_of_week(today),
            Period::Month => start_of_month(today),
        }
    }

    pub fn tag(self, today: NaiveDate) -> String {
        let start = self.start(today);
        match self {
            Period::Today => day_key(start),
            Period::Week => format!("WEEK-{}", day_key(start)),
            Period::Month => format!("MONTH-{}", day_key(start)),
        }
    }
}

/// Monday of `d`'s week.
pub fn start_of_week(d: NaiveDate) -> NaiveDate {
    d - Duration::days(i64::from(d.weekday().num_days_from_monday()))
}

pub fn start_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// Monday..Sunday of the week before `today`'s.
pub fn last_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = start_of_week(today) - Duration::days(1);
    (end - Duration::days(6), end)
}

/// First..last day of the calendar month before `today`'s.
pub fn last_month(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = start_of_month(today) - Duration::days(1);
    (start_of_month(end), end)
}

/// First instant of `d` in `tz`. Follows the zone's DST rules, so the offset is the
/// one in force at that midnight rather than today's.
pub fn start_of_day(d: NaiveDate, tz: Tz) -> DateTime<Tz> {
    let midnight = d.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // Midnight falls in a DST gap: the day starts when the clocks jump.
        LocalResult::None => (1..=3)
            .find_map(|h| {
                tz.from_local_datetime(&(midnight + Duration::hours(h)))
                    .earliest()
            })
            .unwrap_or_else(|| tz.from_utc_datetime(&midnight)),
    }
}
