// Calendar periods and baseline tags

mod common;

use chrono::TimeZone;
use chrono_tz::Europe::Berlin;
use common::{date, tz};
use komari_traffic::period::{self, Period};

#[test]
fn tags_anchor_on_period_start() {
    let sat = date(2026, 10, 17);
    assert_eq!(Period::Today.tag(sat), "2026-10-17");
    assert_eq!(Period::Week.tag(sat), "WEEK-2026-10-12");
    assert_eq!(Period::Month.tag(sat), "MONTH-2026-10-01");
    // Monday is its own week start.
    assert_eq!(Period::Week.tag(date(2026, 10, 12)), "WEEK-2026-10-12");
}

#[test]
fn last_week_and_month_cross_year_boundaries() {
    assert_eq!(
        period::last_week(date(2026, 1, 1)),
        (date(2025, 12, 22), date(2025, 12, 28))
    );
    assert_eq!(
        period::last_month(date(2026, 1, 15)),
        (date(2025, 12, 1), date(2025, 12, 31))
    );
    assert_eq!(
        period::last_month(date(2024, 3, 1)),
        (date(2024, 2, 1), date(2024, 2, 29))
    );
}

#[test]
fn start_of_day_is_local_midnight() {
    let t = period::start_of_day(date(2026, 10, 17), tz());
    assert_eq!(t.to_rfc3339(), "2026-10-17T00:00:00+08:00");
}

#[test]
fn start_of_day_follows_dst_changes() {
    // Berlin moves to +02:00 on 2026-03-29 and back to +01:00 on 2026-10-25.
    let cases = [
        (date(2026, 3, 29), "2026-03-29T00:00:00+01:00"),
        (date(2026, 3, 30), "2026-03-30T00:00:00+02:00"),
        (date(2026, 10, 25), "2026-10-25T00:00:00+02:00"),
        (date(2026, 10, 26), "2026-10-26T00:00:00+01:00"),
    ];
    for (d, want) in cases {
        assert_eq!(period::start_of_day(d, Berlin).to_rfc3339(), want);
    }
    // The day across the spring change is 23 hours long.
    let len = period::start_of_day(date(2026, 3, 30), Berlin)
        - period::start_of_day(date(2026, 3, 29), Berlin);
    assert_eq!(len.num_hours(), 23);
}

#[test]
fn summer_local_midnight_lands_on_the_local_day() {
    // 22:30 UTC on 2026-07-14 is already 00:30 on the 15th in Berlin (+02:00).
    let utc = chrono::Utc.with_ymd_and_hms(2026, 7, 14, 22, 30, 0).unwrap();
    let local = utc.with_timezone(&Berlin);
    assert_eq!(local.date_naive(), date(2026, 7, 15));
    assert_eq!(Period::Today.tag(local.date_naive()), "2026-07-15");
    assert_eq!(
        period::start_of_day(local.date_naive(), Berlin).to_rfc3339(),
        "2026-07-15T00:00:00+02:00"
    );
}
