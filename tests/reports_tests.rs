// Report jobs against in-memory source/notifier and a manual clock

mod common;

use common::*;
use komari_traffic::commands::{Command, TopScope};
use komari_traffic::models::Counter;
use komari_traffic::period::Period;
use komari_traffic::reports::Reporter;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    source: Arc<FakeSource>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<ManualClock>,
    reporter: Reporter,
}

fn harness(now: chrono::DateTime<chrono_tz::Tz>) -> Harness {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path()));
    let source = Arc::new(FakeSource::new(snapshot(&[("a", "alpha", 100, 50)])));
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(ManualClock::new(now));
    let reporter = Reporter::new(config, source.clone(), notifier.clone(), clock.clone());
    Harness {
        _dir: dir,
        source,
        notifier,
        clock,
        reporter,
    }
}

#[tokio::test]
async fn daily_without_baseline_bootstraps_and_stops() {
    let h = harness(at(2026, 10, 17, 0, 5));
    h.reporter.daily().await.unwrap();

    assert!(h.notifier.last().unwrap().contains("Daily baseline missing"));
    assert!(h.notifier.last().unwrap().contains("2026-10-16"));
    assert!(h.reporter.baselines().get("2026-10-16").unwrap().is_some());
    assert!(h.reporter.history().load_hot().unwrap().days.is_empty());
    assert!(h.reporter.baselines().get("2026-10-17").unwrap().is_none());
}

#[tokio::test]
async fn daily_reports_appends_history_and_reanchors_today() {
    let h = harness(at(2026, 10, 17, 0, 5));
    let now = at(2026, 10, 16, 0, 0);
    h.reporter
        .baselines()
        .set("2026-10-16", &snapshot(&[("a", "alpha", 100, 50)]), now)
        .unwrap();
    h.source.set(snapshot(&[("a", "alpha", 150, 80)]));

    h.reporter.daily().await.unwrap();

    let text = h.notifier.last().unwrap();
    assert!(text.contains("Yesterday's traffic"));
    assert!(text.contains("<b>alpha</b>"));
    let day = h.reporter.history().day(date(2026, 10, 16)).unwrap().unwrap();
    assert_eq!(day["a"].counter, Counter::new(50, 30));
    assert_eq!(
        h.reporter.baselines().get("2026-10-17").unwrap().unwrap(),
        snapshot(&[("a", "alpha", 150, 80)])
    );
}

#[tokio::test]
async fn daily_reports_resets_and_skips() {
    let h = harness(at(2026, 10, 17, 0, 5));
    h.reporter
        .baselines()
        .set("2026-10-16", &snapshot(&[("a", "alpha", 100, 50)]), at(2026, 10, 16, 0, 0))
        .unwrap();
    h.source.set(snapshot(&[("a", "alpha", 10, 60)]));
    h.source.set_skipped(&["beta(timeout)"]);

    h.reporter.daily().await.unwrap();
    let text = h.notifier.last().unwrap();
    assert!(text.contains("Counter reset detected"));
    assert!(text.contains("beta(timeout)"));
}

#[tokio::test]
async fn daily_fetch_failure_propagates_without_writing() {
    let h = harness(at(2026, 10, 17, 0, 5));
    h.source.set_failing(true);
    assert!(h.reporter.daily().await.is_err());
    assert_eq!(h.notifier.count(), 0);
    assert!(h.reporter.baselines().tags().unwrap().is_empty());
}

#[tokio::test]
async fn weekly_sums_last_monday_to_sunday() {
    let h = harness(at(2026, 10, 17, 9, 0));
    let history = h.reporter.history();
    history.append(date(2026, 10, 4), &snapshot(&[("a", "alpha", 1000, 1000)])).unwrap();
    history.append(date(2026, 10, 5), &snapshot(&[("a", "alpha", 1, 1)])).unwrap();
    history.append(date(2026, 10, 11), &snapshot(&[("a", "alpha", 2, 2)])).unwrap();
    history.append(date(2026, 10, 12), &snapshot(&[("a", "alpha", 1000, 1000)])).unwrap();

    h.reporter.weekly().await.unwrap();
    let text = h.notifier.last().unwrap();
    assert!(text.contains("2026-10-05 → 2026-10-11"));
    assert!(text.contains("Total</b>: 6 B"));
}

#[tokio::test]
async fn monthly_sums_previous_calendar_month() {
    let h = harness(at(2026, 3, 1, 9, 0));
    let history = h.reporter.history();
    history.append(date(2026, 2, 1), &snapshot(&[("a", "alpha", 1, 0)])).unwrap();
    history.append(date(2026, 2, 28), &snapshot(&[("a", "alpha", 2, 0)])).unwrap();
    history.append(date(2026, 3, 1), &snapshot(&[("a", "alpha", 100, 0)])).unwrap();

    h.reporter.monthly().await.unwrap();
    let text = h.notifier.last().unwrap();
    assert!(text.contains("2026-02-01 → 2026-02-28"));
    assert!(text.contains("Total</b>: 3 B"));
}

#[tokio::test]
async fn period_report_bootstraps_then_reports_delta() {
    let h = harness(at(2026, 10, 17, 12, 30));
    h.reporter.period(Period::Today, false).await.unwrap();
    assert!(h.notifier.last().unwrap().contains("No start snapshot found (2026-10-17)"));

    h.source.set(snapshot(&[("a", "alpha", 1124, 50)]));
    h.reporter.period(Period::Today, false).await.unwrap();
    let text = h.notifier.last().unwrap();
    assert!(text.contains("2026-10-17 00:00 → 2026-10-17 12:30"));
    assert!(text.contains("1.00 KiB"));
}

#[tokio::test]
async fn top_for_week_uses_week_baseline() {
    let h = harness(at(2026, 10, 17, 12, 0));
    h.reporter.bootstrap().await.unwrap();
    assert_eq!(
        h.reporter.baselines().tags().unwrap(),
        vec!["MONTH-2026-10-01".to_string(), "WEEK-2026-10-12".to_string()]
    );

    h.source.set(snapshot(&[("a", "alpha", 300, 50)]));
    h.reporter
        .handle(Command::Top(TopScope::Period(Period::Week)))
        .await
        .unwrap();
    let text = h.notifier.last().unwrap();
    assert!(text.contains("Top 3"));
    assert!(text.contains("1. <b>alpha</b>: 200 B"));
    assert!(text.contains("2026-10-12 00:00 → 2026-10-17 12:00"));
}

#[tokio::test]
async fn top_last_hours_needs_history_then_diffs_samples() {
    let h = harness(at(2026, 10, 17, 10, 0));
    h.reporter.top_last_hours(1).await.unwrap();
    assert!(h.notifier.last().unwrap().contains("Not enough sample history"));

    h.clock.advance_secs(2 * 3600);
    h.source.set(snapshot(&[("a", "alpha", 300, 50)]));
    h.reporter.top_last_hours(1).await.unwrap();
    let text = h.notifier.last().unwrap();
    assert!(text.contains("1. <b>alpha</b>: 200 B"));
    assert!(text.contains("2026-10-17 10:00 → 2026-10-17 12:00"));
}

#[tokio::test]
async fn invalid_top_and_zero_hours_send_usage() {
    let h = harness(at(2026, 10, 17, 10, 0));
    h.reporter.handle(Command::Top(TopScope::Invalid)).await.unwrap();
    h.reporter.top_last_hours(0).await.unwrap();
    let msgs = h.notifier.messages();
    assert_eq!(msgs.len(), 2);
    assert!(msgs.iter().all(|m| m.starts_with("Usage: /top")));
    assert_eq!(h.source.fetch_count(), 0);
}

#[tokio::test]
async fn archive_command_confirms() {
    let h = harness(at(2026, 10, 17, 10, 0));
    h.reporter
        .history()
        .append(date(2026, 1, 1), &snapshot(&[("a", "alpha", 1, 1)]))
        .unwrap();
    h.reporter.handle(Command::Archive).await.unwrap();
    assert!(h.notifier.last().unwrap().contains("1 day(s) compressed"));
    assert_eq!(h.reporter.history().cold_months().unwrap(), vec!["2026-01".to_string()]);
}

#[tokio::test]
async fn help_lists_commands() {
    let h = harness(at(2026, 10, 17, 10, 0));
    h.reporter.handle(Command::Help).await.unwrap();
    assert!(h.notifier.last().unwrap().contains("/top 6h"));
}
