// Report jobs: daily/weekly/monthly scheduled reports, on-demand period and window
// reports, baseline bootstrap and history archiving. Each job fetches, computes, persists
// and notifies; rendering lives in render.rs.

use crate::baseline_repo::BaselineRepo;
use crate::clock::Clock;
use crate::commands::{Command, TopScope};
use crate::config::AppConfig;
use crate::delta::compute_delta;
use crate::history_repo::{ArchiveSummary, HistoryRepo, day_key};
use crate::komari_repo::CounterSource;
use crate::period::{self, Period};
use crate::render;
use crate::sample_repo::{SampleRepo, WindowOutcome};
use crate::telegram_repo::Notifier;
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};

const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M";

fn range_label(from: NaiveDate, to: NaiveDate) -> String {
    format!("{} → {}", day_key(from), day_key(to))
}

fn time_label(from: DateTime<Tz>, to: DateTime<Tz>) -> String {
    format!("{} → {}", from.format(LABEL_FORMAT), to.format(LABEL_FORMAT))
}

pub struct Reporter {
    config: Arc<AppConfig>,
    source: Arc<dyn CounterSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    baselines: BaselineRepo,
    history: HistoryRepo,
    samples: SampleRepo,
}

impl Reporter {
    pub fn new(
        config: Arc<AppConfig>,
        source: Arc<dyn CounterSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let dir = config.storage.data_dir.clone();
        Self {
            baselines: BaselineRepo::new(&dir),
            history: HistoryRepo::new(&dir),
            samples: SampleRepo::new(&dir, &config.sampling),
            config,
            source,
            notifier,
            clock,
        }
    }

    pub fn baselines(&self) -> &BaselineRepo {
        &self.baselines
    }

    pub fn history(&self) -> &HistoryRepo {
        &self.history
    }

    pub fn samples(&self) -> &SampleRepo {
        &self.samples
    }

    fn top_n(&self) -> usize {
        self.config.report.top_n
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// Yesterday's report. Appends yesterday to history, archives, and re-anchors today's
    /// baseline on the current counters.
    #[instrument(skip(self), fields(operation = "report_daily"))]
    pub async fn daily(&self) -> anyhow::Result<()> {
        let now = self.clock.now();
        let today = now.date_naive();
        let yesterday = today - Duration::days(1);
        let tag = day_key(yesterday);

        let base = self.baselines.get(&tag)?;
        let current = self.source.fetch_all().await.context("fetch counters")?;

        let Some(base) = base else {
            self.baselines.set(&tag, &current.snapshot, now)?;
            self.notifier
                .notify(&render::daily_baseline_missing(&tag))
                .await?;
            info!(tag = %tag, "daily baseline missing; saved current counters");
            return Ok(());
        };

        let outcome = compute_delta(&current.snapshot, &base);
        self.notifier
            .notify(&render::report(
                "Yesterday's traffic",
                &tag,
                &outcome.deltas,
                &outcome.resets,
                &current.skipped,
                self.top_n(),
            ))
            .await?;

        self.history.append(yesterday, &outcome.deltas)?;
        self.history.archive_and_prune(
            today,
            self.config.history.hot_days,
            self.config.history.retention_days,
        )?;
        self.baselines.set(&day_key(today), &current.snapshot, now)?;
        info!(
            day = %tag,
            nodes = outcome.deltas.len(),
            resets = outcome.resets.len(),
            skipped = current.skipped.len(),
            "daily report sent"
        );
        Ok(())
    }

    async fn history_report(&self, title: &str, from: NaiveDate, to: NaiveDate) -> anyhow::Result<()> {
        let summed = self.history.range_sum(from, to)?;
        self.notifier
            .notify(&render::report(
                title,
                &range_label(from, to),
                &summed,
                &BTreeSet::new(),
                &[],
                self.top_n(),
            ))
            .await?;
        info!(from = %from, to = %to, nodes = summed.len(), "history report sent");
        Ok(())
    }

    #[instrument(skip(self), fields(operation = "report_weekly"))]
    pub async fn weekly(&self) -> anyhow::Result<()> {
        let (from, to) = period::last_week(self.today());
        self.history_report("Last week's traffic", from, to).await
    }

    #[instrument(skip(self), fields(operation = "report_monthly"))]
    pub async fn monthly(&self) -> anyhow::Result<()> {
        let (from, to) = period::last_month(self.today());
        self.history_report("Last month's traffic", from, to).await
    }

    /// Current period so far, against the period's start baseline. A missing baseline is
    /// created from the current counters and the user is asked to retry.
    #[instrument(skip(self), fields(operation = "report_period"))]
    pub async fn period(&self, period: Period, top_only: bool) -> anyhow::Result<()> {
        let now = self.clock.now();
        let today = now.date_naive();
        let tag = period.tag(today);

        let base = self.baselines.get(&tag)?;
        let current = self.source.fetch_all().await.context("fetch counters")?;
        let Some(base) = base else {
            self.baselines.set(&tag, &current.snapshot, now)?;
            self.notifier
                .notify(&render::period_baseline_missing(&tag))
                .await?;
            info!(tag = %tag, "period baseline missing; saved current counters");
            return Ok(());
        };

        let outcome = compute_delta(&current.snapshot, &base);
        let from = period::start_of_day(period.start(today), now.timezone());
        let label = time_label(from, now);
        let text = if top_only {
            render::top_only(
                &label,
                &outcome.deltas,
                &outcome.resets,
                &current.skipped,
                self.top_n(),
            )
        } else {
            render::report(
                "Traffic",
                &label,
                &outcome.deltas,
                &outcome.resets,
                &current.skipped,
                self.top_n(),
            )
        };
        self.notifier.notify(&text).await?;
        Ok(())
    }

    /// Top-N over the last `hours`, from the sample log.
    #[instrument(skip(self), fields(operation = "top_last_hours"))]
    pub async fn top_last_hours(&self, hours: u32) -> anyhow::Result<()> {
        if hours == 0 {
            self.notifier.notify(&render::top_usage()).await?;
            return Ok(());
        }
        let now = self.clock.now();
        let outcome = self
            .samples
            .window(self.source.as_ref(), now.timestamp(), hours)
            .await?;
        let text = match outcome {
            WindowOutcome::InsufficientHistory => render::insufficient_history(hours),
            WindowOutcome::Ready(w) => {
                let tz = now.timezone();
                let from = DateTime::from_timestamp(w.from_ts, 0)
                    .map(|d| d.with_timezone(&tz))
                    .unwrap_or(now);
                let to = DateTime::from_timestamp(w.to_ts, 0)
                    .map(|d| d.with_timezone(&tz))
                    .unwrap_or(now);
                render::top_only(
                    &time_label(from, to),
                    &w.deltas,
                    &w.resets,
                    &w.skipped,
                    self.top_n(),
                )
            }
        };
        self.notifier.notify(&text).await?;
        Ok(())
    }

    /// Anchor this week's and this month's baselines on the current counters.
    #[instrument(skip(self), fields(operation = "bootstrap"))]
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        let now = self.clock.now();
        let today = now.date_naive();
        let current = self.source.fetch_all().await.context("fetch counters")?;
        for p in [Period::Week, Period::Month] {
            self.baselines.set(&p.tag(today), &current.snapshot, now)?;
        }
        self.notifier.notify(&render::bootstrap_done()).await?;
        info!(nodes = current.snapshot.len(), "week and month baselines saved");
        Ok(())
    }

    pub fn archive(&self) -> anyhow::Result<ArchiveSummary> {
        Ok(self.history.archive_and_prune(
            self.today(),
            self.config.history.hot_days,
            self.config.history.retention_days,
        )?)
    }

    /// `/archive`: archive, then confirm in chat.
    pub async fn archive_and_notify(&self) -> anyhow::Result<()> {
        let summary = self.archive()?;
        self.notifier
            .notify(&render::archive_done(summary.archived, summary.dropped))
            .await?;
        Ok(())
    }

    /// Sampling step of the listener tick.
    pub async fn take_sample_if_due(&self, force: bool) -> anyhow::Result<bool> {
        let sampled = self
            .samples
            .take_sample_if_due(self.source.as_ref(), self.clock.now_ts(), force)
            .await?;
        Ok(sampled.is_some())
    }

    pub async fn handle(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Report(p) => self.period(p, false).await,
            Command::Top(TopScope::Period(p)) => self.period(p, true).await,
            Command::Top(TopScope::Hours(h)) => self.top_last_hours(h).await,
            Command::Top(TopScope::Invalid) => self.notifier.notify(&render::top_usage()).await,
            Command::Archive => self.archive_and_notify().await,
            Command::Help => self.notifier.notify(&render::help()).await,
        }
    }
}
