// Sample log: full counter snapshots taken at most once per interval while the bot runs.
// Answers "traffic over the last N hours" by diffing now against the newest sample at or
// before now - N h. File: samples.json, { "samples": [ { "ts", "nodes", "skipped" } ] },
// ascending by ts, no duplicate ts.

use crate::config::SamplingConfig;
use crate::delta::compute_delta;
use crate::error::StoreResult;
use crate::komari_repo::CounterSource;
use crate::models::{DeltaRecord, Sample};
use crate::persist;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

pub const SAMPLES_FILE: &str = "samples.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleLog {
    #[serde(default)]
    samples: Vec<Sample>,
}

impl SampleLog {
    pub fn from_samples(mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.ts);
        samples.dedup_by_key(|s| s.ts);
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// True when empty or the newest sample is at least `interval_secs` old.
    pub fn is_due(&self, now_ts: i64, interval_secs: u64) -> bool {
        match self.last() {
            None => true,
            Some(last) => now_ts.saturating_sub(last.ts) >= interval_secs as i64,
        }
    }

    /// Append in ts order. A sample at an existing ts replaces it.
    pub fn push(&mut self, sample: Sample) {
        match self.samples.binary_search_by_key(&sample.ts, |s| s.ts) {
            Ok(i) => self.samples[i] = sample,
            Err(i) => self.samples.insert(i, sample),
        }
    }

    /// Drop samples older than `now_ts - retention_hours h`. Returns how many were dropped.
    pub fn prune(&mut self, now_ts: i64, retention_hours: u64) -> usize {
        let keep_after = now_ts.saturating_sub((retention_hours as i64).saturating_mul(3600));
        let before = self.samples.len();
        self.samples.retain(|s| s.ts >= keep_after);
        self.samples.sort_by_key(|s| s.ts);
        before - self.samples.len()
    }

    /// Newest sample with `ts <= target`, by binary search.
    pub fn nearest_at_or_before(&self, target: i64) -> Option<&Sample> {
        let idx = self.samples.partition_point(|s| s.ts <= target);
        idx.checked_sub(1).map(|i| &self.samples[i])
    }
}

/// Delta between two samples, ready for a top-N report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDelta {
    pub from_ts: i64,
    pub to_ts: i64,
    pub deltas: DeltaRecord,
    pub resets: BTreeSet<String>,
    /// Both samples' skip lists: base first, then now, duplicates removed.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    Ready(WindowDelta),
    /// No retained sample is old enough; the bot has to run longer first.
    InsufficientHistory,
}

fn union_skipped(base: &[String], now: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    base.iter()
        .chain(now)
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}

pub struct SampleRepo {
    path: PathBuf,
    interval_secs: u64,
    retention_hours: u64,
}

impl SampleRepo {
    pub fn new(data_dir: &Path, config: &SamplingConfig) -> Self {
        Self {
            path: data_dir.join(SAMPLES_FILE),
            interval_secs: config.interval_secs,
            retention_hours: config.retention_hours,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> StoreResult<SampleLog> {
        let log = persist::load_or_default(&self.path, persist::read_json::<SampleLog>)?;
        Ok(SampleLog::from_samples(log.samples))
    }

    pub fn save(&self, log: &SampleLog) -> StoreResult<()> {
        persist::write_json_atomic(&self.path, log)
    }

    pub fn nearest_at_or_before(&self, target: i64) -> StoreResult<Option<Sample>> {
        Ok(self.load()?.nearest_at_or_before(target).cloned())
    }

    /// Fetch and append a sample unless one was taken within the interval (`force` skips
    /// that check). Returns the new sample, or `None` when not due.
    #[instrument(skip(self, source), fields(repo = "samples", operation = "take_sample"))]
    pub async fn take_sample_if_due(
        &self,
        source: &dyn CounterSource,
        now_ts: i64,
        force: bool,
    ) -> anyhow::Result<Option<Sample>> {
        let mut log = self.load()?;
        if !force && !log.is_due(now_ts, self.interval_secs) {
            return Ok(None);
        }

        let fetched = source.fetch_all().await?;
        let sample = Sample {
            ts: now_ts,
            snapshot: fetched.snapshot,
            skipped: fetched.skipped,
        };
        log.push(sample.clone());
        let pruned = log.prune(now_ts, self.retention_hours);
        self.save(&log)?;
        debug!(
            nodes = sample.snapshot.len(),
            skipped = sample.skipped.len(),
            pruned,
            retained = log.len(),
            "sample taken"
        );
        Ok(Some(sample))
    }

    /// Force a sample for now, then diff it against the newest sample at or before
    /// `now - hours h`.
    pub async fn window(
        &self,
        source: &dyn CounterSource,
        now_ts: i64,
        hours: u32,
    ) -> anyhow::Result<WindowOutcome> {
        let now_sample = match self.take_sample_if_due(source, now_ts, true).await? {
            Some(s) => s,
            None => anyhow::bail!("forced sample was not taken"),
        };
        let target = now_ts - i64::from(hours) * 3600;
        let Some(base) = self.nearest_at_or_before(target)? else {
            return Ok(WindowOutcome::InsufficientHistory);
        };

        let outcome = compute_delta(&now_sample.snapshot, &base.snapshot);
        Ok(WindowOutcome::Ready(WindowDelta {
            from_ts: base.ts,
            to_ts: now_sample.ts,
            deltas: outcome.deltas,
            resets: outcome.resets,
            skipped: union_skipped(&base.skipped, &now_sample.skipped),
        }))
    }

    /// Decode without the corrupt-file fallback (health check).
    pub fn check(&self) -> StoreResult<()> {
        persist::read_json::<SampleLog>(&self.path).map(|_| ())
    }
}
