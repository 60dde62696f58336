// Daily traffic history, two tiers.
// Hot: history.json, recent days uncompressed (read by every weekly/monthly report).
// Cold: one gzip file per month (see archive.rs), for days past the hot window.
// A day lives in exactly one tier; archive_and_prune() moves it hot -> cold and drops it
// from both once past retention. Cold files are written before the hot file, so a crash
// in between leaves a day in both tiers; range_sum() reads hot first and the next run
// re-merges the same record, so nothing is double counted.

mod archive;

use crate::error::StoreResult;
use crate::models::{DeltaRecord, NodeCounter};
use crate::persist;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

pub const HOT_FILE: &str = "history.json";
pub const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFile {
    #[serde(default)]
    pub days: BTreeMap<String, DeltaRecord>,
}

/// What one archive_and_prune() pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub kept: usize,
    pub archived: usize,
    pub dropped: usize,
    pub months_written: Vec<String>,
    pub months_removed: Vec<String>,
}

pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

fn age_days(today: NaiveDate, date: NaiveDate) -> i64 {
    (today - date).num_days()
}

/// Unparseable keys are never considered expired.
fn expired(key: &str, today: NaiveDate, retention_days: u32) -> bool {
    NaiveDate::parse_from_str(key, DAY_FORMAT)
        .map(|d| age_days(today, d) >= i64::from(retention_days))
        .unwrap_or(false)
}

fn add_day(summed: &mut DeltaRecord, day: &DeltaRecord) {
    for (id, node) in day {
        let acc = summed
            .entry(id.clone())
            .or_insert_with(|| NodeCounter::new(node.display_name(id), 0, 0));
        acc.counter.up = acc.counter.up.saturating_add(node.counter.up);
        acc.counter.down = acc.counter.down.saturating_add(node.counter.down);
    }
}

pub struct HistoryRepo {
    dir: PathBuf,
    hot_path: PathBuf,
}

impl HistoryRepo {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.to_path_buf(),
            hot_path: data_dir.join(HOT_FILE),
        }
    }

    pub fn hot_path(&self) -> &Path {
        &self.hot_path
    }

    pub fn cold_path(&self, ym: &str) -> PathBuf {
        archive::month_path(&self.dir, ym)
    }

    pub fn load_hot(&self) -> StoreResult<HistoryFile> {
        persist::load_or_default(&self.hot_path, persist::read_json::<HistoryFile>)
    }

    /// Cold contents for one month ("YYYY-MM"); empty when the file does not exist.
    pub fn load_cold(&self, ym: &str) -> StoreResult<HistoryFile> {
        archive::load_month(&self.dir, ym)
    }

    pub fn cold_months(&self) -> StoreResult<Vec<String>> {
        archive::list_months(&self.dir)
    }

    /// Insert or overwrite one day in the hot tier.
    #[instrument(skip(self, deltas), fields(repo = "history", operation = "append", nodes = deltas.len()))]
    pub fn append(&self, date: NaiveDate, deltas: &DeltaRecord) -> StoreResult<()> {
        let mut hot = self.load_hot()?;
        hot.days.insert(day_key(date), deltas.clone());
        persist::write_json_atomic(&self.hot_path, &hot)
    }

    /// One day's record from whichever tier holds it.
    pub fn day(&self, date: NaiveDate) -> StoreResult<Option<DeltaRecord>> {
        let key = day_key(date);
        if let Some(r) = self.load_hot()?.days.remove(&key) {
            return Ok(Some(r));
        }
        Ok(self
            .load_cold(&archive::month_key(date))?
            .days
            .remove(&key))
    }

    /// age < hot_days stays hot; hot_days <= age < retention_days moves to the month's
    /// cold file; age >= retention_days is dropped from both tiers.
    #[instrument(skip(self), fields(repo = "history", operation = "archive_and_prune"))]
    pub fn archive_and_prune(
        &self,
        today: NaiveDate,
        hot_days: u32,
        retention_days: u32,
    ) -> StoreResult<ArchiveSummary> {
        let hot = self.load_hot()?;
        let mut summary = ArchiveSummary::default();
        let mut keep: BTreeMap<String, DeltaRecord> = BTreeMap::new();
        let mut by_month: BTreeMap<String, BTreeMap<String, DeltaRecord>> = BTreeMap::new();

        for (key, record) in hot.days {
            let Ok(date) = NaiveDate::parse_from_str(&key, DAY_FORMAT) else {
                warn!(day = %key, "unparseable day key in hot history; leaving it in place");
                keep.insert(key, record);
                continue;
            };
            let age = age_days(today, date);
            if age >= i64::from(retention_days) {
                summary.dropped += 1;
            } else if age >= i64::from(hot_days) {
                by_month
                    .entry(archive::month_key(date))
                    .or_default()
                    .insert(key, record);
                summary.archived += 1;
            } else {
                keep.insert(key, record);
                summary.kept += 1;
            }
        }

        for (ym, days) in by_month {
            let mut month = archive::load_month(&self.dir, &ym)?;
            month.days.extend(days);
            month
                .days
                .retain(|k, _| !expired(k, today, retention_days));
            archive::save_month(&self.dir, &ym, &month)?;
            summary.months_written.push(ym);
        }

        for ym in archive::list_months(&self.dir)? {
            let Some(last) = archive::month_last_day(&ym) else {
                continue;
            };
            if age_days(today, last) >= i64::from(retention_days) {
                archive::remove_month(&self.dir, &ym)?;
                summary.months_removed.push(ym);
            } else if !summary.months_written.contains(&ym) {
                // Month straddling the retention cut: trim its expired days.
                let mut month = archive::load_month(&self.dir, &ym)?;
                let before = month.days.len();
                month
                    .days
                    .retain(|k, _| !expired(k, today, retention_days));
                if month.days.len() != before {
                    archive::save_month(&self.dir, &ym, &month)?;
                    summary.months_written.push(ym);
                }
            }
        }

        if summary.archived > 0 || summary.dropped > 0 {
            persist::write_json_atomic(&self.hot_path, &HistoryFile { days: keep })?;
        }

        if summary.archived > 0 || summary.dropped > 0 || !summary.months_removed.is_empty() {
            info!(
                kept = summary.kept,
                archived = summary.archived,
                dropped = summary.dropped,
                months_written = summary.months_written.len(),
                months_removed = summary.months_removed.len(),
                "history archived"
            );
        }
        Ok(summary)
    }

    /// Per-node sum over [from, to] inclusive. Each day is read from hot, else its cold
    /// month, else counted as zero. A node's name comes from the first day it appears in.
    #[instrument(skip(self), fields(repo = "history", operation = "range_sum"))]
    pub fn range_sum(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<DeltaRecord> {
        let hot = self.load_hot()?;
        let mut months: HashMap<String, HistoryFile> = HashMap::new();
        let mut summed = DeltaRecord::new();

        for date in from.iter_days().take_while(|d| *d <= to) {
            let key = day_key(date);
            if let Some(day) = hot.days.get(&key) {
                add_day(&mut summed, day);
                continue;
            }
            let month = match months.entry(archive::month_key(date)) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let loaded = archive::load_month(&self.dir, e.key())?;
                    e.insert(loaded)
                }
            };
            if let Some(day) = month.days.get(&key) {
                add_day(&mut summed, day);
            }
        }

        Ok(summed)
    }

    /// Decode hot and every cold file without the corrupt-file fallback (health check).
    pub fn check(&self) -> StoreResult<()> {
        persist::read_json::<HistoryFile>(&self.hot_path)?;
        for ym in archive::list_months(&self.dir)? {
            archive::check_month(&archive::month_path(&self.dir, &ym))?;
        }
        Ok(())
    }
}
