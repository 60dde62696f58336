// Cold tier: one gzip JSON file per calendar month, history-YYYY-MM.json.gz.
// Same shape as the hot file ({ "days": {...} }), scoped to that month.

use super::HistoryFile;
use crate::error::{StoreError, StoreResult};
use crate::persist;
use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};

const PREFIX: &str = "history-";
const SUFFIX: &str = ".json.gz";

pub(super) fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

pub(super) fn month_path(dir: &Path, ym: &str) -> PathBuf {
    dir.join(format!("{PREFIX}{ym}{SUFFIX}"))
}

/// "2024-03" -> 2024-03-31.
pub(super) fn month_last_day(ym: &str) -> Option<NaiveDate> {
    let first = NaiveDate::parse_from_str(&format!("{ym}-01"), "%Y-%m-%d").ok()?;
    let (y, m) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)?.pred_opt()
}

pub(super) fn load_month(dir: &Path, ym: &str) -> StoreResult<HistoryFile> {
    persist::load_or_default(&month_path(dir, ym), persist::read_json_gz::<HistoryFile>)
}

pub(super) fn check_month(path: &Path) -> StoreResult<()> {
    persist::read_json_gz::<HistoryFile>(path).map(|_| ())
}

pub(super) fn save_month(dir: &Path, ym: &str, file: &HistoryFile) -> StoreResult<()> {
    persist::write_json_gz_atomic(&month_path(dir, ym), file)
}

pub(super) fn remove_month(dir: &Path, ym: &str) -> StoreResult<()> {
    let path = month_path(dir, ym);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Month keys of every cold file in `dir`, ascending.
pub(super) fn list_months(dir: &Path) -> StoreResult<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(StoreError::io(dir, e)),
    };
    let mut months = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(ym) = name
            .strip_prefix(PREFIX)
            .and_then(|rest| rest.strip_suffix(SUFFIX))
            && month_last_day(ym).is_some()
        {
            months.push(ym.to_string());
        }
    }
    months.sort();
    Ok(months)
}
