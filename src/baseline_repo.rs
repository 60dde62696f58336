// Baselines: tag -> counter snapshot captured at the start of a period.
// File: baselines.json, { "baselines": { <tag>: { "nodes": {...}, "ts": "..." } } }.
// Every set() rewrites the whole file atomically; entries are replaced, never merged.

use crate::error::StoreResult;
use crate::models::CounterSnapshot;
use crate::persist;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const BASELINES_FILE: &str = "baselines.json";

const CAPTURED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineFile {
    #[serde(default)]
    pub baselines: BTreeMap<String, Baseline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    #[serde(default)]
    pub nodes: CounterSnapshot,
    /// Capture time, local to the reporting offset.
    #[serde(default)]
    pub ts: String,
}

pub struct BaselineRepo {
    path: PathBuf,
}

impl BaselineRepo {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(BASELINES_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<BaselineFile> {
        persist::load_or_default(&self.path, persist::read_json::<BaselineFile>)
    }

    pub fn get_entry(&self, tag: &str) -> StoreResult<Option<Baseline>> {
        Ok(self.load()?.baselines.remove(tag))
    }

    pub fn get(&self, tag: &str) -> StoreResult<Option<CounterSnapshot>> {
        Ok(self.get_entry(tag)?.map(|b| b.nodes))
    }

    #[instrument(skip(self, snapshot), fields(repo = "baseline", operation = "set", nodes = snapshot.len()))]
    pub fn set(
        &self,
        tag: &str,
        snapshot: &CounterSnapshot,
        captured_at: DateTime<Tz>,
    ) -> StoreResult<()> {
        let mut file = self.load()?;
        file.baselines.insert(
            tag.to_string(),
            Baseline {
                nodes: snapshot.clone(),
                ts: captured_at.format(CAPTURED_AT_FORMAT).to_string(),
            },
        );
        persist::write_json_atomic(&self.path, &file)
    }

    pub fn tags(&self) -> StoreResult<Vec<String>> {
        Ok(self.load()?.baselines.into_keys().collect())
    }

    /// Decode without the corrupt-file fallback (health check).
    pub fn check(&self) -> StoreResult<()> {
        persist::read_json::<BaselineFile>(&self.path).map(|_| ())
    }
}
