// Periodic full snapshot, used for arbitrary-lookback top queries

use serde::{Deserialize, Serialize};

use super::CounterSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix seconds.
    pub ts: i64,
    #[serde(rename = "nodes", default)]
    pub snapshot: CounterSnapshot,
    /// Skip reasons reported by the counter source when this sample was taken.
    #[serde(default)]
    pub skipped: Vec<String>,
}
