// Counter models. Same JSON shape for snapshots, baselines and history days:
// { <node id>: { "name": ..., "up": ..., "down": ... } }

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upload/download byte counters. Cumulative when read from a node, accumulated when a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    #[serde(default)]
    pub up: u64,
    #[serde(default)]
    pub down: u64,
}

impl Counter {
    pub fn new(up: u64, down: u64) -> Self {
        Self { up, down }
    }

    pub fn total(&self) -> u64 {
        self.up.saturating_add(self.down)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCounter {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub counter: Counter,
}

impl NodeCounter {
    pub fn new(name: impl Into<String>, up: u64, down: u64) -> Self {
        Self {
            name: name.into(),
            counter: Counter::new(up, down),
        }
    }

    /// Display name, falling back to the node id when the source gave none.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        if self.name.is_empty() { id } else { &self.name }
    }
}

/// Node id -> counters, captured at a single instant.
pub type CounterSnapshot = BTreeMap<String, NodeCounter>;

/// Node id -> traffic accumulated over an interval.
pub type DeltaRecord = BTreeMap<String, NodeCounter>;
