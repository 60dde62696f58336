// Period delta between two counter snapshots, with reset detection.
// Pure: used for snapshot-vs-baseline (daily/weekly/monthly) and sample-vs-sample (/top Nh).

use std::collections::BTreeSet;

use crate::models::{Counter, CounterSnapshot, DeltaRecord, NodeCounter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaOutcome {
    pub deltas: DeltaRecord,
    /// Display names of nodes whose counter went backwards since the baseline.
    pub resets: BTreeSet<String>,
}

/// A counter that went backwards in either direction restarted from zero, so the
/// whole current counter is the traffic since the restart.
fn went_backwards(current: Counter, previous: Counter) -> bool {
    current.up < previous.up || current.down < previous.down
}

/// Nodes missing from `baseline` count their whole current counter.
/// Nodes present only in `baseline` are dropped.
pub fn compute_delta(current: &CounterSnapshot, baseline: &CounterSnapshot) -> DeltaOutcome {
    let mut out = DeltaOutcome::default();

    for (id, node) in current {
        let prev = baseline.get(id).map(|b| b.counter).unwrap_or_default();
        let name = node.display_name(id).to_string();

        let counter = if went_backwards(node.counter, prev) {
            out.resets.insert(name.clone());
            node.counter
        } else {
            Counter::new(node.counter.up - prev.up, node.counter.down - prev.down)
        };
        out.deltas.insert(id.clone(), NodeCounter { name, counter });
    }

    out
}

/// Fleet-wide (up, down) sum of a delta record.
pub fn totals(deltas: &DeltaRecord) -> Counter {
    deltas.values().fold(Counter::default(), |acc, n| Counter {
        up: acc.up.saturating_add(n.counter.up),
        down: acc.down.saturating_add(n.counter.down),
    })
}
