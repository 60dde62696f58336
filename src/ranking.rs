// Top-N consumers of a delta record.

use crate::models::DeltaRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub name: String,
    pub up: u64,
    pub down: u64,
    pub total: u64,
}

/// Orders by total, down, up (all descending), then lowercase name ascending, and keeps `n`.
/// `None` means there was nothing to rank; `n == 0` gives `Some(vec![])`.
pub fn rank(deltas: &DeltaRecord, n: usize) -> Option<Vec<RankedEntry>> {
    if deltas.is_empty() {
        return None;
    }

    let mut entries: Vec<(String, RankedEntry)> = deltas
        .iter()
        .map(|(id, node)| {
            let name = node.display_name(id).to_string();
            let entry = RankedEntry {
                up: node.counter.up,
                down: node.counter.down,
                total: node.counter.total(),
                name: name.clone(),
            };
            (name.to_lowercase(), entry)
        })
        .collect();

    entries.sort_by(|(a_key, a), (b_key, b)| {
        b.total
            .cmp(&a.total)
            .then(b.down.cmp(&a.down))
            .then(b.up.cmp(&a.up))
            .then_with(|| a_key.cmp(b_key))
    });
    entries.truncate(n);

    Some(entries.into_iter().map(|(_, e)| e).collect())
}
