// Komari API response shapes and their reduction to counters.
//   GET /api/nodes        -> { "status": "success", "data": [ { "uuid", "name", ... } ] }
//   GET /api/recent/{id}  -> { "status": "success", "data": [ { "network": { "totalUp", "totalDown" } } ] }

use crate::models::Counter;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub status: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    fn success(self) -> Option<T> {
        if self.status == "success" {
            self.data
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NodeInfo {
    pub uuid: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentPoint {
    #[serde(default)]
    pub network: Option<NetworkTotals>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NetworkTotals {
    #[serde(rename = "totalUp", default, deserialize_with = "lenient_u64")]
    pub total_up: u64,
    #[serde(rename = "totalDown", default, deserialize_with = "lenient_u64")]
    pub total_down: u64,
}

/// Counters arrive as integers, occasionally as floats or null.
fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        _ => 0,
    })
}

/// A node worth polling: has an id; name falls back to the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub id: String,
    pub name: String,
}

pub(crate) fn node_refs(resp: Envelope<Vec<NodeInfo>>) -> anyhow::Result<Vec<NodeRef>> {
    let status = resp.status.clone();
    let Some(nodes) = resp.success() else {
        anyhow::bail!("/api/nodes returned status {:?}", status);
    };
    Ok(nodes
        .into_iter()
        .filter_map(|n| {
            let id = n.uuid.filter(|u| !u.is_empty())?;
            let name = n.name.filter(|s| !s.is_empty()).unwrap_or_else(|| id.clone());
            Some(NodeRef { id, name })
        })
        .collect())
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Recent {
    Counter(Counter),
    BadResponse,
    Empty,
}

/// The last point carries the node's current cumulative totals.
pub(crate) fn latest_counter(resp: Envelope<Vec<RecentPoint>>) -> Recent {
    let Some(points) = resp.success() else {
        return Recent::BadResponse;
    };
    match points.last() {
        None => Recent::Empty,
        Some(last) => {
            let net = last.network.as_ref();
            Recent::Counter(Counter::new(
                net.map_or(0, |n| n.total_up),
                net.map_or(0, |n| n.total_down),
            ))
        }
    }
}
