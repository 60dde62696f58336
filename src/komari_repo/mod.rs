// Node counters from the Komari monitoring API.
// One request lists the nodes, then one request per node runs on a bounded pool.
// A failing node becomes a "<name>(<reason>)" skip entry; it never fails the batch.

mod parse;

pub use parse::NodeRef;

use crate::config::KomariConfig;
use crate::models::{CounterSnapshot, NodeCounter};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};

/// Current counters for every node that answered, plus skip reasons for the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub snapshot: CounterSnapshot,
    /// Sorted.
    pub skipped: Vec<String>,
}

#[async_trait]
pub trait CounterSource: Send + Sync {
    async fn fetch_all(&self) -> anyhow::Result<FetchOutcome>;

    /// Reachability probe for the health check.
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Result of polling a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeFetch {
    Counter { id: String, node: NodeCounter },
    Skipped(String),
}

/// Run `fetch` for every item with at most `workers` in flight, then join.
/// Completion order does not matter: the snapshot is keyed by id and skips are sorted.
pub async fn fan_out<T, F, Fut>(items: Vec<T>, workers: usize, fetch: F) -> FetchOutcome
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = NodeFetch>,
{
    let workers = workers.min(items.len()).max(1);
    let results: Vec<NodeFetch> = futures_util::stream::iter(items)
        .map(fetch)
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut out = FetchOutcome::default();
    for r in results {
        match r {
            NodeFetch::Counter { id, node } => {
                out.snapshot.insert(id, node);
            }
            NodeFetch::Skipped(reason) => out.skipped.push(reason),
        }
    }
    out.skipped.sort();
    out
}

fn skip_reason(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "timeout".into()
    } else if let Some(status) = e.status() {
        format!("http {}", status.as_u16())
    } else if e.is_decode() {
        "bad_resp".into()
    } else if e.is_connect() {
        "connect".into()
    } else {
        "request".into()
    }
}

pub struct KomariRepo {
    client: reqwest::Client,
    base_url: String,
    workers: usize,
}

impl KomariRepo {
    pub fn new(config: &KomariConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if !config.api_token.is_empty() {
            let value = format!("{} {}", config.api_token_prefix.trim(), config.api_token);
            headers.insert(
                HeaderName::from_bytes(config.api_token_header.as_bytes())?,
                HeaderValue::from_str(value.trim())?,
            );
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(crate::version::user_agent())
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            workers: config.fetch_workers,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await
    }

    #[instrument(skip(self), fields(repo = "komari", operation = "list_nodes"))]
    pub async fn list_nodes(&self) -> anyhow::Result<Vec<NodeRef>> {
        let resp = self.get_json("/api/nodes").await?;
        parse::node_refs(resp)
    }

    async fn fetch_one(&self, node: NodeRef) -> NodeFetch {
        let path = format!("/api/recent/{}", node.id);
        let resp = match self.get_json(&path).await {
            Ok(r) => r,
            Err(e) => {
                debug!(node = %node.name, error = %e, "recent counters request failed");
                return NodeFetch::Skipped(format!("{}({})", node.name, skip_reason(&e)));
            }
        };
        match parse::latest_counter(resp) {
            parse::Recent::Counter(counter) => NodeFetch::Counter {
                node: NodeCounter {
                    name: node.name,
                    counter,
                },
                id: node.id,
            },
            parse::Recent::BadResponse => NodeFetch::Skipped(format!("{}(bad_resp)", node.name)),
            parse::Recent::Empty => NodeFetch::Skipped(format!("{}(empty)", node.name)),
        }
    }
}

#[async_trait]
impl CounterSource for KomariRepo {
    #[instrument(skip(self), fields(repo = "komari", operation = "fetch_all"))]
    async fn fetch_all(&self) -> anyhow::Result<FetchOutcome> {
        let nodes = self.list_nodes().await?;
        let total = nodes.len();
        let out = fan_out(nodes, self.workers, |n| self.fetch_one(n)).await;
        debug!(
            nodes = total,
            fetched = out.snapshot.len(),
            skipped = out.skipped.len(),
            "counters fetched"
        );
        Ok(out)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.client.get(&self.base_url).send().await?;
        Ok(())
    }
}
