// Failure alerts, rate-limited per failure class. The last send time of each class is
// persisted as alert_<key>.json, so the limit also holds across one-shot CLI runs.

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::StoreResult;
use crate::persist;
use crate::render;
use crate::telegram_repo::Notifier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct AlertState {
    #[serde(default)]
    last: i64,
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub struct AlertThrottle {
    dir: PathBuf,
    min_interval_secs: u64,
}

impl AlertThrottle {
    pub fn new(data_dir: &Path, min_interval_secs: u64) -> Self {
        Self {
            dir: data_dir.to_path_buf(),
            min_interval_secs,
        }
    }

    /// Alert state lives next to the data files.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.storage.data_dir, config.telegram.alert_interval_secs)
    }

    pub fn state_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("alert_{}.json", sanitize(key)))
    }

    /// True (and records `now_ts`) when no alert of this class went out within the interval.
    pub fn should_alert(&self, key: &str, now_ts: i64) -> StoreResult<bool> {
        let path = self.state_path(key);
        let state: AlertState = persist::load_or_default(&path, persist::read_json)?;
        if state.last > 0 && now_ts.saturating_sub(state.last) < self.min_interval_secs as i64 {
            return Ok(false);
        }
        persist::write_json_atomic(&path, &AlertState { last: now_ts })?;
        Ok(true)
    }
}

fn host_name() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown".into())
}

/// Send a failure alert for `error` unless one of class `key` was sent recently.
/// Never fails: alert delivery problems are logged only.
pub async fn alert_failure(
    notifier: &dyn Notifier,
    throttle: &AlertThrottle,
    clock: &dyn Clock,
    key: &str,
    location: &str,
    error: &anyhow::Error,
) {
    let now = clock.now();
    match throttle.should_alert(key, now.timestamp()) {
        Ok(true) => {}
        Ok(false) => {
            debug!(key, "failure alert suppressed by rate limit");
            return;
        }
        Err(e) => {
            warn!(error = %e, key, "alert throttle state unavailable; sending anyway");
        }
    }
    let text = render::failure_alert(
        &host_name(),
        &now.format("%Y-%m-%d %H:%M:%S %:z").to_string(),
        location,
        key,
        error,
    );
    if let Err(e) = notifier.notify(&text).await {
        warn!(error = %e, key, operation = "alert_failure", "failure alert not delivered");
    }
}
