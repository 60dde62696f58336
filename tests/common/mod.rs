// Shared test helpers: in-memory counter source, notifier, update feed and a manual clock.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;
use komari_traffic::clock::Clock;
use komari_traffic::config::AppConfig;
use komari_traffic::komari_repo::{CounterSource, FetchOutcome};
use komari_traffic::models::{CounterSnapshot, NodeCounter};
use komari_traffic::telegram_repo::{Chat, Message, Notifier, Update, UpdateSource};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const CHAT_ID: i64 = 4242;

pub fn tz() -> Tz {
    chrono_tz::Asia::Shanghai
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `h:m` on the given day, in Asia/Shanghai.
pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
    tz().with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// (id, name, up, down) rows to a snapshot.
pub fn snapshot(rows: &[(&str, &str, u64, u64)]) -> CounterSnapshot {
    rows.iter()
        .map(|(id, name, up, down)| (id.to_string(), NodeCounter::new(*name, *up, *down)))
        .collect()
}

pub fn config_toml(data_dir: &Path) -> String {
    format!(
        r#"
[komari]
base_url = "http://127.0.0.1:1"

[telegram]
bot_token = "123:abc"
chat_id = "{}"

[storage]
data_dir = "{}"

[history]
hot_days = 60
retention_days = 400

[sampling]
interval_secs = 300
retention_hours = 720

[report]
top_n = 3
timezone = "Asia/Shanghai"
"#,
        CHAT_ID,
        data_dir.display()
    )
}

pub fn test_config(data_dir: &Path) -> AppConfig {
    AppConfig::load_from_str(&config_toml(data_dir)).expect("test config")
}

pub struct ManualClock {
    now: Mutex<DateTime<Tz>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Tz>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Tz>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Tz> {
        *self.now.lock().unwrap()
    }
}

/// Returns whatever snapshot was set last; counts fetches.
pub struct FakeSource {
    current: Mutex<FetchOutcome>,
    fail: Mutex<bool>,
    pub fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new(snapshot: CounterSnapshot) -> Self {
        Self {
            current: Mutex::new(FetchOutcome {
                snapshot,
                skipped: vec![],
            }),
            fail: Mutex::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, snapshot: CounterSnapshot) {
        self.current.lock().unwrap().snapshot = snapshot;
    }

    pub fn set_skipped(&self, skipped: &[&str]) {
        self.current.lock().unwrap().skipped = skipped.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CounterSource for FakeSource {
    async fn fetch_all(&self) -> anyhow::Result<FetchOutcome> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            anyhow::bail!("monitoring api down");
        }
        Ok(self.current.lock().unwrap().clone())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("monitoring api down");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Hands out one scripted batch per poll; records the offsets it was asked for.
#[derive(Default)]
pub struct ScriptedUpdates {
    batches: Mutex<VecDeque<anyhow::Result<Vec<Update>>>>,
    offsets: Mutex<Vec<Option<i64>>>,
}

impl ScriptedUpdates {
    pub fn push(&self, batch: Vec<Update>) {
        self.batches.lock().unwrap().push_back(Ok(batch));
    }

    pub fn push_error(&self, msg: &str) {
        self.batches
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(msg.to_string())));
    }

    pub fn requested_offsets(&self) -> Vec<Option<i64>> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateSource for ScriptedUpdates {
    async fn poll(&self, offset: Option<i64>) -> anyhow::Result<Vec<Update>> {
        self.offsets.lock().unwrap().push(offset);
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![]))
    }
}

pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            chat: Chat { id: chat_id },
            text: Some(text.to_string()),
        }),
        edited_message: None,
    }
}
