// Telegram Bot API: sendMessage for reports/alerts, getUpdates long poll for commands.

mod retry;

pub use retry::{RetryPolicy, retry_transient};

use crate::config::TelegramConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::instrument;

const API_BASE: &str = "https://api.telegram.org";

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one HTML-formatted message to the configured chat.
    async fn notify(&self, text: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// One long poll. `offset` is the first update id not yet handled.
    async fn poll(&self, offset: Option<i64>) -> anyhow::Result<Vec<Update>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
}

impl Update {
    pub fn any_message(&self) -> Option<&Message> {
        self.message.as_ref().or(self.edited_message.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> anyhow::Result<T> {
        match (self.ok, self.result) {
            (true, Some(r)) => Ok(r),
            _ => anyhow::bail!(
                "telegram {} failed: {}",
                method,
                self.description.as_deref().unwrap_or("no description")
            ),
        }
    }
}

/// Connection resets and timeouts on a long poll are routine; HTTP status errors are not.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_body() || e.is_request()
}

pub struct TelegramRepo {
    client: reqwest::Client,
    base_url: String,
    chat_id: String,
    request_timeout: Duration,
    poll_timeout_secs: u64,
    retry: RetryPolicy,
}

impl TelegramRepo {
    pub fn new(config: &TelegramConfig, request_timeout_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent(crate::version::user_agent())
                .build()?,
            base_url: format!("{}/bot{}", API_BASE, config.bot_token),
            chat_id: config.chat_id.clone(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            poll_timeout_secs: config.poll_timeout_secs,
            retry: RetryPolicy::default(),
        })
    }

    /// The request URL embeds the bot token, so it is stripped from errors.
    async fn call<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>, reqwest::Error> {
        let resp = async { req.send().await?.error_for_status()?.json().await };
        resp.await.map_err(reqwest::Error::without_url)
    }
}

#[async_trait]
impl Notifier for TelegramRepo {
    #[instrument(skip(self, text), fields(repo = "telegram", operation = "send_message", len = text.len()))]
    async fn notify(&self, text: &str) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        let req = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .timeout(self.request_timeout)
            .json(&payload);
        self.call::<serde_json::Value>(req)
            .await?
            .into_result("sendMessage")?;
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramRepo {
    async fn poll(&self, offset: Option<i64>) -> anyhow::Result<Vec<Update>> {
        let mut query: Vec<(&str, String)> = vec![("timeout", self.poll_timeout_secs.to_string())];
        if let Some(o) = offset {
            query.push(("offset", o.to_string()));
        }
        let http_timeout =
            self.request_timeout + Duration::from_secs(self.poll_timeout_secs + 10);
        let url = format!("{}/getUpdates", self.base_url);

        let resp = retry_transient(&self.retry, is_transient, || {
            let req = self
                .client
                .get(&url)
                .query(&query)
                .timeout(http_timeout);
            self.call::<Vec<Update>>(req)
        })
        .await?;
        resp.into_result("getUpdates")
    }
}
