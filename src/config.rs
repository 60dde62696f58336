use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub komari: KomariConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KomariConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_api_token_header")]
    pub api_token_header: String,
    #[serde(default = "default_api_token_prefix")]
    pub api_token_prefix: String,
    /// Per-request timeout, also the base of the Telegram request timeouts.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Max concurrent per-node requests.
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,
}

fn default_api_token_header() -> String {
    "Authorization".into()
}

fn default_api_token_prefix() -> String {
    "Bearer".into()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_fetch_workers() -> usize {
    6
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Only commands from this chat are handled; reports and alerts go here.
    pub chat_id: String,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Minimum seconds between two failure alerts of the same kind.
    #[serde(default = "default_alert_interval_secs")]
    pub alert_interval_secs: u64,
}

fn default_poll_timeout_secs() -> u64 {
    50
}

fn default_alert_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/komari-traffic")
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Days kept uncompressed in history.json.
    #[serde(default = "default_hot_days")]
    pub hot_days: u32,
    /// Days kept at all (hot + monthly gzip archives).
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            hot_days: default_hot_days(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_hot_days() -> u32 {
    60
}

fn default_retention_days() -> u32 {
    400
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_sample_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_sample_retention_hours")]
    pub retention_hours: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sample_interval_secs(),
            retention_hours: default_sample_retention_hours(),
        }
    }
}

fn default_sample_interval_secs() -> u64 {
    300
}

fn default_sample_retention_hours() -> u64 {
    720
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// IANA zone for calendar days and displayed times, e.g. "Asia/Shanghai".
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            timezone: default_timezone(),
        }
    }
}

fn default_top_n() -> usize {
    3
}

fn default_timezone() -> String {
    "Asia/Shanghai".into()
}

impl ReportConfig {
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("report.timezone {:?}: {}", self.timezone, e))
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        Self::load_from_path(Path::new(&path))
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read config {}: {}", path.display(), e))?;
        Self::load_from_str(&s)
            .map_err(|e| anyhow::anyhow!("config {}: {:#}", path.display(), e))
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.komari.base_url.trim().is_empty(),
            "komari.base_url must be non-empty"
        );
        anyhow::ensure!(
            !self.telegram.bot_token.trim().is_empty(),
            "telegram.bot_token must be non-empty"
        );
        anyhow::ensure!(
            !self.telegram.chat_id.trim().is_empty(),
            "telegram.chat_id must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.data_dir.as_os_str().is_empty(),
            "storage.data_dir must be non-empty"
        );
        anyhow::ensure!(
            self.komari.timeout_secs > 0,
            "komari.timeout_secs must be > 0, got {}",
            self.komari.timeout_secs
        );
        anyhow::ensure!(
            self.komari.fetch_workers > 0,
            "komari.fetch_workers must be > 0, got {}",
            self.komari.fetch_workers
        );
        anyhow::ensure!(
            self.telegram.poll_timeout_secs > 0,
            "telegram.poll_timeout_secs must be > 0, got {}",
            self.telegram.poll_timeout_secs
        );
        anyhow::ensure!(
            self.history.hot_days > 0,
            "history.hot_days must be > 0, got {}",
            self.history.hot_days
        );
        anyhow::ensure!(
            self.history.retention_days > 0,
            "history.retention_days must be > 0, got {}",
            self.history.retention_days
        );
        anyhow::ensure!(
            self.sampling.interval_secs > 0,
            "sampling.interval_secs must be > 0, got {}",
            self.sampling.interval_secs
        );
        anyhow::ensure!(
            self.sampling.retention_hours > 0,
            "sampling.retention_hours must be > 0, got {}",
            self.sampling.retention_hours
        );
        anyhow::ensure!(
            self.report.top_n > 0,
            "report.top_n must be > 0, got {}",
            self.report.top_n
        );
        self.report.tz()?;
        if self.history.retention_days < self.history.hot_days {
            tracing::warn!(
                hot_days = self.history.hot_days,
                retention_days = self.history.retention_days,
                "history.retention_days < history.hot_days; archived days will be dropped immediately"
            );
        }
        Ok(())
    }
}
