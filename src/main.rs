use anyhow::Result;
use clap::{Parser, Subcommand};
use komari_traffic::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Parser)]
#[command(name = "komari-traffic")]
#[command(about = "Komari node traffic reports over Telegram")]
#[command(version = version::VERSION)]
struct Cli {
    /// Config file (default: $CONFIG_FILE, else ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Clone, Copy)]
enum Cmd {
    /// Send yesterday's report, append it to history, re-anchor today's baseline
    ReportDaily,
    /// Send last week's report from history
    ReportWeekly,
    /// Send last month's report from history
    ReportMonthly,
    /// Answer chat commands and take periodic samples until SIGINT/SIGTERM
    Listen,
    /// Save this week's and this month's start baselines
    Bootstrap,
    /// Move old history days into monthly archives and drop expired ones
    Archive,
    /// Check config, data dir, state files and the monitoring API
    Health,
    /// Parse and validate the config, then exit
    ConfigValidate,
}

impl Cmd {
    fn key(self) -> &'static str {
        match self {
            Cmd::ReportDaily => "report_daily",
            Cmd::ReportWeekly => "report_weekly",
            Cmd::ReportMonthly => "report_monthly",
            Cmd::Listen => "listen",
            Cmd::Bootstrap => "bootstrap",
            Cmd::Archive => "archive",
            Cmd::Health => "health",
            Cmd::ConfigValidate => "config_validate",
        }
    }
}

/// Sets `flag` on Ctrl-C or SIGTERM.
fn spawn_signal_watcher(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("Received shutdown signal; stopping after the current poll");
        flag.store(true, Ordering::Relaxed);
    });
}

struct App {
    config: Arc<config::AppConfig>,
    source: Arc<komari_repo::KomariRepo>,
    telegram: Arc<telegram_repo::TelegramRepo>,
    clock: Arc<clock::SystemClock>,
}

impl App {
    fn build(config: config::AppConfig) -> Result<Self> {
        let clock = Arc::new(clock::SystemClock::new(config.report.tz()?));
        let source = Arc::new(komari_repo::KomariRepo::new(&config.komari)?);
        let telegram = Arc::new(telegram_repo::TelegramRepo::new(
            &config.telegram,
            config.komari.timeout_secs,
        )?);
        Ok(Self {
            config: Arc::new(config),
            source,
            telegram,
            clock,
        })
    }

    fn reporter(&self) -> reports::Reporter {
        reports::Reporter::new(
            self.config.clone(),
            self.source.clone(),
            self.telegram.clone(),
            self.clock.clone(),
        )
    }

    async fn run(&self, cmd: Cmd) -> Result<()> {
        match cmd {
            Cmd::ReportDaily => self.reporter().daily().await,
            Cmd::ReportWeekly => self.reporter().weekly().await,
            Cmd::ReportMonthly => self.reporter().monthly().await,
            Cmd::Bootstrap => self.reporter().bootstrap().await,
            Cmd::Archive => {
                let summary = self.reporter().archive()?;
                tracing::info!(
                    kept = summary.kept,
                    archived = summary.archived,
                    dropped = summary.dropped,
                    "archive done"
                );
                Ok(())
            }
            Cmd::Health => health::check(&self.config, self.source.as_ref()).await,
            Cmd::Listen => self.listen().await,
            Cmd::ConfigValidate => Ok(()),
        }
    }

    async fn listen(&self) -> Result<()> {
        let dir = &self.config.storage.data_dir;
        let shutdown = Arc::new(AtomicBool::new(false));
        spawn_signal_watcher(shutdown.clone());

        let listener = worker::Listener::new(
            worker::ListenerDeps {
                reporter: Arc::new(self.reporter()),
                updates: self.telegram.clone(),
                notifier: self.telegram.clone(),
                clock: self.clock.clone(),
                offsets: offset_repo::OffsetRepo::new(dir),
                throttle: alert::AlertThrottle::from_config(&self.config),
            },
            worker::ListenerConfig {
                chat_id: self.config.telegram.chat_id.clone(),
                error_backoff: std::time::Duration::from_secs(3),
            },
        )?;
        listener.run(shutdown).await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let app_config = match &cli.config {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    if let Cmd::ConfigValidate = cli.command {
        println!("config ok");
        return Ok(());
    }

    tracing::info!(
        name = version::NAME,
        version = version::VERSION,
        command = cli.command.key(),
        data_dir = %app_config.storage.data_dir.display(),
        "starting"
    );
    let app = App::build(app_config)?;
    if !matches!(cli.command, Cmd::Health) {
        persist::ensure_dir(&app.config.storage.data_dir)?;
    }

    if let Err(e) = app.run(cli.command).await {
        tracing::error!(error = %format!("{:#}", e), command = cli.command.key(), "command failed");
        let throttle = alert::AlertThrottle::from_config(&app.config);
        alert::alert_failure(
            app.telegram.as_ref(),
            &throttle,
            app.clock.as_ref(),
            &format!("cmd_{}", cli.command.key()),
            cli.command.key(),
            &e,
        )
        .await;
        return Err(e);
    }
    Ok(())
}
