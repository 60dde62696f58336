// Command listener. One tick = maybe-sample, one long poll, dispatch the batch, persist
// the offset. Sampling rides on the listener loop, so samples only exist while it runs.

use crate::alert::{self, AlertThrottle};
use crate::clock::Clock;
use crate::commands;
use crate::offset_repo::OffsetRepo;
use crate::reports::Reporter;
use crate::telegram_repo::{Notifier, Update, UpdateSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Duration;

/// Repos, clients, and clock for the listener.
pub struct ListenerDeps {
    pub reporter: Arc<Reporter>,
    pub updates: Arc<dyn UpdateSource>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub offsets: OffsetRepo,
    pub throttle: AlertThrottle,
}

pub struct ListenerConfig {
    /// Only commands from this chat are handled.
    pub chat_id: String,
    /// Pause after a failed tick before polling again.
    pub error_backoff: Duration,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sampled: bool,
    pub updates: usize,
    pub commands: usize,
    pub failed_commands: usize,
}

pub struct Listener {
    deps: ListenerDeps,
    config: ListenerConfig,
    offset: Option<i64>,
}

impl Listener {
    pub fn new(deps: ListenerDeps, config: ListenerConfig) -> anyhow::Result<Self> {
        let offset = deps.offsets.load()?;
        Ok(Self {
            deps,
            config,
            offset,
        })
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    fn command_text<'a>(&self, update: &'a Update) -> Option<&'a str> {
        let msg = update.any_message()?;
        if msg.chat.id.to_string() != self.config.chat_id.trim() {
            return None;
        }
        msg.text.as_deref()
    }

    async fn alert(&self, key: &str, location: &str, error: &anyhow::Error) {
        alert::alert_failure(
            self.deps.notifier.as_ref(),
            &self.deps.throttle,
            self.deps.clock.as_ref(),
            key,
            location,
            error,
        )
        .await;
    }

    /// One cooperative step. A sampling failure is logged and does not stop the poll;
    /// a failing command is alerted and the batch goes on. Poll and offset errors propagate.
    pub async fn tick(&mut self) -> anyhow::Result<TickReport> {
        let mut report = TickReport::default();

        match self.deps.reporter.take_sample_if_due(false).await {
            Ok(sampled) => report.sampled = sampled,
            Err(e) => tracing::warn!(error = %e, operation = "take_sample", "sampling failed"),
        }

        let updates = self.deps.updates.poll(self.offset).await?;
        report.updates = updates.len();

        for update in &updates {
            self.offset = Some(update.update_id + 1);
            let Some(command) = self.command_text(update).and_then(commands::parse) else {
                continue;
            };
            report.commands += 1;
            tracing::debug!(?command, update_id = update.update_id, "command received");
            if let Err(e) = self.deps.reporter.handle(command).await {
                report.failed_commands += 1;
                tracing::warn!(error = %e, ?command, "command failed");
                self.alert("listen_command", "listener: command", &e).await;
            }
        }

        if let Some(offset) = self.offset
            && !updates.is_empty()
        {
            self.deps.offsets.save(offset)?;
        }
        Ok(report)
    }

    /// Forced startup sample, then ticks until `shutdown` is set.
    pub async fn run(mut self, shutdown: Arc<AtomicBool>) {
        if let Err(e) = self.deps.reporter.take_sample_if_due(true).await {
            tracing::warn!(error = %e, operation = "take_sample", "startup sample failed");
        }
        tracing::info!(offset = ?self.offset, "listener started");

        while !shutdown.load(Ordering::Relaxed) {
            match self.tick().await {
                Ok(report) if report.updates > 0 => {
                    tracing::debug!(
                        updates = report.updates,
                        commands = report.commands,
                        failed = report.failed_commands,
                        sampled = report.sampled,
                        "tick"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, operation = "listen_tick", "listener tick failed");
                    self.alert("listen", "listener: poll", &e).await;
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }
        tracing::info!("listener shutting down");
    }
}
