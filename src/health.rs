// Startup/cron health check. Every failure is fatal; nothing is quarantined or retried.

use crate::baseline_repo::BaselineRepo;
use crate::config::AppConfig;
use crate::history_repo::HistoryRepo;
use crate::komari_repo::CounterSource;
use crate::offset_repo::OffsetRepo;
use crate::persist;
use crate::sample_repo::SampleRepo;
use anyhow::Context;
use std::io::Write;

const PROBE_FILE: &str = ".health_write_test";

pub async fn check(config: &AppConfig, source: &dyn CounterSource) -> anyhow::Result<()> {
    let dir = &config.storage.data_dir;
    persist::ensure_dir(dir).context("data dir")?;

    let probe = dir.join(PROBE_FILE);
    persist::stage_with(&probe, |f| f.write_all(b"ok"))
        .and_then(|s| s.commit())
        .context("data dir not writable")?;
    std::fs::remove_file(&probe)
        .with_context(|| format!("remove {}", probe.display()))?;

    BaselineRepo::new(dir).check()?;
    HistoryRepo::new(dir).check()?;
    SampleRepo::new(dir, &config.sampling).check()?;
    OffsetRepo::new(dir).check()?;

    source.ping().await.context("monitoring source unreachable")?;
    tracing::info!(data_dir = %dir.display(), "health ok");
    Ok(())
}

