// src/bootstrap.rs
//! Wires config into a ready `CycleRunner`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::cycle::{CycleRunner, CycleSettings};
use crate::notify::{DynNotifier, LogNotifier, Subscribers, TelegramNotifier};
use crate::scoring::build_scorer;
use crate::sources::SourceRegistry;
use crate::store::FileJobStore;

/// Directory that holds the store file and the other small state files.
fn state_dir(cfg: &AppConfig) -> PathBuf {
    cfg.store_path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn build_runner(cfg: &AppConfig, registry: &SourceRegistry) -> Result<Arc<CycleRunner>> {
    let dir = state_dir(cfg);

    let sources = registry
        .build_enabled(&cfg.sources)
        .context("building sources")?;
    let store = Arc::new(FileJobStore::open(&cfg.store_path).context("opening job store")?);
    let scorer = build_scorer(&cfg.scoring, Some(&dir)).context("building scorer")?;

    let notifier: DynNotifier = match cfg.telegram.resolve_token() {
        Some(token) => Arc::new(TelegramNotifier::new(token)),
        None => {
            warn!("no TELEGRAM_BOT_TOKEN; notifications are only logged");
            Arc::new(LogNotifier)
        }
    };
    let subscribers = Arc::new(
        Subscribers::with_file(cfg.telegram.chat_ids.iter().copied(), dir.join("subscribers.json"))
            .context("loading subscribers")?,
    );

    info!(
        sources = sources.len(),
        stored = store.len(),
        subscribers = subscribers.list().len(),
        notifier = notifier.name(),
        min_score = cfg.min_score,
        "cycle runner ready"
    );

    Ok(Arc::new(CycleRunner::new(
        sources,
        store,
        scorer,
        notifier,
        subscribers,
        CycleSettings::from(cfg),
    )))
}
