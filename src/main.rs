//! Job radar service: binary entrypoint.
//! Boots the Axum HTTP server and the recurring cycle scheduler around one shared `CycleRunner`.

use std::time::Duration;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use job_radar::api::{self, AppState};
use job_radar::bootstrap::build_runner;
use job_radar::config::AppConfig;
use job_radar::metrics::Metrics;
use job_radar::scheduler::spawn_cycle_scheduler;
use job_radar::sources::SourceRegistry;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    job_radar::init_tracing();

    let cfg = AppConfig::load_default().context("loading config")?;
    let runner = build_runner(&cfg, &SourceRegistry::with_builtin())?;

    let metrics = match Metrics::init() {
        Ok(m) => Some(m.handle),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "metrics disabled");
            None
        }
    };

    if cfg.interval_secs > 0 {
        spawn_cycle_scheduler(runner.clone(), Duration::from_secs(cfg.interval_secs));
    } else {
        tracing::info!("scheduler disabled (interval_secs = 0); use POST /cycle");
    }

    let router = api::router(AppState { runner, metrics });
    Ok(router.into())
}
