// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cycle::{CycleError, CycleRunner};

/// Run a cycle right away and then every `every`. A tick that lands while a
/// cycle (e.g. an on-demand one) is still running is skipped.
pub fn spawn_cycle_scheduler(runner: Arc<CycleRunner>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(target: "scheduler", every_secs = every.as_secs(), "cycle scheduler started");
        loop {
            ticker.tick().await;
            match runner.run_cycle().await {
                Ok(report) => tracing::info!(
                    target: "scheduler",
                    new = report.total_new,
                    notified = report.notified,
                    quota_exhausted = report.quota_exhausted,
                    "scheduled cycle done"
                ),
                Err(CycleError::AlreadyRunning) => {
                    tracing::info!(target: "scheduler", "previous cycle still running; tick skipped")
                }
                Err(e) => tracing::error!(target: "scheduler", error = %e, "scheduled cycle failed"),
            }
        }
    })
}
