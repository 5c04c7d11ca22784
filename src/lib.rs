// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod cycle;
pub mod metrics;
pub mod notify;
pub mod posting;
pub mod scheduler;
pub mod scoring;
pub mod sources;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::cycle::{format_report, CycleError, CycleReport, CycleRunner, SourceReport};
pub use crate::posting::{LocationFilter, Posting, PostingDraft};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs (`LOG_FORMAT=json` for JSON lines); `RUST_LOG` overrides the filter.
/// Uses `try_init` so a host runtime that already owns the subscriber wins.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "job_radar=info,cycle=info,scheduler=info,scoring=info,sources=info,notify=info,store=info,api=info,config=info,warn",
        )
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
