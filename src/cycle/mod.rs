// src/cycle/mod.rs
//! Search cycle: fetch & dedup -> score -> notify, one pass at a time.
//!
//! Every unit of work (a source, a posting) fails on its own; the cycle always
//! returns a report. Only store failures abort a cycle.

pub mod report;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;

use crate::config::AppConfig;
use crate::notify::{DynNotifier, Subscribers};
use crate::posting::LocationFilter;
use crate::scoring::{score_with_retry, DynScorer, RetryPolicy};
use crate::sources::DynSource;
use crate::store::JobStore;
pub use report::{format_report, CycleReport, SourceReport};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("cycle_runs_total", "Completed search cycles.");
        describe_counter!("cycle_source_errors_total", "Source fetch failures.");
        describe_counter!("cycle_postings_new_total", "Postings inserted as new.");
        describe_counter!(
            "cycle_postings_duplicate_total",
            "Fetched postings already present in the store."
        );
        describe_counter!("scoring_calls_total", "Scorer invocations, retries included.");
        describe_counter!("scoring_retries_total", "Retries after a transient rate limit.");
        describe_counter!("scoring_failed_total", "Postings left unscored after a failure.");
        describe_counter!(
            "scoring_quota_exhausted_total",
            "Cycles whose scoring stage stopped on quota exhaustion."
        );
        describe_counter!("notify_sent_total", "Postings delivered to at least one recipient.");
        describe_counter!("notify_failed_total", "Postings no recipient received.");
        describe_histogram!("cycle_duration_ms", "Wall-clock cycle duration in milliseconds.");
        describe_gauge!("cycle_last_run_ts", "Unix ts when the last cycle finished.");
    });
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("a search cycle is already running")]
    AlreadyRunning,
    #[error("job store failure: {0:#}")]
    Store(#[source] anyhow::Error),
}

/// Search parameters for a cycle.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub keywords: Vec<String>,
    pub skills: Vec<String>,
    pub location: LocationFilter,
    pub min_score: u8,
    pub retry: RetryPolicy,
}

impl From<&AppConfig> for CycleSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            keywords: cfg.keywords.clone(),
            skills: cfg.skills.clone(),
            location: cfg.location.clone(),
            min_score: cfg.min_score,
            retry: RetryPolicy::from(&cfg.scoring),
        }
    }
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            skills: Vec::new(),
            location: LocationFilter::default(),
            min_score: 70,
            retry: RetryPolicy::default(),
        }
    }
}

/// Built once at startup; the scheduler and the HTTP trigger share one instance.
pub struct CycleRunner {
    sources: Vec<DynSource>,
    store: Arc<dyn JobStore>,
    scorer: DynScorer,
    notifier: DynNotifier,
    subscribers: Arc<Subscribers>,
    settings: CycleSettings,
    gate: tokio::sync::Mutex<()>,
}

impl CycleRunner {
    pub fn new(
        sources: Vec<DynSource>,
        store: Arc<dyn JobStore>,
        scorer: DynScorer,
        notifier: DynNotifier,
        subscribers: Arc<Subscribers>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            sources,
            store,
            scorer,
            notifier,
            subscribers,
            settings,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    pub fn subscribers(&self) -> &Arc<Subscribers> {
        &self.subscribers
    }

    pub fn is_running(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    /// Run one full cycle. Overlapping calls get `CycleError::AlreadyRunning`.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let _guard = self
            .gate
            .try_lock()
            .map_err(|_| CycleError::AlreadyRunning)?;
        ensure_metrics_described();

        let t0 = Instant::now();
        let mut report = CycleReport::new(Utc::now());
        tracing::info!(target: "cycle", sources = self.sources.len(), "search cycle started");

        self.fetch_stage(&mut report).await?;
        self.scoring_stage(&mut report).await?;
        self.notify_stage(&mut report).await?;

        report.finish(t0.elapsed());

        counter!("cycle_runs_total").increment(1);
        histogram!("cycle_duration_ms").record(report.duration.as_secs_f64() * 1_000.0);
        gauge!("cycle_last_run_ts").set(Utc::now().timestamp() as f64);
        tracing::info!(
            target: "cycle",
            fetched = report.total_fetched,
            new = report.total_new,
            duplicates = report.total_duplicates,
            source_errors = report.source_errors(),
            analyzed = report.analyzed,
            analysis_failed = report.analysis_failed,
            quota_exhausted = report.quota_exhausted,
            notified = report.notified,
            duration_ms = report.duration.as_millis() as u64,
            "search cycle finished"
        );
        Ok(report)
    }

    /// Stage A: every enabled source in order; a failing source only fills its `error`.
    async fn fetch_stage(&self, report: &mut CycleReport) -> Result<(), CycleError> {
        let s = &self.settings;
        for source in &self.sources {
            let mut row = SourceReport::new(source.name());

            match source.fetch(&s.keywords, &s.location).await {
                Err(e) => {
                    let msg = format!("{e:#}");
                    tracing::warn!(target: "cycle", source = source.name(), error = %msg, "source fetch failed");
                    counter!("cycle_source_errors_total", "source" => source.name().to_string())
                        .increment(1);
                    row.error = Some(msg);
                }
                Ok(drafts) => {
                    row.fetched = drafts.len();
                    for mut draft in drafts {
                        // the dedup key is scoped by the source that produced it
                        if draft.source != source.name() {
                            draft.source = source.name().to_string();
                        }
                        if self
                            .store
                            .insert_if_absent(draft)
                            .await
                            .map_err(CycleError::Store)?
                        {
                            row.new += 1;
                        } else {
                            row.duplicates += 1;
                        }
                    }
                    counter!("cycle_postings_new_total").increment(row.new as u64);
                    counter!("cycle_postings_duplicate_total").increment(row.duplicates as u64);
                    tracing::debug!(
                        target: "cycle",
                        source = source.name(),
                        fetched = row.fetched,
                        new = row.new,
                        duplicates = row.duplicates,
                        "source done"
                    );
                }
            }
            report.sources.push(row);
        }
        Ok(())
    }

    /// Stage B: score unscored postings; quota exhaustion stops the stage.
    async fn scoring_stage(&self, report: &mut CycleReport) -> Result<(), CycleError> {
        let pending = self.store.unscored().await.map_err(CycleError::Store)?;
        let total = pending.len();
        let s = &self.settings;

        for (idx, p) in pending.into_iter().enumerate() {
            let res = score_with_retry(
                self.scorer.as_ref(),
                &s.retry,
                p.title(),
                &p.draft.description,
                p.company(),
                &s.skills,
            )
            .await;

            match res {
                Ok(m) => {
                    tracing::debug!(target: "cycle", id = p.id, score = m.score, "posting scored");
                    self.store
                        .record_score(p.id, m.score, m.reasoning)
                        .await
                        .map_err(CycleError::Store)?;
                    report.analyzed += 1;
                }
                Err(e) if e.is_quota_exhausted() => {
                    tracing::warn!(
                        target: "cycle",
                        left_unscored = total - idx,
                        "scoring quota exhausted; stopping scoring for this cycle"
                    );
                    counter!("scoring_quota_exhausted_total").increment(1);
                    report.quota_exhausted = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(target: "cycle", id = p.id, error = %e, "scoring failed");
                    counter!("scoring_failed_total").increment(1);
                    report.analysis_failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Stage C: best matches first; a posting is marked notified once a send was attempted.
    async fn notify_stage(&self, report: &mut CycleReport) -> Result<(), CycleError> {
        let recipients = self.subscribers.list();
        if recipients.is_empty() {
            tracing::debug!(target: "cycle", "no subscribers; notifications deferred");
            return Ok(());
        }

        let eligible = self
            .store
            .unnotified_above_threshold(self.settings.min_score)
            .await
            .map_err(CycleError::Store)?;

        for p in eligible {
            let deliveries = self.notifier.send(&recipients, &p).await;
            let mut delivered = 0usize;
            for d in &deliveries {
                match &d.result {
                    Ok(()) => delivered += 1,
                    Err(e) => tracing::warn!(
                        target: "cycle",
                        id = p.id,
                        chat = %d.chat_id,
                        error = %e,
                        "notification failed for recipient"
                    ),
                }
            }

            self.store
                .mark_notified(p.id)
                .await
                .map_err(CycleError::Store)?;

            if delivered > 0 {
                counter!("notify_sent_total").increment(1);
                report.notified += 1;
            } else {
                counter!("notify_failed_total").increment(1);
                report.notify_failed += 1;
            }
        }
        Ok(())
    }
}
