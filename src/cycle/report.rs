// src/cycle/report.rs
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Fetch/dedup outcome for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub fetched: usize,
    pub new: usize,
    pub duplicates: usize,
    /// Set when the fetch failed; counts are then zero.
    pub error: Option<String>,
}

impl SourceReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Summary of one cycle. Lives only long enough to be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub total_fetched: usize,
    pub total_new: usize,
    pub total_duplicates: usize,
    pub analyzed: usize,
    pub analysis_failed: usize,
    pub quota_exhausted: bool,
    pub notified: usize,
    /// Postings whose every recipient failed. They are still marked notified.
    pub notify_failed: usize,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            sources: Vec::new(),
            total_fetched: 0,
            total_new: 0,
            total_duplicates: 0,
            analyzed: 0,
            analysis_failed: 0,
            quota_exhausted: false,
            notified: 0,
            notify_failed: 0,
            duration: Duration::ZERO,
        }
    }

    /// Fill totals from per-source rows and stamp the duration.
    pub fn finish(&mut self, duration: Duration) {
        self.total_fetched = self.sources.iter().map(|s| s.fetched).sum();
        self.total_new = self.sources.iter().map(|s| s.new).sum();
        self.total_duplicates = self.sources.iter().map(|s| s.duplicates).sum();
        self.duration = duration;
    }

    pub fn source_errors(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }

    /// True when nothing was fetched, scored or sent.
    pub fn is_idle(&self) -> bool {
        self.total_fetched == 0
            && self.total_new == 0
            && self.total_duplicates == 0
            && self.analyzed == 0
            && self.analysis_failed == 0
            && self.notified == 0
            && self.notify_failed == 0
    }
}

/// Human-readable summary for chat or CLI output.
pub fn format_report(r: &CycleReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Search cycle finished in {:.1}s",
        r.duration.as_secs_f64()
    );

    if r.sources.is_empty() {
        out.push_str("No sources enabled\n");
    } else {
        out.push_str("Sources:\n");
        for s in &r.sources {
            match &s.error {
                Some(e) => {
                    let _ = writeln!(out, "  - {}: FAILED ({})", s.source, e);
                }
                None => {
                    let _ = writeln!(
                        out,
                        "  - {}: fetched {}, new {}, duplicates {}",
                        s.source, s.fetched, s.new, s.duplicates
                    );
                }
            }
        }
    }
    let _ = writeln!(
        out,
        "Total: fetched {}, new {}, duplicates {}",
        r.total_fetched, r.total_new, r.total_duplicates
    );
    let _ = writeln!(
        out,
        "Scoring: analyzed {}, failed {}",
        r.analyzed, r.analysis_failed
    );
    if r.quota_exhausted {
        out.push_str("Scoring quota exhausted: remaining postings wait for the next cycle\n");
    }
    let _ = write!(out, "Notified: {}", r.notified);
    if r.notify_failed > 0 {
        let _ = write!(out, " (undelivered: {})", r.notify_failed);
    }
    out
}
