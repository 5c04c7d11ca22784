// src/scoring/budget.rs
//! Local daily call budget. Once spent, the wrapped scorer reports quota exhaustion
//! so a cycle stops scoring instead of burning through the provider account.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{MatchScore, ScoreError, Scorer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn roll_over(&mut self) -> bool {
        let t = today();
        if self.date != t {
            self.date = t;
            self.count = 0;
            return true;
        }
        false
    }
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

pub struct DailyBudget<S: Scorer> {
    inner: S,
    limit: u32,
    path: Option<PathBuf>,
    counter: Mutex<DailyCounter>,
}

impl<S: Scorer> DailyBudget<S> {
    pub fn new(inner: S, limit: u32, path: Option<PathBuf>) -> Self {
        let counter = path
            .as_ref()
            .and_then(|p| load_counter(p).ok())
            .unwrap_or_default();
        Self {
            inner,
            limit,
            path,
            counter: Mutex::new(counter),
        }
    }

    /// Calls left today.
    pub fn remaining(&self) -> u32 {
        let mut g = self.counter.lock();
        g.roll_over();
        self.limit.saturating_sub(g.count)
    }

    fn save(&self, c: &DailyCounter) {
        if let Some(p) = &self.path {
            if let Err(e) = save_counter(p, c) {
                tracing::warn!(target: "scoring", error = %e, "saving daily budget failed");
            }
        }
    }
}

#[async_trait]
impl<S: Scorer> Scorer for DailyBudget<S> {
    async fn score(
        &self,
        title: &str,
        description: &str,
        company: &str,
        skills: &[String],
    ) -> Result<MatchScore, ScoreError> {
        {
            let mut g = self.counter.lock();
            if g.roll_over() {
                self.save(&g);
            }
            if g.count >= self.limit {
                tracing::warn!(target: "scoring", limit = self.limit, "daily scoring budget spent");
                return Err(ScoreError::quota());
            }
        }

        let out = self.inner.score(title, description, company, skills).await;

        // Calls that reached the provider cost budget, failures included.
        // Rate-limit refusals and connect failures are free.
        if !matches!(
            out,
            Err(ScoreError::RateLimited { .. }) | Err(ScoreError::Transport(_))
        ) {
            let mut g = self.counter.lock();
            g.count = g.count.saturating_add(1);
            self.save(&g);
        }
        out
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

fn load_counter(p: &std::path::Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(p)?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_counter(p: &std::path::Path, c: &DailyCounter) -> io::Result<()> {
    if let Some(dir) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = p.with_extension("json.tmp");
    let s = serde_json::to_string(c).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(s.as_bytes())?;
    fs::rename(tmp, p)?;
    Ok(())
}
