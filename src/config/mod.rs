// src/config/mod.rs
//! Service configuration (TOML).
//!
//! Lookup order for `AppConfig::load_default`:
//! 1) $JOB_RADAR_CONFIG
//! 2) config/job_radar.toml
//! 3) built-in defaults

pub mod scoring;
pub mod telegram;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::posting::LocationFilter;
pub use scoring::ScoringConfig;
pub use telegram::TelegramConfig;

pub const ENV_CONFIG_PATH: &str = "JOB_RADAR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/job_radar.toml";

fn default_min_score() -> u8 {
    70
}
fn default_interval_secs() -> u64 {
    3600
}
fn default_store_path() -> PathBuf {
    PathBuf::from("state/jobs.json")
}
fn default_true() -> bool {
    true
}
fn default_source_timeout() -> u64 {
    20
}
fn default_sources() -> Vec<SourceEntry> {
    ["remoteok", "weworkremotely"]
        .into_iter()
        .map(|n| SourceEntry {
            name: n.to_string(),
            enabled: true,
            url: None,
            timeout_secs: default_source_timeout(),
        })
        .collect()
}

/// One `[[sources]]` entry. Order in the file is the fetch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Override the upstream URL (mirrors, tests).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Search keywords passed to every source.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Skills the scorer matches postings against.
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub location: LocationFilter,
    /// Minimum match score (0..=100) for a notification.
    #[serde(default = "default_min_score")]
    pub min_score: u8,
    /// Scheduler period; 0 disables the scheduler.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            skills: Vec::new(),
            location: LocationFilter::default(),
            min_score: default_min_score(),
            interval_secs: default_interval_secs(),
            store_path: default_store_path(),
            sources: default_sources(),
            scoring: ScoringConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing config toml")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        tracing::warn!(target: "config", "no config file found; using defaults");
        Ok(Self::default())
    }

    /// Trim/dedup lists, clamp threshold, normalize source names.
    pub fn sanitized(mut self) -> Self {
        self.keywords = clean_list(self.keywords);
        self.skills = clean_list(self.skills);
        self.min_score = self.min_score.min(100);
        for s in &mut self.sources {
            s.name = s.name.trim().to_ascii_lowercase();
            s.timeout_secs = s.timeout_secs.max(1);
        }
        self.scoring = self.scoring.sanitized();
        self
    }
}

/// Trim, drop empties, dedup case-insensitively; first spelling wins, order kept.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_lowercase()) {
            out.push(t.to_string());
        }
    }
    out
}
