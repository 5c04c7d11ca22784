//! Posting/skill match scoring: provider abstraction, retry policy and daily budget.

pub mod budget;
pub mod mock;
pub mod openai;
pub mod retry;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
pub use budget::DailyBudget;
pub use mock::MockScorer;
pub use openai::OpenAiScorer;
pub use retry::{score_with_retry, RetryPolicy};

/// Score (0..=100) plus the model's short rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    pub score: u8,
    pub reasoning: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    /// `quota_exhausted` separates an account-level cap from a per-minute limit.
    #[error("rate limited (quota exhausted: {quota_exhausted})")]
    RateLimited { quota_exhausted: bool },
    #[error("malformed model output: {0}")]
    Malformed(String),
    /// The request never reached the provider (connect failure).
    #[error("scoring provider unreachable: {0:#}")]
    Transport(#[source] anyhow::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScoreError {
    pub fn transient() -> Self {
        ScoreError::RateLimited {
            quota_exhausted: false,
        }
    }

    pub fn quota() -> Self {
        ScoreError::RateLimited {
            quota_exhausted: true,
        }
    }

    pub fn is_quota_exhausted(&self) -> bool {
        matches!(
            self,
            ScoreError::RateLimited {
                quota_exhausted: true
            }
        )
    }
}

#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(
        &self,
        title: &str,
        description: &str,
        company: &str,
        skills: &[String],
    ) -> Result<MatchScore, ScoreError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynScorer = Arc<dyn Scorer>;

/// Build the configured scorer.
///
/// * `AI_TEST_MODE=mock` or `provider = "mock"` gives the deterministic `MockScorer`.
/// * `provider = "openai"` gives `OpenAiScorer`.
///
/// A non-zero `daily_limit` wraps the scorer in a `DailyBudget` whose counter is
/// kept under `state_dir` when given.
pub fn build_scorer(cfg: &ScoringConfig, state_dir: Option<&Path>) -> anyhow::Result<DynScorer> {
    let mock_mode = std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false);
    let provider = if mock_mode { "mock" } else { cfg.provider.as_str() };

    let counter_path = state_dir.map(|d| d.join("scoring_budget.json"));
    let scorer: DynScorer = match (provider, cfg.daily_limit) {
        ("mock", 0) => Arc::new(MockScorer),
        ("mock", limit) => Arc::new(DailyBudget::new(MockScorer, limit, counter_path)),
        ("openai", limit) => {
            let inner = OpenAiScorer::new(cfg.resolve_api_key()?, &cfg.model)?;
            if limit == 0 {
                Arc::new(inner)
            } else {
                Arc::new(DailyBudget::new(inner, limit, counter_path))
            }
        }
        (other, _) => anyhow::bail!("Unsupported scoring provider: {other}"),
    };
    tracing::info!(
        target: "scoring",
        provider = scorer.name(),
        daily_limit = cfg.daily_limit,
        "scorer ready"
    );
    Ok(scorer)
}

#[derive(Deserialize)]
struct RawAnswer {
    score: f64,
    #[serde(default)]
    reasoning: String,
}

/// Parse `{"score": <0..100>, "reasoning": "..."}`, tolerating code fences or
/// prose around the object.
pub fn parse_model_answer(content: &str) -> Result<MatchScore, ScoreError> {
    static RE_OBJ: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_OBJ.get_or_init(|| regex::Regex::new(r"(?s)\{.*\}").expect("object regex"));

    let json = re
        .find(content)
        .map(|m| m.as_str())
        .ok_or_else(|| ScoreError::Malformed(format!("no JSON object in {:?}", preview(content))))?;
    let raw: RawAnswer = serde_json::from_str(json)
        .map_err(|e| ScoreError::Malformed(format!("{e}: {:?}", preview(content))))?;

    if !raw.score.is_finite() || !(0.0..=100.0).contains(&raw.score) {
        return Err(ScoreError::Malformed(format!(
            "score {} outside 0..=100",
            raw.score
        )));
    }
    Ok(MatchScore {
        score: raw.score.round() as u8,
        reasoning: sanitize_reasoning(&raw.reasoning),
    })
}

fn preview(s: &str) -> String {
    s.chars().take(80).collect()
}

/// Single line, collapsed whitespace, at most 400 chars.
pub fn sanitize_reasoning(input: &str) -> String {
    const MAX: usize = 400;
    let mut out = String::with_capacity(input.len().min(MAX));
    let mut len = 0usize;
    let mut prev_space = false;
    for ch in input.chars() {
        if len >= MAX {
            break;
        }
        if ch.is_whitespace() {
            if !prev_space && len > 0 {
                out.push(' ');
                len += 1;
            }
            prev_space = true;
        } else {
            out.push(ch);
            len += 1;
            prev_space = false;
        }
    }
    out.trim().to_string()
}
