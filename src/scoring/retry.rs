// src/scoring/retry.rs
//! Backoff on transient rate limits. Quota exhaustion and every other error
//! class go straight back to the caller.

use std::time::Duration;

use metrics::counter;

use super::{MatchScore, ScoreError, Scorer};
use crate::config::ScoringConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(3),
        }
    }
}

impl From<&ScoringConfig> for RetryPolicy {
    fn from(cfg: &ScoringConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_secs(cfg.base_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): base, 2*base, 4*base, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << retry.min(16))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Score one posting under `policy`. A score above 100 is reported as
/// `ScoreError::Malformed`, whatever the scorer implementation.
pub async fn score_with_retry(
    scorer: &dyn Scorer,
    policy: &RetryPolicy,
    title: &str,
    description: &str,
    company: &str,
    skills: &[String],
) -> Result<MatchScore, ScoreError> {
    let mut retry = 0u32;
    loop {
        counter!("scoring_calls_total").increment(1);
        match scorer.score(title, description, company, skills).await {
            Ok(m) if m.score > 100 => {
                return Err(ScoreError::Malformed(format!(
                    "{} returned score {} outside 0..=100",
                    scorer.name(),
                    m.score
                )))
            }
            Ok(m) => return Ok(m),
            Err(ScoreError::RateLimited {
                quota_exhausted: false,
            }) if retry < policy.max_retries => {
                let delay = policy.delay_for(retry);
                retry += 1;
                counter!("scoring_retries_total").increment(1);
                tracing::warn!(
                    target: "scoring",
                    attempt = retry,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_from_base() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_secs(3));
        assert_eq!(p.delay_for(1), Duration::from_secs(6));
        assert_eq!(p.delay_for(2), Duration::from_secs(12));
        assert_eq!(p.max_attempts(), 3);
    }

    #[test]
    fn policy_follows_config() {
        let cfg = ScoringConfig {
            max_retries: 4,
            base_delay_secs: 1,
            ..Default::default()
        };
        let p = RetryPolicy::from(&cfg);
        assert_eq!(p.max_retries, 4);
        assert_eq!(p.delay_for(3), Duration::from_secs(8));
    }
}
