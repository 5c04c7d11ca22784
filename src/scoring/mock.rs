// src/scoring/mock.rs
use async_trait::async_trait;

use super::{MatchScore, ScoreError, Scorer};

/// Deterministic scorer for local runs: share of skills mentioned in the posting.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockScorer;

#[async_trait]
impl Scorer for MockScorer {
    async fn score(
        &self,
        title: &str,
        description: &str,
        _company: &str,
        skills: &[String],
    ) -> Result<MatchScore, ScoreError> {
        if skills.is_empty() {
            return Ok(MatchScore {
                score: 0,
                reasoning: "No skills configured (mock)".to_string(),
            });
        }
        let haystack = format!("{title} {description}").to_lowercase();
        let hits: Vec<&String> = skills
            .iter()
            .filter(|s| haystack.contains(&s.to_lowercase()))
            .collect();
        let score = (hits.len() * 100 / skills.len()) as u8;
        let reasoning = if hits.is_empty() {
            "No listed skills mentioned (mock)".to_string()
        } else {
            let names: Vec<&str> = hits.iter().map(|s| s.as_str()).collect();
            format!("Mentions {} (mock)", names.join(", "))
        };
        Ok(MatchScore { score, reasoning })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scores_by_skill_share() {
        let skills = vec!["Rust".to_string(), "Tokio".to_string(), "Kafka".into(), "SQL".into()];
        let m = MockScorer
            .score("Rust engineer", "Async services on tokio", "Acme", &skills)
            .await
            .unwrap();
        assert_eq!(m.score, 50);
        assert!(m.reasoning.contains("Rust"));
    }
}
