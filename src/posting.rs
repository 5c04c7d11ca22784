// src/posting.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location filter handed to every source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationFilter {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    /// Accept remote postings.
    #[serde(default = "default_remote")]
    pub remote: bool,
}

fn default_remote() -> bool {
    true
}

impl Default for LocationFilter {
    fn default() -> Self {
        Self {
            country: None,
            city: None,
            remote: default_remote(),
        }
    }
}

/// A candidate posting as produced by a source, before it hits the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingDraft {
    pub source: String,      // e.g. "remoteok", "weworkremotely"
    pub external_id: String, // upstream id, unique within `source`
    pub title: String,
    pub company: String,
    pub url: String,
    pub description: String,
    pub location: String,
    pub tags: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

impl PostingDraft {
    /// Natural key used for dedup.
    pub fn key(&self) -> (&str, &str) {
        (&self.source, &self.external_id)
    }
}

/// A stored posting plus its analysis/notification state.
///
/// `match_score` and `notified` only ever move forward:
/// unscored -> scored, unnotified -> notified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub id: u64,
    #[serde(flatten)]
    pub draft: PostingDraft,
    pub match_score: Option<u8>, // 0..=100
    pub match_reasoning: Option<String>,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

impl Posting {
    pub fn from_draft(id: u64, draft: PostingDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            draft,
            match_score: None,
            match_reasoning: None,
            notified: false,
            created_at,
        }
    }

    pub fn is_scored(&self) -> bool {
        self.match_score.is_some()
    }

    pub fn title(&self) -> &str {
        &self.draft.title
    }

    pub fn company(&self) -> &str {
        &self.draft.company
    }
}
