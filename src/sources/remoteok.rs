// src/sources/remoteok.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use std::sync::Arc;

use super::{clean_text, matches_query, DynSource, Feed, Source, SourceSettings};
use crate::posting::{LocationFilter, PostingDraft};

pub const NAME: &str = "remoteok";
const DEFAULT_URL: &str = "https://remoteok.com/api";

/// Upstream ids come as either numbers or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(u64),
    Str(String),
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<RawId>,
    // the first array element is a legal notice without `position`
    position: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    date: Option<String>,
}

/// remoteok.com JSON API.
pub struct RemoteOkSource {
    feed: Feed,
}

impl RemoteOkSource {
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        let url = settings.url.as_deref().unwrap_or(DEFAULT_URL);
        Ok(Self {
            feed: Feed::http(url, settings.timeout)?,
        })
    }

    pub fn from_fixture(content: &str) -> Self {
        Self {
            feed: Feed::Fixture(content.to_string()),
        }
    }
}

pub fn build(settings: &SourceSettings) -> Result<DynSource> {
    Ok(Arc::new(RemoteOkSource::new(settings)?))
}

fn parse_entries(body: &str) -> Result<Vec<PostingDraft>> {
    let entries: Vec<Entry> = serde_json::from_str(body).context("parsing remoteok json")?;
    let mut out = Vec::with_capacity(entries.len());
    for e in entries {
        let (Some(id), Some(position)) = (e.id, e.position) else {
            continue;
        };
        let external_id = match id {
            RawId::Num(n) => n.to_string(),
            RawId::Str(s) => s,
        };
        out.push(PostingDraft {
            source: NAME.to_string(),
            external_id,
            title: clean_text(&position),
            company: clean_text(e.company.as_deref().unwrap_or_default()),
            url: e.url.unwrap_or_default(),
            description: clean_text(e.description.as_deref().unwrap_or_default()),
            location: clean_text(e.location.as_deref().unwrap_or("Remote")),
            tags: e.tags.into_iter().map(|t| t.trim().to_lowercase()).collect(),
            posted_at: e
                .date
                .as_deref()
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                .map(|d| d.with_timezone(&Utc)),
        });
    }
    Ok(out)
}

#[async_trait]
impl Source for RemoteOkSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(
        &self,
        keywords: &[String],
        location: &LocationFilter,
    ) -> Result<Vec<PostingDraft>> {
        let body = self.feed.load().await?;

        let t0 = std::time::Instant::now();
        let all = parse_entries(&body)?;
        histogram!("source_parse_ms", "source" => NAME).record(t0.elapsed().as_secs_f64() * 1_000.0);

        let out: Vec<PostingDraft> = all
            .into_iter()
            .filter(|d| matches_query(d, keywords, location))
            .collect();
        counter!("source_postings_total", "source" => NAME).increment(out.len() as u64);
        Ok(out)
    }
}
