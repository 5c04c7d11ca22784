// src/sources/weworkremotely.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use super::{clean_text, matches_query, stable_id, DynSource, Feed, Source, SourceSettings};
use crate::posting::{LocationFilter, PostingDraft};

pub const NAME: &str = "weworkremotely";
const DEFAULT_URL: &str = "https://weworkremotely.com/categories/remote-programming-jobs.rss";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    region: Option<String>,
    #[serde(rename = "category", default)]
    category: Vec<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let unix = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?.unix_timestamp();
    DateTime::from_timestamp(unix, 0)
}

/// Titles look like "Company: Role".
fn split_title(raw: &str) -> (String, String) {
    match raw.split_once(": ") {
        Some((company, role)) => (company.trim().to_string(), role.trim().to_string()),
        None => (String::new(), raw.trim().to_string()),
    }
}

/// We Work Remotely category RSS feed.
pub struct WeWorkRemotelySource {
    feed: Feed,
}

impl WeWorkRemotelySource {
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
    Ok(Arc::new(WeWorkRemotelySource::new(settings)?))
}

fn parse_items(xml: &str) -> Result<Vec<PostingDraft>> {
    let rss: Rss = from_str(xml).context("parsing weworkremotely rss xml")?;
    let mut out = Vec::with_capacity(rss.channel.item.len());

    for it in rss.channel.item {
        let raw_title = clean_text(it.title.as_deref().unwrap_or_default());
        if raw_title.is_empty() {
            continue;
        }
        let (company, title) = split_title(&raw_title);
        let url = it.link.unwrap_or_default();
        let external_id = match it.guid.as_deref().map(str::trim) {
            Some(g) if !g.is_empty() => g.to_string(),
            _ => stable_id(&url),
        };
        out.push(PostingDraft {
            source: NAME.to_string(),
            external_id,
            title,
            company,
            url,
            description: clean_text(it.description.as_deref().unwrap_or_default()),
            location: clean_text(it.region.as_deref().unwrap_or("Anywhere in the World")),
            tags: it
                .category
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
            posted_at: it.pub_date.as_deref().and_then(parse_rfc2822),
        });
    }
    Ok(out)
}

#[async_trait]
impl Source for WeWorkRemotelySource {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(
        &self,
        keywords: &[String],
        location: &LocationFilter,
    ) -> Result<Vec<PostingDraft>> {
        let xml = self.feed.load().await?;

        let t0 = std::time::Instant::now();
        let all = parse_items(&xml)?;
        histogram!("source_parse_ms", "source" => NAME).record(t0.elapsed().as_secs_f64() * 1_000.0);

        let out: Vec<PostingDraft> = all
            .into_iter()
            .filter(|d| matches_query(d, keywords, location))
            .collect();
        counter!("source_postings_total", "source" => NAME).increment(out.len() as u64);
        Ok(out)
    }
}
