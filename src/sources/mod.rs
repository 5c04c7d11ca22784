// src/sources/mod.rs
pub mod remoteok;
pub mod weworkremotely;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

use crate::config::SourceEntry;
use crate::posting::{LocationFilter, PostingDraft};

/// One upstream job site.
#[async_trait]
pub trait Source: Send + Sync {
    /// Name used in config and in `PostingDraft::source`.
    fn name(&self) -> &str;
    async fn fetch(
        &self,
        keywords: &[String],
        location: &LocationFilter,
    ) -> Result<Vec<PostingDraft>>;
}

pub type DynSource = Arc<dyn Source>;

/// Where a source reads its raw payload from.
pub enum Feed {
    Http { client: reqwest::Client, url: String },
    Fixture(String),
}

impl Feed {
    pub fn http(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("job-radar/0.1 (+github.com/lumlich/job-radar)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Feed::Http {
            client,
            url: url.into(),
        })
    }

    pub async fn load(&self) -> Result<String> {
        match self {
            Feed::Fixture(body) => Ok(body.clone()),
            Feed::Http { client, url } => {
                let rsp = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("GET {url}"))?
                    .error_for_status()
                    .with_context(|| format!("GET {url} non-2xx"))?;
                rsp.text().await.context("reading response body")
            }
        }
    }
}

/// Per-entry settings handed to a source constructor.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: Option<String>,
    pub timeout: Duration,
}

impl From<&SourceEntry> for SourceSettings {
    fn from(e: &SourceEntry) -> Self {
        Self {
            url: e.url.clone(),
            timeout: Duration::from_secs(e.timeout_secs),
        }
    }
}

pub type SourceCtor = fn(&SourceSettings) -> Result<DynSource>;

/// Maps a configured site name to a constructor.
pub struct SourceRegistry {
    ctors: BTreeMap<String, SourceCtor>,
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self {
            ctors: BTreeMap::new(),
        }
    }

    /// Registry with every built-in site.
    pub fn with_builtin() -> Self {
        let mut r = Self::empty();
        r.register(remoteok::NAME, remoteok::build);
        r.register(weworkremotely::NAME, weworkremotely::build);
        r
    }

    pub fn register(&mut self, name: &str, ctor: SourceCtor) {
        self.ctors.insert(name.to_ascii_lowercase(), ctor);
    }

    pub fn names(&self) -> Vec<&str> {
        self.ctors.keys().map(String::as_str).collect()
    }

    pub fn build(&self, entry: &SourceEntry) -> Result<DynSource> {
        let ctor = self
            .ctors
            .get(&entry.name.to_ascii_lowercase())
            .ok_or_else(|| {
                anyhow!(
                    "unknown source '{}' (known: {})",
                    entry.name,
                    self.names().join(", ")
                )
            })?;
        ctor(&SourceSettings::from(entry))
            .with_context(|| format!("constructing source '{}'", entry.name))
    }

    /// Build every enabled entry, keeping configured order.
    pub fn build_enabled(&self, entries: &[SourceEntry]) -> Result<Vec<DynSource>> {
        let out = entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| self.build(e))
            .collect::<Result<Vec<_>>>()?;
        if out.is_empty() && !entries.is_empty() {
            tracing::warn!(target: "sources", "all configured sources are disabled");
        }
        Ok(out)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Decode entities, strip tags, collapse whitespace, cap length.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| {
        regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex")
    });
    out = re_tags.replace_all(&out, " ").to_string();

    // Some feeds double-encode (&amp;lt;p&amp;gt;)
    if out.contains('&') {
        out = html_escape::decode_html_entities(&out).to_string();
    }

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 4000 {
        out = out.chars().take(4000).collect();
    }
    out
}

/// Stable id for upstream items that carry none: sha256(url), first 16 hex chars.
pub fn stable_id(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

const REMOTE_MARKERS: [&str; 4] = ["remote", "anywhere", "worldwide", "global"];

/// Empty keyword list matches everything; otherwise any keyword must occur
/// (case-insensitive) in title, tags or description.
pub fn matches_keywords(draft: &PostingDraft, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let title = draft.title.to_lowercase();
    let desc = draft.description.to_lowercase();
    let tags: Vec<String> = draft.tags.iter().map(|t| t.to_lowercase()).collect();
    keywords.iter().map(|k| k.to_lowercase()).any(|k| {
        title.contains(&k) || desc.contains(&k) || tags.iter().any(|t| t.contains(&k))
    })
}

pub fn matches_location(location: &str, filter: &LocationFilter) -> bool {
    let loc = location.to_lowercase();
    let is_remote = loc.trim().is_empty() || REMOTE_MARKERS.iter().any(|m| loc.contains(m));
    if is_remote {
        return filter.remote;
    }
    let wanted: Vec<String> = [&filter.city, &filter.country]
        .into_iter()
        .flatten()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    wanted.is_empty() || wanted.iter().any(|w| loc.contains(w.as_str()))
}

pub fn matches_query(draft: &PostingDraft, keywords: &[String], location: &LocationFilter) -> bool {
    matches_keywords(draft, keywords) && matches_location(&draft.location, location)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str, location: &str, tags: &[&str]) -> PostingDraft {
        PostingDraft {
            source: "t".into(),
            external_id: "1".into(),
            title: title.into(),
            company: "Acme".into(),
            url: "https://x.test".into(),
            description: "We ship Tokio services.".into(),
            location: location.into(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            posted_at: None,
        }
    }

    #[test]
    fn clean_text_strips_tags_and_entities() {
        let s = "<p>Hello&nbsp;&amp; <b>welcome</b></p>\n\n  aboard";
        assert_eq!(clean_text(s), "Hello & welcome aboard");
    }

    #[test]
    fn stable_id_is_deterministic() {
        assert_eq!(stable_id("https://a"), stable_id("https://a"));
        assert_ne!(stable_id("https://a"), stable_id("https://b"));
        assert_eq!(stable_id("https://a").len(), 16);
    }

    #[test]
    fn keywords_match_title_tags_or_description() {
        let d = draft("Backend Engineer", "Remote", &["Rust", "Postgres"]);
        assert!(matches_keywords(&d, &["rust".into()]));
        assert!(matches_keywords(&d, &["tokio".into()]));
        assert!(matches_keywords(&d, &["backend".into()]));
        assert!(!matches_keywords(&d, &["golang".into()]));
        assert!(matches_keywords(&d, &[]));
    }

    #[test]
    fn location_rules() {
        let remote_ok = LocationFilter {
            remote: true,
            ..Default::default()
        };
        let berlin_only = LocationFilter {
            country: Some("Germany".into()),
            city: Some("Berlin".into()),
            remote: false,
        };
        assert!(matches_location("Remote - Europe", &remote_ok));
        assert!(!matches_location("Remote - Europe", &berlin_only));
        assert!(matches_location("Berlin, Germany", &berlin_only));
        assert!(matches_location("Munich, Germany", &berlin_only));
        assert!(!matches_location("Paris, France", &berlin_only));
        // no city/country set: any on-site location passes
        assert!(matches_location("Paris, France", &remote_ok));
    }

    #[test]
    fn registry_rejects_unknown_names() {
        let reg = SourceRegistry::with_builtin();
        let entry = SourceEntry {
            name: "nope".into(),
            enabled: true,
            url: None,
            timeout_secs: 5,
        };
        let err = reg.build(&entry).err().expect("unknown source must fail");
        assert!(err.to_string().contains("unknown source"));
        assert!(reg.names().contains(&"remoteok"));
        assert!(reg.names().contains(&"weworkremotely"));
    }

    #[test]
    fn build_enabled_skips_disabled_and_keeps_order() {
        let reg = SourceRegistry::with_builtin();
        let entries = vec![
            SourceEntry {
                name: "weworkremotely".into(),
                enabled: true,
                url: None,
                timeout_secs: 5,
            },
            SourceEntry {
                name: "remoteok".into(),
                enabled: false,
                url: None,
                timeout_secs: 5,
            },
        ];
        let built = reg.build_enabled(&entries).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].name(), "weworkremotely");
    }
}
