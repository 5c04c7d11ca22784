// tests/common/mod.rs
//
// In-process fakes for the cycle's three seams: sources, scorer, notifier.
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use job_radar::cycle::CycleSettings;
use job_radar::notify::{ChatId, Delivery, DynNotifier, Notifier, Subscribers};
use job_radar::scoring::{DynScorer, MatchScore, ScoreError, Scorer};
use job_radar::sources::{DynSource, Source};
use job_radar::store::{FileJobStore, JobStore};
use job_radar::{CycleRunner, LocationFilter, Posting, PostingDraft};

pub fn draft(source: &str, id: &str, title: &str) -> PostingDraft {
    PostingDraft {
        source: source.into(),
        external_id: id.into(),
        title: title.into(),
        company: "Acme".into(),
        url: format!("https://jobs.test/{source}/{id}"),
        description: format!("{title} working on Rust services"),
        location: "Remote".into(),
        tags: vec!["rust".into()],
        posted_at: None,
    }
}

// ---------- sources ----------

/// Returns whatever `set` last put in; `fail` makes every fetch error out.
pub struct FakeSource {
    name: String,
    drafts: Mutex<Vec<PostingDraft>>,
    error: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(name: &str, drafts: Vec<PostingDraft>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            drafts: Mutex::new(drafts),
            error: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str, msg: &str) -> Arc<Self> {
        let s = Self::new(name, Vec::new());
        *s.error.lock() = Some(msg.into());
        s
    }

    pub fn set(&self, drafts: Vec<PostingDraft>) {
        *self.drafts.lock() = drafts;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        _keywords: &[String],
        _location: &LocationFilter,
    ) -> anyhow::Result<Vec<PostingDraft>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.error.lock().clone() {
            return Err(anyhow!(msg));
        }
        Ok(self.drafts.lock().clone())
    }
}

/// Parks inside `fetch` until released; lets tests hold a cycle open.
pub struct GateSource {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
    calls: AtomicUsize,
}

impl GateSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for GateSource {
    fn name(&self) -> &str {
        "gate"
    }

    async fn fetch(
        &self,
        _keywords: &[String],
        _location: &LocationFilter,
    ) -> anyhow::Result<Vec<PostingDraft>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![draft("gate", "1", "Rust Engineer")])
    }
}

// ---------- scorers ----------

/// Plays back queued outcomes in call order; once empty, falls back to `score_for(title)`.
pub struct ScriptedScorer {
    script: Mutex<VecDeque<Result<MatchScore, ScoreError>>>,
    score_for: fn(&str) -> u8,
    pub seen: Mutex<Vec<String>>,
    pub call_times: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedScorer {
    pub fn new(script: Vec<Result<MatchScore, ScoreError>>) -> Arc<Self> {
        Self::with_fallback(script, |_| 80)
    }

    pub fn with_fallback(
        script: Vec<Result<MatchScore, ScoreError>>,
        score_for: fn(&str) -> u8,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            score_for,
            seen: Mutex::new(Vec::new()),
            call_times: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

pub fn score(n: u8) -> Result<MatchScore, ScoreError> {
    Ok(MatchScore {
        score: n,
        reasoning: format!("scored {n}"),
    })
}

#[async_trait]
impl Scorer for ScriptedScorer {
    async fn score(
        &self,
        title: &str,
        _description: &str,
        _company: &str,
        _skills: &[String],
    ) -> Result<MatchScore, ScoreError> {
        self.seen.lock().push(title.to_string());
        self.call_times.lock().push(tokio::time::Instant::now());
        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        score((self.score_for)(title))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// ---------- notifiers ----------

/// Records every (chat, posting id) attempt; chats in `failing` always fail.
#[derive(Default)]
pub struct RecordingNotifier {
    failing: HashSet<ChatId>,
    pub sent: Mutex<Vec<(ChatId, u64)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_for(chats: &[ChatId]) -> Arc<Self> {
        Arc::new(Self {
            failing: chats.iter().copied().collect(),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn posting_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = Vec::new();
        for (_, id) in self.sent.lock().iter() {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipients: &[ChatId], posting: &Posting) -> Vec<Delivery> {
        recipients
            .iter()
            .map(|&chat| {
                self.sent.lock().push((chat, posting.id));
                if self.failing.contains(&chat) {
                    Delivery::failed(chat, anyhow!("chat {chat} blocked the bot"))
                } else {
                    Delivery::ok(chat)
                }
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

// ---------- wiring ----------

pub struct Harness {
    pub runner: Arc<CycleRunner>,
    pub store: Arc<FileJobStore>,
}

pub fn harness(
    sources: Vec<DynSource>,
    scorer: DynScorer,
    notifier: DynNotifier,
    chats: &[ChatId],
    settings: CycleSettings,
) -> Harness {
    let store = Arc::new(FileJobStore::in_memory());
    let runner = Arc::new(CycleRunner::new(
        sources,
        store.clone() as Arc<dyn JobStore>,
        scorer,
        notifier,
        Arc::new(Subscribers::new(chats.iter().copied())),
        settings,
    ));
    Harness { runner, store }
}

/// Settings with a zero backoff so retries don't slow the suite.
pub fn fast_settings(min_score: u8) -> CycleSettings {
    let mut s = CycleSettings {
        min_score,
        ..Default::default()
    };
    s.retry.base_delay = std::time::Duration::ZERO;
    s
}

pub async fn all_postings(store: &FileJobStore, upto: u64) -> Vec<Posting> {
    let mut out = Vec::new();
    for id in 0..upto {
        if let Some(p) = store.get(id).await.expect("store get") {
            out.push(p);
        }
    }
    out
}
