// src/store.rs
//! Deduplicating posting store.
//!
//! `FileJobStore` keeps everything in memory and, when opened with a path,
//! snapshots the full state to a JSON file after each mutation (tmp + rename).
//! Snapshots are serialized under the state lock and written on the blocking
//! pool; the writer lock keeps mutations and their writes in order.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::posting::{Posting, PostingDraft};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert unless `(source, external_id)` already exists. Returns `true` if newly created.
    async fn insert_if_absent(&self, draft: PostingDraft) -> Result<bool>;
    /// Postings without a match score, oldest first.
    async fn unscored(&self) -> Result<Vec<Posting>>;
    /// Set score + reasoning in one step. A posting that is already scored keeps its score.
    async fn record_score(&self, id: u64, score: u8, reasoning: String) -> Result<()>;
    /// Scored, unnotified postings with `score >= min_score`, best first.
    async fn unnotified_above_threshold(&self, min_score: u8) -> Result<Vec<Posting>>;
    async fn mark_notified(&self, id: u64) -> Result<()>;
    async fn get(&self, id: u64) -> Result<Option<Posting>>;
}

type Key = (String, String);

fn owned_key(draft: &PostingDraft) -> Key {
    let (source, external_id) = draft.key();
    (source.to_owned(), external_id.to_owned())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    postings: Vec<Posting>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    by_id: BTreeMap<u64, Posting>,
    by_key: HashMap<Key, u64>,
}

impl State {
    fn from_snapshot(snap: Snapshot) -> Self {
        let mut st = State {
            next_id: snap.next_id,
            ..Default::default()
        };
        for p in snap.postings {
            st.next_id = st.next_id.max(p.id + 1);
            st.by_key.insert(owned_key(&p.draft), p.id);
            st.by_id.insert(p.id, p);
        }
        st
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            next_id: self.next_id,
            postings: self.by_id.values().cloned().collect(),
        }
    }
}

pub struct FileJobStore {
    path: Option<PathBuf>,
    state: Mutex<State>,
    writer: tokio::sync::Mutex<()>,
}

impl FileJobStore {
    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(State::default()),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    /// Open (or create) a store backed by `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read_to_string(&path) {
            Ok(s) => {
                let snap: Snapshot = serde_json::from_str(&s)
                    .with_context(|| format!("parsing store file {}", path.display()))?;
                State::from_snapshot(snap)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading store file {}", path.display()))
            }
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating store dir {}", dir.display()))?;
        }
        tracing::info!(
            target: "store",
            path = %path.display(),
            postings = state.by_id.len(),
            "job store opened"
        );
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
            writer: tokio::sync::Mutex::new(()),
        })
    }

    pub fn len(&self) -> usize {
        self.state.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialized snapshot, or `None` for an in-memory store.
    fn encode(&self, st: &State) -> Result<Option<Vec<u8>>> {
        if self.path.is_none() {
            return Ok(None);
        }
        serde_json::to_vec(&st.to_snapshot())
            .map(Some)
            .context("serializing store")
    }

    /// Write an encoded snapshot off the async worker threads.
    /// Callers hold `writer` so snapshots land in mutation order.
    async fn persist(&self, encoded: Result<Option<Vec<u8>>>) -> Result<()> {
        let (Some(path), Some(bytes)) = (self.path.clone(), encoded?) else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || write_snapshot(&path, &bytes))
            .await
            .context("store writer task")?
    }
}

fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(bytes).context("writing store snapshot")?;
    f.sync_all().ok();
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn insert_if_absent(&self, draft: PostingDraft) -> Result<bool> {
        let _w = self.writer.lock().await;
        let key = owned_key(&draft);
        let (id, bytes) = {
            let mut st = self.state.lock();
            if st.by_key.contains_key(&key) {
                return Ok(false);
            }
            let id = st.next_id;
            st.next_id += 1;
            st.by_key.insert(key.clone(), id);
            st.by_id.insert(id, Posting::from_draft(id, draft, Utc::now()));
            (id, self.encode(&st))
        };

        if let Err(e) = self.persist(bytes).await {
            let mut st = self.state.lock();
            st.by_key.remove(&key);
            st.by_id.remove(&id);
            st.next_id -= 1;
            return Err(e);
        }
        Ok(true)
    }

    async fn unscored(&self) -> Result<Vec<Posting>> {
        let st = self.state.lock();
        Ok(st
            .by_id
            .values()
            .filter(|p| !p.is_scored())
            .cloned()
            .collect())
    }

    async fn record_score(&self, id: u64, score: u8, reasoning: String) -> Result<()> {
        if score > 100 {
            return Err(anyhow!("score {score} out of range 0..=100"));
        }
        let _w = self.writer.lock().await;
        let bytes = {
            let mut st = self.state.lock();
            let p = st
                .by_id
                .get_mut(&id)
                .ok_or_else(|| anyhow!("unknown posting id {id}"))?;
            if p.is_scored() {
                tracing::warn!(target: "store", id, "posting already scored; keeping first score");
                return Ok(());
            }
            p.match_score = Some(score);
            p.match_reasoning = Some(reasoning);
            self.encode(&st)
        };

        if let Err(e) = self.persist(bytes).await {
            if let Some(p) = self.state.lock().by_id.get_mut(&id) {
                p.match_score = None;
                p.match_reasoning = None;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn unnotified_above_threshold(&self, min_score: u8) -> Result<Vec<Posting>> {
        let st = self.state.lock();
        let mut out: Vec<Posting> = st
            .by_id
            .values()
            .filter(|p| !p.notified && p.match_score.is_some_and(|s| s >= min_score))
            .cloned()
            .collect();
        // best first; equal scores keep insertion order
        out.sort_by(|a, b| b.match_score.cmp(&a.match_score).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn mark_notified(&self, id: u64) -> Result<()> {
        let _w = self.writer.lock().await;
        let bytes = {
            let mut st = self.state.lock();
            let p = st
                .by_id
                .get_mut(&id)
                .ok_or_else(|| anyhow!("unknown posting id {id}"))?;
            if p.notified {
                return Ok(());
            }
            p.notified = true;
            self.encode(&st)
        };

        if let Err(e) = self.persist(bytes).await {
            if let Some(p) = self.state.lock().by_id.get_mut(&id) {
                p.notified = false;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, id: u64) -> Result<Option<Posting>> {
        Ok(self.state.lock().by_id.get(&id).cloned())
    }
}
