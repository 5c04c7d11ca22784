// src/notify/subscribers.rs
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::RwLock;

use super::ChatId;

/// Currently subscribed recipients. Seeded from config, editable at runtime,
/// optionally mirrored to a JSON file.
pub struct Subscribers {
    inner: RwLock<BTreeSet<ChatId>>,
    path: Option<PathBuf>,
}

impl Subscribers {
    pub fn new(seed: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            inner: RwLock::new(seed.into_iter().collect()),
            path: None,
        }
    }

    /// Seed plus whatever was saved at `path` earlier.
    pub fn with_file(seed: impl IntoIterator<Item = ChatId>, path: PathBuf) -> Result<Self> {
        let mut set: BTreeSet<ChatId> = seed.into_iter().collect();
        match fs::read_to_string(&path) {
            Ok(s) => {
                let saved: Vec<ChatId> = serde_json::from_str(&s)
                    .with_context(|| format!("parsing {}", path.display()))?;
                set.extend(saved);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        }
        Ok(Self {
            inner: RwLock::new(set),
            path: Some(path),
        })
    }

    pub fn list(&self) -> Vec<ChatId> {
        self.inner.read().iter().copied().collect()
    }

    /// Returns `true` if the chat was not subscribed before.
    pub fn add(&self, id: ChatId) -> Result<bool> {
        let mut g = self.inner.write();
        let added = g.insert(id);
        if added {
            self.save(&g)?;
        }
        Ok(added)
    }

    /// Returns `true` if the chat was subscribed.
    pub fn remove(&self, id: ChatId) -> Result<bool> {
        let mut g = self.inner.write();
        let removed = g.remove(&id);
        if removed {
            self.save(&g)?;
        }
        Ok(removed)
    }

    fn save(&self, set: &BTreeSet<ChatId>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        let ids: Vec<&ChatId> = set.iter().collect();
        fs::write(&tmp, serde_json::to_vec_pretty(&ids)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}
