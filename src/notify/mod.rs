// src/notify/mod.rs
pub mod subscribers;
pub mod telegram;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::posting::Posting;
pub use subscribers::Subscribers;
pub use telegram::TelegramNotifier;

/// Telegram chat id (users are positive, groups negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one send to one recipient.
#[derive(Debug)]
pub struct Delivery {
    pub chat_id: ChatId,
    pub result: anyhow::Result<()>,
}

impl Delivery {
    pub fn ok(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            result: Ok(()),
        }
    }

    pub fn failed(chat_id: ChatId, err: anyhow::Error) -> Self {
        Self {
            chat_id,
            result: Err(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Delivers one posting to every given recipient independently.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// One `Delivery` per recipient, in recipient order.
    async fn send(&self, recipients: &[ChatId], posting: &Posting) -> Vec<Delivery>;
    fn name(&self) -> &'static str;
}

pub type DynNotifier = Arc<dyn Notifier>;

/// Used when no chat transport is configured: logs and reports success.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipients: &[ChatId], posting: &Posting) -> Vec<Delivery> {
        tracing::info!(
            target: "notify",
            id = posting.id,
            score = posting.match_score,
            title = posting.title(),
            recipients = recipients.len(),
            "notification (log only)"
        );
        recipients.iter().copied().map(Delivery::ok).collect()
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// HTML message body for one posting.
pub fn render_posting(p: &Posting) -> String {
    use html_escape::encode_text as esc;

    let mut out = format!(
        "<b>{}/100</b> · <b>{}</b>\n",
        p.match_score.unwrap_or(0),
        esc(p.title())
    );
    let company = if p.company().is_empty() {
        "Unknown company"
    } else {
        p.company()
    };
    out.push_str(&format!("{} · {}\n", esc(company), esc(&p.draft.location)));
    if !p.draft.tags.is_empty() {
        let tags: Vec<String> = p.draft.tags.iter().take(6).map(|t| format!("#{}", esc(t))).collect();
        out.push_str(&tags.join(" "));
        out.push('\n');
    }
    if let Some(r) = p.match_reasoning.as_deref().filter(|r| !r.is_empty()) {
        out.push_str(&format!("<i>{}</i>\n", esc(r)));
    }
    out.push_str(&esc(&p.draft.url));
    out
}
