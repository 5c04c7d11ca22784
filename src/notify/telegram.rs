use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{render_posting, ChatId, Delivery, Notifier};
use crate::posting::Posting;

const API_BASE: &str = "https://api.telegram.org";
/// Upper bound on a server-requested `retry_after` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Override the Bot API host (local bot-api server, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    async fn send_one(&self, chat: ChatId, text: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: chat.0,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let url = self.endpoint();

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let (err, wait) = match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => {
                    let status = rsp.status();
                    let body = rsp.text().await.unwrap_or_default();
                    let reply = ApiReply::parse(&body);
                    let err = anyhow!(
                        "telegram HTTP {status} for chat {chat}: {}",
                        reply.description.as_deref().unwrap_or("no description")
                    );
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        (err, reply.retry_after())
                    } else if status.is_client_error() {
                        // blocked bot, bad chat id: retrying won't help
                        return Err(err);
                    } else {
                        (err, None)
                    }
                }
                // the URL carries the bot token
                Err(e) => (
                    anyhow!("telegram request failed for chat {chat}: {}", e.without_url()),
                    None,
                ),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            let delay = wait
                .map(|d| d.min(MAX_RETRY_AFTER))
                .unwrap_or_else(|| Duration::from_millis(500u64 << (attempt - 1)));
            tracing::debug!(
                target: "notify",
                chat = %chat,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "telegram send retry"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Error body of the Bot API:
/// `{"ok":false,"error_code":429,"description":"...","parameters":{"retry_after":5}}`.
#[derive(Debug, Default, Deserialize)]
struct ApiReply {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ReplyParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ReplyParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

impl ApiReply {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn retry_after(&self) -> Option<Duration> {
        self.parameters
            .as_ref()
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, recipients: &[ChatId], posting: &Posting) -> Vec<Delivery> {
        let text = render_posting(posting);
        let mut out = Vec::with_capacity(recipients.len());
        for &chat in recipients {
            match self.send_one(chat, &text).await {
                Ok(()) => out.push(Delivery::ok(chat)),
                Err(e) => {
                    tracing::warn!(target: "notify", chat = %chat, error = %e, "telegram send failed");
                    out.push(Delivery::failed(chat, e));
                }
            }
        }
        out
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
