// src/scoring/openai.rs
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{parse_model_answer, MatchScore, ScoreError, Scorer};

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const SYSTEM_PROMPT: &str = "You rate how well a job posting fits a candidate's skills. \
Answer with a JSON object only: {\"score\": <integer 0-100>, \"reasoning\": \"<one or two sentences>\"}.";

/// OpenAI Chat Completions scorer. Requires an API key.
pub struct OpenAiScorer {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiScorer {
    pub fn new(api_key: String, model: &str) -> anyhow::Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("OpenAI scorer needs a non-empty API key"));
        }
        let http = reqwest::Client::builder()
            .user_agent("job-radar/0.1 (+github.com/lumlich/job-radar)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building openai http client")?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
        })
    }
}

fn user_prompt(title: &str, description: &str, company: &str, skills: &[String]) -> String {
    let desc: String = description.chars().take(3000).collect();
    format!(
        "Candidate skills: {}\n\nJob title: {}\nCompany: {}\nDescription:\n{}",
        skills.join(", "),
        title,
        company,
        desc
    )
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// A 429 whose body names `insufficient_quota` is an exhausted account,
/// anything else is a per-minute limit.
pub(crate) fn classify_rate_limit(body: &str) -> ScoreError {
    let quota = serde_json::from_str::<ErrorBody>(body)
        .map(|b| {
            [b.error.code, b.error.kind]
                .into_iter()
                .flatten()
                .any(|v| v == "insufficient_quota")
        })
        .unwrap_or(false);
    ScoreError::RateLimited {
        quota_exhausted: quota,
    }
}

/// Connect failures never reached OpenAI; anything later (timeouts included) may have.
fn classify_send_error(e: reqwest::Error) -> ScoreError {
    if e.is_connect() {
        ScoreError::Transport(anyhow::Error::new(e).context("openai connect"))
    } else {
        ScoreError::Other(anyhow::Error::new(e).context("openai request"))
    }
}

#[async_trait]
impl Scorer for OpenAiScorer {
    async fn score(
        &self,
        title: &str,
        description: &str,
        company: &str,
        skills: &[String],
    ) -> Result<MatchScore, ScoreError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
            response_format: ResponseFormat,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let user = user_prompt(title, description, company, skills);
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.1,
            max_tokens: 200,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_rate_limit(&body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let short: String = body.chars().take(200).collect();
            return Err(ScoreError::Other(anyhow!("openai HTTP {status}: {short}")));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ScoreError::Malformed(format!("response body: {e}")))?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");
        parse_model_answer(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_quota_is_quota_exhausted() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        assert!(classify_rate_limit(body).is_quota_exhausted());
    }

    #[test]
    fn per_minute_limit_is_transient() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#;
        assert!(!classify_rate_limit(body).is_quota_exhausted());
        assert!(!classify_rate_limit("not json").is_quota_exhausted());
    }

    #[tokio::test]
    async fn refused_connection_is_transport() {
        let client = reqwest::Client::new();
        // port 9 (discard) is closed on test machines
        let err = client.get("http://127.0.0.1:9/").send().await.unwrap_err();
        assert!(matches!(classify_send_error(err), ScoreError::Transport(_)));
    }

    #[test]
    fn empty_key_rejected() {
        assert!(OpenAiScorer::new("  ".into(), "gpt-4o-mini").is_err());
    }

    #[test]
    fn prompt_lists_skills_and_truncates_description() {
        let long = "x".repeat(5000);
        let p = user_prompt("Dev", &long, "Acme", &["rust".into(), "sql".into()]);
        assert!(p.contains("rust, sql"));
        assert!(p.len() < 3200);
    }
}
