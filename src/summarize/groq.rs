// src/summarize/groq.rs
//! Groq (OpenAI-compatible Chat Completions) summarizer with timeout and retry.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use super::Summarizer;
use crate::config::SummarizerSettings;
use crate::error::SummarizationFailure;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes news articles. \
Summarize the content in 4-6 short bullet points using plain language. \
Output only the bullet points.";

pub struct GroqSummarizer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_retries: usize,
    backoff_factor_ms: u64,
}

impl GroqSummarizer {
    pub fn new(settings: &SummarizerSettings, api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("asthra-bot/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(settings.timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            http,
            api_url: settings.api_url.clone(),
            api_key: api_key.into(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            max_retries: settings.max_retries,
            backoff_factor_ms: 500,
        }
    }

    /// Base delay unit between retries (first retry waits ~2x this).
    pub fn with_backoff_millis(mut self, ms: u64) -> Self {
        self.backoff_factor_ms = ms.max(1);
        self
    }

    async fn request_once(&self, prompt: &str) -> Result<String, SummarizationFailure> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
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
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SummarizationFailure::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let raw = resp.text().await?;
        let parsed: Resp = serde_json::from_str(&raw)
            .map_err(|e| SummarizationFailure::Malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(SummarizationFailure::Empty);
        }
        Ok(content)
    }
}

pub fn build_prompt(title: &str, body: &str) -> String {
    format!("Summarize the following content.\nTitle: {title}\nText: {body}")
}

#[async_trait::async_trait]
impl Summarizer for GroqSummarizer {
    async fn summarize(&self, title: &str, body: &str) -> Result<String, SummarizationFailure> {
        let prompt = build_prompt(title, body);
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.backoff_factor_ms)
            .map(jitter)
            .take(self.max_retries);

        let this = self;
        let prompt = prompt.as_str();
        RetryIf::spawn(
            strategy,
            move || async move {
                let res = this.request_once(prompt).await;
                if let Err(e) = &res {
                    tracing::debug!(target: "summarize", error = %e, "summarizer attempt failed");
                }
                res
            },
            |e: &SummarizationFailure| e.is_transient(),
        )
        .await
    }

    fn name(&self) -> &'static str {
        "groq"
    }
}
