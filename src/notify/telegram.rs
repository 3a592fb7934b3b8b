// src/notify/telegram.rs
//! Thin Telegram Bot API client (sendMessage, sendPhoto, getUpdates) and the
//! channel publisher built on top of it.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::Publisher;
use crate::config::TelegramSettings;
use crate::error::PublishError;

pub const PARSE_MODE: &str = "MarkdownV2";

/// Longest `retry_after` we are willing to honor inside one send.
const MAX_RETRY_AFTER_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Serialize)]
struct SendMessageReq<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct SendPhotoReq<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Serialize)]
struct GetUpdatesReq<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

// Outcome of one attempt, used by the retry loop.
enum Attempt<T> {
    Done(T),
    Retry { after: Option<Duration>, error: PublishError },
    Fail(PublishError),
}

#[derive(Clone)]
pub struct TelegramApi {
    client: reqwest::Client,
    base: String,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramApi {
    pub fn new(settings: &TelegramSettings, bot_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: format!("{}/bot{}", settings.api_base.trim_end_matches('/'), bot_token),
            timeout: settings.timeout(),
            max_retries: settings.max_retries.max(1),
        }
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<SentMessage, PublishError> {
        let req = SendMessageReq {
            chat_id,
            text,
            parse_mode,
            disable_web_page_preview: true,
        };
        self.call("sendMessage", &req, self.timeout).await
    }

    pub async fn send_photo(
        &self,
        chat_id: &str,
        photo_url: &str,
        caption: &str,
        parse_mode: Option<&str>,
    ) -> Result<SentMessage, PublishError> {
        let req = SendPhotoReq {
            chat_id,
            photo: photo_url,
            caption,
            parse_mode,
        };
        self.call("sendPhoto", &req, self.timeout).await
    }

    /// Long-poll for new messages. Not retried; the caller loops anyway.
    pub async fn get_updates(
        &self,
        offset: i64,
        poll_timeout_secs: u64,
    ) -> Result<Vec<Update>, PublishError> {
        let req = GetUpdatesReq {
            offset,
            timeout: poll_timeout_secs,
            allowed_updates: &["message"],
        };
        let http_timeout = Duration::from_secs(poll_timeout_secs) + self.timeout;
        match self.attempt("getUpdates", &req, http_timeout).await {
            Attempt::Done(v) => Ok(v),
            Attempt::Retry { error, .. } | Attempt::Fail(error) => Err(error),
        }
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, PublishError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.attempt(method, body, timeout).await {
                Attempt::Done(v) => return Ok(v),
                Attempt::Fail(e) => return Err(e),
                Attempt::Retry { after, error } => {
                    if attempt >= self.max_retries {
                        return Err(error);
                    }
                    let wait = after.unwrap_or(Duration::from_millis(500u64 << (attempt - 1)));
                    tracing::debug!(target: "notify", method, attempt, wait_ms = wait.as_millis() as u64, error = %error, "retrying telegram call");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    async fn attempt<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Attempt<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base, method);
        let rsp = match self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return Attempt::Retry {
                    after: None,
                    error: PublishError::from(e),
                }
            }
        };

        let status = rsp.status();
        let text = match rsp.text().await {
            Ok(t) => t,
            Err(e) => {
                return Attempt::Retry {
                    after: None,
                    error: PublishError::from(e),
                }
            }
        };

        let env: Envelope<T> = match serde_json::from_str(&text) {
            Ok(env) => env,
            Err(e) if status.is_server_error() => {
                return Attempt::Retry {
                    after: None,
                    error: PublishError::Transport(format!("HTTP {status}: {e}")),
                }
            }
            Err(e) => {
                return Attempt::Fail(PublishError::Rejected(format!(
                    "{method}: HTTP {status}, unreadable body: {e}"
                )))
            }
        };

        if env.ok {
            if let Some(result) = env.result {
                return Attempt::Done(result);
            }
            return Attempt::Fail(PublishError::Rejected(format!("{method}: ok without result")));
        }

        let code = env.error_code.unwrap_or(status.as_u16());
        let description = env.description.unwrap_or_else(|| "unknown error".to_string());
        let error = PublishError::Rejected(format!("{method}: {code} {description}"));
        if code == 429 || code >= 500 {
            let after = env
                .parameters
                .and_then(|p| p.retry_after)
                .map(|s| Duration::from_secs(s.min(MAX_RETRY_AFTER_SECS)));
            Attempt::Retry { after, error }
        } else {
            Attempt::Fail(error)
        }
    }
}

/// Publishes into the one configured channel.
#[derive(Clone)]
pub struct TelegramPublisher {
    api: TelegramApi,
    chat_id: String,
}

impl TelegramPublisher {
    pub fn new(api: TelegramApi, chat_id: impl Into<String>) -> Self {
        Self {
            api,
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl Publisher for TelegramPublisher {
    async fn send(&self, text: &str, image_url: Option<&str>) -> Result<(), PublishError> {
        if let Some(photo) = image_url {
            match self
                .api
                .send_photo(&self.chat_id, photo, text, Some(PARSE_MODE))
                .await
            {
                Ok(_) => return Ok(()),
                // The image is optional; retry as plain text.
                Err(e) => {
                    tracing::warn!(target: "notify", image = photo, error = %e, "sendPhoto failed, sending text only");
                }
            }
        }
        self.api
            .send_message(&self.chat_id, text, Some(PARSE_MODE))
            .await
            .map(|_| ())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
