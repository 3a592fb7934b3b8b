// src/error.rs
//! Error taxonomy of the broadcast pipeline.
//!
//! Every variant here is recoverable: the scheduler catches them at the item or
//! tick boundary. Fatal startup errors (bad configuration) go through `anyhow`.

use thiserror::Error;

/// The source page (homepage or article) could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} did not return an HTML document (content-type: {content_type})")]
    NotHtml { url: String, content_type: String },
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// One structured-data block on a page was unusable. Collected, logged, skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("structured-data block #{index} skipped: {reason}")]
pub struct ExtractionWarning {
    pub index: usize,
    pub reason: String,
}

/// The summarization service did not produce a usable summary.
#[derive(Debug, Error)]
pub enum SummarizationFailure {
    #[error("summarizer request failed: {0}")]
    Transport(String),

    #[error("summarizer timed out")]
    Timeout,

    #[error("summarizer answered with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("summarizer response could not be parsed: {0}")]
    Malformed(String),

    #[error("summarizer returned empty content")]
    Empty,
}

impl SummarizationFailure {
    /// Worth another attempt: network trouble, timeouts, throttling and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            SummarizationFailure::Transport(_) | SummarizationFailure::Timeout => true,
            SummarizationFailure::Status { status, .. } => *status == 429 || *status >= 500,
            SummarizationFailure::Malformed(_) | SummarizationFailure::Empty => false,
        }
    }
}

impl From<reqwest::Error> for SummarizationFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SummarizationFailure::Timeout
        } else if err.is_decode() {
            SummarizationFailure::Malformed(err.to_string())
        } else {
            SummarizationFailure::Transport(err.to_string())
        }
    }
}

/// The publish sink rejected a message or could not be reached.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish request failed: {0}")]
    Transport(String),

    #[error("publish sink rejected the message: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        PublishError::Transport(err.to_string())
    }
}
