// src/summarize/mod.rs
//! Summarizer abstraction and the post-processing shared by every provider.
//!
//! Providers return `Result<String, SummarizationFailure>`. [`SummaryClient`]
//! turns that into a [`SummaryOutcome`] which never fails: a failure carries a
//! user-visible placeholder so the channel history shows that something broke.

pub mod groq;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::error::SummarizationFailure;

pub use groq::GroqSummarizer;

/// Every failure placeholder starts with this.
pub const FAILURE_PREFIX: &str = "⚠️ Summarization failed.";
pub const TRIM_MARKER: &str = "\n\n(Trimmed for Telegram)";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("summarize_requests_total", "Summaries requested.");
        describe_counter!(
            "summarize_failures_total",
            "Summaries that degraded to the failure placeholder."
        );
    });
}

/// Low-level provider doing the real remote call.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, title: &str, body: &str) -> Result<String, SummarizationFailure>;
    fn name(&self) -> &'static str;
}

pub type DynSummarizer = Arc<dyn Summarizer>;

/// What the scheduler gets back. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Trimmed summary with the trailer appended.
    Ready(String),
    /// Placeholder text describing the failure.
    Failed(String),
}

impl SummaryOutcome {
    pub fn text(&self) -> &str {
        match self {
            SummaryOutcome::Ready(s) | SummaryOutcome::Failed(s) => s,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SummaryOutcome::Failed(_))
    }
}

/// True for text produced by [`failure_placeholder`].
pub fn is_failure_placeholder(text: &str) -> bool {
    text.trim_start().starts_with(FAILURE_PREFIX)
}

pub fn failure_placeholder(reason: &SummarizationFailure) -> String {
    format!("{FAILURE_PREFIX} Reason: {reason}")
}

/// Cut to `max_chars` (with marker), then append the date/attribution trailer.
pub fn finalize_summary(
    raw: &str,
    max_chars: usize,
    today: DateTime<Utc>,
    attribution: &str,
) -> String {
    let trimmed = raw.trim();
    let mut out: String = if trimmed.chars().count() > max_chars {
        let mut cut: String = trimmed.chars().take(max_chars).collect();
        cut.push_str(TRIM_MARKER);
        cut
    } else {
        trimmed.to_string()
    };
    out.push_str(&format!(
        "\n\n📅 Date: {}\n🔁 Powered by {}",
        today.format("%d %b %Y"),
        attribution
    ));
    out
}

/// Wraps a provider with post-processing and the never-fail contract.
#[derive(Clone)]
pub struct SummaryClient {
    inner: DynSummarizer,
    max_chars: usize,
    attribution: String,
}

impl SummaryClient {
    pub fn new(inner: DynSummarizer, max_chars: usize, attribution: impl Into<String>) -> Self {
        ensure_metrics_described();
        Self {
            inner,
            max_chars,
            attribution: attribution.into(),
        }
    }

    pub async fn summarize(&self, title: &str, body: &str, now: DateTime<Utc>) -> SummaryOutcome {
        counter!("summarize_requests_total").increment(1);
        let result = match self.inner.summarize(title, body).await {
            Ok(text) if text.trim().is_empty() => Err(SummarizationFailure::Empty),
            other => other,
        };
        match result {
            Ok(text) => SummaryOutcome::Ready(finalize_summary(
                &text,
                self.max_chars,
                now,
                &self.attribution,
            )),
            Err(e) => {
                counter!("summarize_failures_total").increment(1);
                tracing::warn!(target: "summarize", provider = self.inner.name(), error = %e, "summarization failed");
                SummaryOutcome::Failed(failure_placeholder(&e))
            }
        }
    }
}
