// src/notify/mod.rs
//! Publish sinks. The scheduler only sees [`Publisher`]; chunk sizes are
//! enforced by the formatter before anything reaches a sink.

pub mod telegram;

use std::sync::Arc;

use crate::error::PublishError;

pub use telegram::{TelegramApi, TelegramPublisher};

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Send one message, as a photo with caption when `image_url` is set.
    async fn send(&self, text: &str, image_url: Option<&str>) -> Result<(), PublishError>;
    fn name(&self) -> &'static str;
}

pub type DynPublisher = Arc<dyn Publisher>;

/// Dry-run sink: logs what would have been sent.
#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait::async_trait]
impl Publisher for LogPublisher {
    async fn send(&self, text: &str, image_url: Option<&str>) -> Result<(), PublishError> {
        tracing::info!(
            target: "notify",
            chars = text.chars().count(),
            image = image_url.unwrap_or("-"),
            "[dry-run] {text}"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
