// src/ingest/types.rs
use std::collections::BTreeSet;

use crate::error::FetchError;

/// One article as fetched from the source. Empty `title`/`body` mean "missing".
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentItem {
    pub url: String,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
}

impl ContentItem {
    /// Both title and body present; anything else is skipped by the scheduler.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.body.trim().is_empty()
    }
}

/// Where candidate links and article contents come from.
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    /// Current candidate identifiers on the homepage. Empty set is not an error.
    async fn fetch_links(&self) -> Result<BTreeSet<String>, FetchError>;
    /// Title, body and best-effort image for one identifier.
    async fn fetch_article(&self, url: &str) -> Result<ContentItem, FetchError>;
    fn name(&self) -> &'static str;
}
