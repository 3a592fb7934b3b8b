// src/ingest/providers/mint.rs
//! Livemint homepage provider: `ItemList` links on the homepage, `NewsArticle`
//! bodies on article pages.

use std::collections::BTreeSet;

use async_trait::async_trait;
use metrics::counter;

use crate::config::SourceSettings;
use crate::error::{ExtractionWarning, FetchError};
use crate::ingest::extract::{extract_article, extract_links};
use crate::ingest::types::{ContentItem, NewsSource};
use crate::ingest::{build_http_client, ensure_metrics_described, fetch_page};

pub struct MintSource {
    client: reqwest::Client,
    homepage_url: String,
    domain_prefix: String,
}

impl MintSource {
    pub fn new(settings: &SourceSettings) -> Self {
        ensure_metrics_described();
        Self {
            client: build_http_client(settings.timeout(), &settings.user_agent),
            homepage_url: settings.homepage_url.clone(),
            domain_prefix: settings.domain_prefix.clone(),
        }
    }
}

fn log_warnings(url: &str, warnings: &[ExtractionWarning]) {
    for w in warnings {
        tracing::warn!(target: "ingest", %url, index = w.index, reason = %w.reason, "skipping malformed JSON-LD block");
    }
    counter!("ingest_extraction_warnings_total").increment(warnings.len() as u64);
}

#[async_trait]
impl NewsSource for MintSource {
    async fn fetch_links(&self) -> Result<BTreeSet<String>, FetchError> {
        let html = fetch_page(&self.client, &self.homepage_url)
            .await
            .inspect_err(|_| counter!("ingest_source_errors_total").increment(1))?;

        let out = extract_links(&html, &self.domain_prefix);
        log_warnings(&self.homepage_url, &out.warnings);
        counter!("ingest_links_total").increment(out.links.len() as u64);
        tracing::debug!(target: "ingest", count = out.links.len(), "extracted homepage links");
        Ok(out.links)
    }

    async fn fetch_article(&self, url: &str) -> Result<ContentItem, FetchError> {
        let html = fetch_page(&self.client, url)
            .await
            .inspect_err(|_| counter!("ingest_source_errors_total").increment(1))?;

        let out = extract_article(url, &html);
        log_warnings(url, &out.warnings);
        if out.item.image_url.is_none() {
            tracing::debug!(target: "ingest", %url, "no preview image found");
        }
        Ok(out.item)
    }

    fn name(&self) -> &'static str {
        "livemint"
    }
}
