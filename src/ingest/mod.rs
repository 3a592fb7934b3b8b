// src/ingest/mod.rs
pub mod extract;
pub mod providers;
pub mod types;

use std::time::Duration;

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use reqwest::header::CONTENT_TYPE;

use crate::error::FetchError;

/// Article bodies are capped before they reach the summarizer prompt.
pub const MAX_BODY_CHARS: usize = 12_000;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_source_errors_total",
            "Homepage or article fetch failures."
        );
        describe_counter!(
            "ingest_extraction_warnings_total",
            "Structured-data blocks skipped because they failed to parse."
        );
        describe_counter!("ingest_links_total", "Candidate links found on the homepage.");
        describe_histogram!("ingest_fetch_ms", "Page fetch time in milliseconds.");
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 4) Length cap
    if out.chars().count() > MAX_BODY_CHARS {
        out = out.chars().take(MAX_BODY_CHARS).collect();
    }

    out
}

/// Build the HTTP client used for every source page.
pub fn build_http_client(timeout: Duration, user_agent: &str) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent.to_string())
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// GET a page and return its body. Non-2xx and non-HTML answers are errors.
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let t0 = std::time::Instant::now();

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    let status = resp.status();
    tracing::info!(target: "ingest", %url, status = status.as_u16(), "fetched page");
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if let Some(ct) = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        let ct = ct.to_ascii_lowercase();
        if !ct.contains("html") {
            return Err(FetchError::NotHtml {
                url: url.to_string(),
                content_type: ct,
            });
        }
    }

    let body = resp
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    metrics::histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(body)
}
