// src/ingest/extract.rs
//! Pure HTML parsing for the homepage and article pages.
//!
//! Both pages expose schema.org data in `<script type="application/ld+json">`
//! blocks: the homepage an `ItemList` of article links, article pages a
//! `NewsArticle` with the full body. A block that fails to parse is reported as
//! an [`ExtractionWarning`] and skipped; it never aborts the page.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::error::ExtractionWarning;
use crate::ingest::clean_text;
use crate::ingest::types::ContentItem;

static LD_JSON: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());
static TWITTER_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="twitter:image"]"#).unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());

/// Links found on the homepage plus the blocks that had to be skipped.
#[derive(Debug, Default)]
pub struct LinkExtraction {
    pub links: BTreeSet<String>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Article fields plus the blocks that had to be skipped.
#[derive(Debug)]
pub struct ArticleExtraction {
    pub item: ContentItem,
    pub warnings: Vec<ExtractionWarning>,
}

/// Collect `ItemList` entries whose URL starts with `domain_prefix`.
pub fn extract_links(html: &str, domain_prefix: &str) -> LinkExtraction {
    let doc = Html::parse_document(html);
    let mut out = LinkExtraction::default();

    for (index, parsed) in ld_json_blocks(&doc) {
        let value = match parsed {
            Ok(v) => v,
            Err(reason) => {
                out.warnings.push(ExtractionWarning { index, reason });
                continue;
            }
        };
        for node in top_level_nodes(&value) {
            if !has_type(node, "ItemList") {
                continue;
            }
            let Some(elements) = node.get("itemListElement").and_then(Value::as_array) else {
                continue;
            };
            for el in elements {
                if let Some(link) = el.get("url").and_then(Value::as_str) {
                    let link = link.trim();
                    if link.starts_with(domain_prefix) && Url::parse(link).is_ok() {
                        out.links.insert(link.to_string());
                    }
                }
            }
        }
    }

    out
}

/// Title, body and best-effort image of one article page.
pub fn extract_article(page_url: &str, html: &str) -> ArticleExtraction {
    let doc = Html::parse_document(html);
    let mut warnings = Vec::new();
    let mut body = String::new();
    let mut headline = String::new();

    'blocks: for (index, parsed) in ld_json_blocks(&doc) {
        let value = match parsed {
            Ok(v) => v,
            Err(reason) => {
                warnings.push(ExtractionWarning { index, reason });
                continue;
            }
        };
        for node in top_level_nodes(&value) {
            if has_type(node, "NewsArticle") {
                body = node
                    .get("articleBody")
                    .and_then(Value::as_str)
                    .map(clean_text)
                    .unwrap_or_default();
                headline = node
                    .get("headline")
                    .and_then(Value::as_str)
                    .map(clean_text)
                    .unwrap_or_default();
                break 'blocks;
            }
        }
    }

    let title = doc
        .select(&TITLE)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .unwrap_or(headline);

    let image_url = extract_image(&doc, page_url);

    ArticleExtraction {
        item: ContentItem {
            url: page_url.to_string(),
            title,
            body,
            image_url,
        },
        warnings,
    }
}

/// Preview image: og:image, then twitter:image, then the first absolute `<img>`.
pub fn extract_image(doc: &Html, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok();
    let from_meta = |sel: &Selector| {
        doc.select(sel)
            .filter_map(|el| el.value().attr("content"))
            .find_map(|raw| resolve_http_url(base.as_ref(), raw))
    };

    from_meta(&OG_IMAGE)
        .or_else(|| from_meta(&TWITTER_IMAGE))
        .or_else(|| {
            doc.select(&IMG)
                .filter_map(|el| el.value().attr("src"))
                .find_map(|src| absolute_http_url(src.trim()))
        })
}

fn resolve_http_url(base: Option<&Url>, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    absolute_http_url(raw).or_else(|| {
        base.and_then(|b| b.join(raw).ok())
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .map(|u| u.to_string())
    })
}

fn absolute_http_url(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|_| raw.to_string())
}

// Every ld+json block in document order, parsed or with the reason it failed.
fn ld_json_blocks(doc: &Html) -> Vec<(usize, Result<Value, String>)> {
    doc.select(&LD_JSON)
        .enumerate()
        .map(|(index, el)| {
            let raw: String = el.text().collect();
            let parsed = serde_json::from_str::<Value>(raw.trim()).map_err(|e| e.to_string());
            (index, parsed)
        })
        .collect()
}

// A block is either one object, an array of objects, or an object with `@graph`.
fn top_level_nodes(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().filter(|v| v.is_object()).collect(),
        Value::Object(map) => match map.get("@graph").and_then(Value::as_array) {
            Some(graph) => graph.iter().filter(|v| v.is_object()).collect(),
            None => vec![value],
        },
        _ => Vec::new(),
    }
}

fn has_type(node: &Value, wanted: &str) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t == wanted,
        Some(Value::Array(ts)) => ts.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}
