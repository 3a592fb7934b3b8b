// tests/common/mod.rs
// In-memory fakes shared by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use asthra_bot::broadcast::{BroadcastSettings, Broadcaster, Clock};
use asthra_bot::error::{FetchError, PublishError, SummarizationFailure};
use asthra_bot::format::Formatter;
use asthra_bot::ingest::types::{ContentItem, NewsSource};
use asthra_bot::notify::Publisher;
use asthra_bot::summarize::{Summarizer, SummaryClient};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
}

pub fn url(slug: &str) -> String {
    format!("https://www.livemint.com/news/{slug}.html")
}

#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(at)))
    }
    pub fn advance(&self, by: Duration) {
        let mut g = self.0.lock().unwrap();
        *g = *g + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Homepage links and articles served from memory.
#[derive(Clone)]
pub struct FakeSource {
    pub links: Arc<Mutex<Result<BTreeSet<String>, ()>>>,
    pub articles: Arc<Mutex<HashMap<String, ContentItem>>>,
    pub article_requests: Arc<Mutex<Vec<String>>>,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self {
            links: Arc::new(Mutex::new(Ok(BTreeSet::new()))),
            articles: Arc::default(),
            article_requests: Arc::default(),
        }
    }
}

impl FakeSource {
    pub fn with_links(links: &[&str]) -> Self {
        let s = Self::default();
        s.set_links(links);
        s
    }

    pub fn set_links(&self, links: &[&str]) {
        *self.links.lock().unwrap() = Ok(links.iter().map(|l| l.to_string()).collect());
    }

    pub fn set_unreachable(&self) {
        *self.links.lock().unwrap() = Err(());
    }

    pub fn add_article(&self, url: &str, title: &str, body: &str, image: Option<&str>) {
        self.articles.lock().unwrap().insert(
            url.to_string(),
            ContentItem {
                url: url.to_string(),
                title: title.to_string(),
                body: body.to_string(),
                image_url: image.map(str::to_string),
            },
        );
    }

    pub fn requested(&self) -> Vec<String> {
        self.article_requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl NewsSource for FakeSource {
    async fn fetch_links(&self) -> Result<BTreeSet<String>, FetchError> {
        self.links.lock().unwrap().clone().map_err(|_| FetchError::Timeout {
            url: "https://www.livemint.com/".into(),
        })
    }

    async fn fetch_article(&self, url: &str) -> Result<ContentItem, FetchError> {
        self.article_requests.lock().unwrap().push(url.to_string());
        self.articles
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Summarizer keyed by title; titles listed in `timeouts` fail.
#[derive(Clone, Default)]
pub struct FakeSummarizer {
    pub timeouts: Arc<Mutex<BTreeSet<String>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakeSummarizer {
    pub fn time_out_on(&self, title: &str) {
        self.timeouts.lock().unwrap().insert(title.to_string());
    }
    pub fn recover(&self, title: &str) {
        self.timeouts.lock().unwrap().remove(title);
    }
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, title: &str, _body: &str) -> Result<String, SummarizationFailure> {
        self.calls.lock().unwrap().push(title.to_string());
        if self.timeouts.lock().unwrap().contains(title) {
            return Err(SummarizationFailure::Timeout);
        }
        Ok(format!("• Key points of {title}"))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub text: String,
    pub image_url: Option<String>,
    pub at: tokio::time::Instant,
}

/// Records every message; can be told to reject the next N sends.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    pub sent: Arc<Mutex<Vec<Sent>>>,
    pub fail_next: Arc<Mutex<usize>>,
    pub fail_after: Arc<Mutex<Option<usize>>>,
}

impl RecordingPublisher {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.text).collect()
    }
    pub fn fail_next(&self, n: usize) {
        *self.fail_next.lock().unwrap() = n;
    }
    /// Accept `n` more sends in total, then fail every later one.
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock().unwrap() = Some(self.sent.lock().unwrap().len() + n);
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn send(&self, text: &str, image_url: Option<&str>) -> Result<(), PublishError> {
        {
            let mut n = self.fail_next.lock().unwrap();
            if *n > 0 {
                *n -= 1;
                return Err(PublishError::Rejected("400 Bad Request".into()));
            }
        }
        if let Some(limit) = *self.fail_after.lock().unwrap() {
            if self.sent.lock().unwrap().len() >= limit {
                return Err(PublishError::Transport("connection reset".into()));
            }
        }
        self.sent.lock().unwrap().push(Sent {
            text: text.to_string(),
            image_url: image_url.map(str::to_string),
            at: tokio::time::Instant::now(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub struct Harness {
    pub source: FakeSource,
    pub summarizer: FakeSummarizer,
    pub publisher: RecordingPublisher,
    pub clock: ManualClock,
    pub broadcaster: Broadcaster,
}

pub fn settings() -> BroadcastSettings {
    BroadcastSettings {
        item_delay: std::time::Duration::from_secs(15),
        quiet_threshold: Duration::hours(3),
        publish_failure_notices: true,
    }
}

pub fn harness(source: FakeSource, settings: BroadcastSettings, formatter: Formatter) -> Harness {
    let summarizer = FakeSummarizer::default();
    let publisher = RecordingPublisher::default();
    let clock = ManualClock::new(t0());
    let broadcaster = Broadcaster::new(
        Arc::new(source.clone()),
        SummaryClient::new(Arc::new(summarizer.clone()), 3900, "Asthra Bot"),
        Arc::new(publisher.clone()),
        formatter,
        settings,
    )
    .with_clock(Arc::new(clock.clone()));
    Harness {
        source,
        summarizer,
        publisher,
        clock,
        broadcaster,
    }
}
