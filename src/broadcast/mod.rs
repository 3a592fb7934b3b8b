// src/broadcast/mod.rs
//! # Broadcast pipeline
//! One tick: fetch links → drop already-seen → per item (fetch → summarize →
//! format → publish → mark seen) with a fixed delay between items → quiet check.
//!
//! Items are processed strictly one at a time; the delay between them is the
//! rate limit protecting the summarizer and the Telegram API. Every per-item
//! failure stops at the item boundary.

pub mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::config::ScheduleSettings;
use crate::error::PublishError;
use crate::format::{Formatter, MessageChunk};
use crate::ingest::types::NewsSource;
use crate::notify::DynPublisher;
use crate::seen::SeenSet;
use crate::summarize::{SummaryClient, SummaryOutcome};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("broadcast_ticks_total", "Ticks run by the broadcast loop.");
        describe_counter!(
            "broadcast_items_published_total",
            "Items published and marked seen."
        );
        describe_counter!(
            "broadcast_items_failed_total",
            "Items abandoned for this tick after a fetch, summarize or publish failure."
        );
        describe_counter!(
            "broadcast_items_skipped_total",
            "Items skipped because title or body was missing."
        );
        describe_counter!("broadcast_quiet_notices_total", "Quiet-period notices sent.");
        describe_gauge!("broadcast_seen_entries", "Entries in the dedup cache.");
        describe_gauge!("broadcast_last_tick_ts", "Unix ts of the last finished tick.");
    });
}

/// Source of "now". Swapped for a manual clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Process-lifetime state, owned by the loop and threaded through every tick.
#[derive(Debug, Clone)]
pub struct BroadcastState {
    pub seen: SeenSet,
    /// URLs that already got a "summarization failed" notice, same TTL as
    /// `seen`. At most one notice per URL per window.
    pub failure_notified: SeenSet,
    /// Reference point for the quiet notice: last successful broadcast or
    /// last quiet notice, whichever is later.
    pub last_broadcast_at: DateTime<Utc>,
}

impl BroadcastState {
    pub fn new(seen_ttl: chrono::Duration, now: DateTime<Utc>) -> Self {
        Self {
            seen: SeenSet::new(seen_ttl),
            failure_notified: SeenSet::new(seen_ttl),
            last_broadcast_at: now,
        }
    }
}

/// Summary of one tick, logged and fed into the status snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub candidates: usize,
    pub fresh: usize,
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failure_notices: usize,
    pub quiet_notice: bool,
    pub source_unavailable: bool,
}

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Published { chunks: usize },
    /// Title or body missing; left eligible for a later tick.
    Incomplete,
    /// Summarizer failed; left eligible for a later tick.
    SummaryFailed { notice_sent: bool },
    FetchFailed(String),
    PublishFailed(String),
}

/// Tick-independent knobs of the pipeline.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    pub item_delay: Duration,
    pub quiet_threshold: chrono::Duration,
    pub publish_failure_notices: bool,
}

impl From<&ScheduleSettings> for BroadcastSettings {
    fn from(s: &ScheduleSettings) -> Self {
        Self {
            item_delay: s.item_delay(),
            quiet_threshold: s.quiet_threshold(),
            publish_failure_notices: s.publish_failure_notices,
        }
    }
}

pub struct Broadcaster {
    source: Arc<dyn NewsSource>,
    summarizer: SummaryClient,
    publisher: DynPublisher,
    formatter: Formatter,
    settings: BroadcastSettings,
    clock: Arc<dyn Clock>,
}

impl Broadcaster {
    pub fn new(
        source: Arc<dyn NewsSource>,
        summarizer: SummaryClient,
        publisher: DynPublisher,
        formatter: Formatter,
        settings: BroadcastSettings,
    ) -> Self {
        ensure_metrics_described();
        Self {
            source,
            summarizer,
            publisher,
            formatter,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Run one full cycle against `state`.
    pub async fn run_tick(&self, state: &mut BroadcastState) -> TickReport {
        let mut report = TickReport::default();
        counter!("broadcast_ticks_total").increment(1);

        // 1) Candidate links; an unreachable homepage ends the tick.
        let candidates = match self.source.fetch_links().await {
            Ok(links) => links,
            Err(e) => {
                tracing::error!(target: "broadcast", source = self.source.name(), error = %e, "fetching links failed, waiting for next tick");
                report.source_unavailable = true;
                self.finish_tick(state, &report);
                return report;
            }
        };
        report.candidates = candidates.len();

        // 2) Drop everything broadcast within the TTL.
        let fresh = state.seen.filter_new(&candidates, self.now());
        report.fresh = fresh.len();
        tracing::info!(target: "broadcast", candidates = report.candidates, fresh = report.fresh, "links filtered");

        // 3) Nothing new → maybe a quiet notice.
        if fresh.is_empty() {
            report.quiet_notice = self.quiet_check(state).await;
            self.finish_tick(state, &report);
            return report;
        }

        // 4) Serial processing with a fixed gap between items.
        for (i, url) in fresh.iter().enumerate() {
            if i > 0 && !self.settings.item_delay.is_zero() {
                tokio::time::sleep(self.settings.item_delay).await;
            }

            match self.process_item(state, url).await {
                ItemOutcome::Published { chunks } => {
                    report.published += 1;
                    counter!("broadcast_items_published_total").increment(1);
                    tracing::info!(target: "broadcast", %url, chunks, "item published");
                }
                ItemOutcome::Incomplete => {
                    report.skipped += 1;
                    counter!("broadcast_items_skipped_total").increment(1);
                    tracing::warn!(target: "broadcast", %url, "missing title/body, skipping");
                }
                ItemOutcome::SummaryFailed { notice_sent } => {
                    report.failed += 1;
                    if notice_sent {
                        report.failure_notices += 1;
                    }
                    counter!("broadcast_items_failed_total").increment(1);
                    tracing::warn!(target: "broadcast", %url, notice_sent, "summary failed, item stays eligible");
                }
                ItemOutcome::FetchFailed(e) => {
                    report.failed += 1;
                    counter!("broadcast_items_failed_total").increment(1);
                    tracing::error!(target: "broadcast", %url, error = %e, "article fetch failed");
                }
                ItemOutcome::PublishFailed(e) => {
                    report.failed += 1;
                    counter!("broadcast_items_failed_total").increment(1);
                    tracing::error!(target: "broadcast", %url, error = %e, "publish failed");
                }
            }
        }

        self.finish_tick(state, &report);
        report
    }

    /// fetch → summarize → format → publish → mark seen, for one identifier.
    pub async fn process_item(&self, state: &mut BroadcastState, url: &str) -> ItemOutcome {
        let item = match self.source.fetch_article(url).await {
            Ok(item) => item,
            Err(e) => return ItemOutcome::FetchFailed(e.to_string()),
        };
        if !item.is_complete() {
            return ItemOutcome::Incomplete;
        }

        let summary = self
            .summarizer
            .summarize(&item.title, &item.body, self.now())
            .await;

        if let SummaryOutcome::Failed(placeholder) = &summary {
            let mut notice_sent = false;
            let now = self.now();
            state.failure_notified.evict_expired(now);
            let already_notified = state.failure_notified.last_broadcast_at(url).is_some();

            if self.settings.publish_failure_notices && !already_notified {
                let chunks = self.formatter.format(&item.title, placeholder, None);
                match self.publish_chunks(&chunks).await {
                    Ok(_) => {
                        state.failure_notified.mark(url, now);
                        notice_sent = true;
                    }
                    Err((_, e)) => {
                        tracing::warn!(target: "broadcast", %url, error = %e, "failure notice not delivered")
                    }
                }
            } else if already_notified {
                tracing::debug!(target: "broadcast", %url, "failure notice already sent for this link");
            }
            return ItemOutcome::SummaryFailed { notice_sent };
        }

        let chunks = self
            .formatter
            .format(&item.title, summary.text(), item.image_url.as_deref());
        let total = chunks.len();

        match self.publish_chunks(&chunks).await {
            Ok(sent) => {
                self.mark_published(state, url);
                ItemOutcome::Published { chunks: sent }
            }
            // Part of the item is already in the channel; do not send it again.
            Err((sent, e)) if sent > 0 => {
                tracing::warn!(target: "broadcast", %url, sent, total, error = %e, "item published partially");
                self.mark_published(state, url);
                ItemOutcome::Published { chunks: sent }
            }
            Err((_, e)) => ItemOutcome::PublishFailed(e.to_string()),
        }
    }

    fn mark_published(&self, state: &mut BroadcastState, url: &str) {
        let now = self.now();
        state.seen.mark(url, now);
        state.last_broadcast_at = now;
    }

    // Sends chunks in order and stops at the first failure.
    // Err carries how many chunks made it out before the failure.
    async fn publish_chunks(
        &self,
        chunks: &[MessageChunk],
    ) -> Result<usize, (usize, PublishError)> {
        for (i, chunk) in chunks.iter().enumerate() {
            self.publisher
                .send(&chunk.text, chunk.image_url.as_deref())
                .await
                .map_err(|e| (i, e))?;
        }
        Ok(chunks.len())
    }

    /// Sends a quiet notice once the quiet period exceeds the threshold, then
    /// restarts the period.
    async fn quiet_check(&self, state: &mut BroadcastState) -> bool {
        let now = self.now();
        let quiet_for = now.signed_duration_since(state.last_broadcast_at);
        if quiet_for <= self.settings.quiet_threshold {
            tracing::debug!(target: "broadcast", quiet_mins = quiet_for.num_minutes(), "no new items");
            return false;
        }

        let notice = self.formatter.quiet_notice(quiet_for);
        let sent = match self.publisher.send(&notice, None).await {
            Ok(()) => {
                counter!("broadcast_quiet_notices_total").increment(1);
                tracing::info!(target: "broadcast", quiet_mins = quiet_for.num_minutes(), "quiet notice sent");
                true
            }
            Err(e) => {
                tracing::warn!(target: "broadcast", error = %e, "quiet notice not delivered");
                false
            }
        };
        // Reset even on failure: at most one attempt per threshold period.
        state.last_broadcast_at = now;
        sent
    }

    fn finish_tick(&self, state: &BroadcastState, report: &TickReport) {
        gauge!("broadcast_seen_entries").set(state.seen.len() as f64);
        gauge!("broadcast_last_tick_ts").set(self.now().timestamp().max(0) as f64);
        tracing::info!(
            target: "broadcast",
            candidates = report.candidates,
            fresh = report.fresh,
            published = report.published,
            skipped = report.skipped,
            failed = report.failed,
            quiet_notice = report.quiet_notice,
            source_unavailable = report.source_unavailable,
            seen = state.seen.len(),
            "tick finished"
        );
    }
}
