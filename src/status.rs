// src/status.rs
//! Read-only view of the broadcast loop for `/status` (HTTP and Telegram).
//! Only the scheduler writes it, through a `tokio::sync::watch` channel.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::broadcast::TickReport;

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub started_at: Option<DateTime<Utc>>,
    pub source: String,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_broadcast_at: Option<DateTime<Utc>>,
    pub seen_entries: usize,
    pub ticks: u64,
    pub items_published: u64,
    pub items_failed: u64,
    pub quiet_notices: u64,
    pub last_tick: Option<TickReport>,
}

impl StatusSnapshot {
    pub fn new(source: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(started_at),
            source: source.into(),
            ..Self::default()
        }
    }

    /// Fold one finished tick into the running totals.
    pub fn record_tick(
        &mut self,
        report: &TickReport,
        at: DateTime<Utc>,
        last_broadcast_at: DateTime<Utc>,
        seen_entries: usize,
    ) {
        self.ticks += 1;
        self.items_published += report.published as u64;
        self.items_failed += report.failed as u64;
        if report.quiet_notice {
            self.quiet_notices += 1;
        }
        self.last_tick_at = Some(at);
        self.last_broadcast_at = Some(last_broadcast_at);
        self.seen_entries = seen_entries;
        self.last_tick = Some(report.clone());
    }

    /// Plain-text rendering used as a Telegram reply (no parse mode).
    pub fn render_text(&self) -> String {
        let fmt_ts = |ts: Option<DateTime<Utc>>| {
            ts.map(|t| t.format("%d %b %Y %H:%M UTC").to_string())
                .unwrap_or_else(|| "never".to_string())
        };
        format!(
            "📡 Source: {}\n🕒 Last check: {}\n📰 Last broadcast: {}\n🧠 Remembered links: {}\n✅ Published: {} | ⚠️ Failed: {} | 😴 Quiet notices: {}\n🔄 Checks run: {}",
            if self.source.is_empty() { "-" } else { self.source.as_str() },
            fmt_ts(self.last_tick_at),
            fmt_ts(self.last_broadcast_at),
            self.seen_entries,
            self.items_published,
            self.items_failed,
            self.quiet_notices,
            self.ticks,
        )
    }
}
