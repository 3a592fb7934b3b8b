// src/seen.rs
//! Time-bounded dedup cache: identifier → last broadcast time.
//!
//! An entry younger than the TTL suppresses re-broadcast; older entries are
//! evicted lazily whenever candidates are filtered.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct SeenSet {
    ttl: Duration,
    entries: HashMap<String, DateTime<Utc>>,
}

impl SeenSet {
    /// A negative `ttl` is treated as zero (nothing is ever suppressed).
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.max(Duration::zero()),
            entries: HashMap::new(),
        }
    }

    /// Evict expired entries, then return the candidates not present.
    pub fn filter_new(
        &mut self,
        candidates: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> BTreeSet<String> {
        self.evict_expired(now);
        candidates
            .iter()
            .filter(|c| !self.entries.contains_key(c.as_str()))
            .cloned()
            .collect()
    }

    /// Record a broadcast. Overwrites any earlier timestamp for `id`.
    pub fn mark(&mut self, id: &str, at: DateTime<Utc>) {
        self.entries.insert(id.to_string(), at);
    }

    /// Drop entries with `now - ts >= ttl`. Returns how many were removed.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, ts| now.signed_duration_since(*ts) < ttl);
        before - self.entries.len()
    }

    pub fn last_broadcast_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
