use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strum_macros::Display;
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::fetch::AstronomicalSnapshot;

/// Cache key for a city name: trimmed, lower-cased, inner whitespace collapsed.
pub fn normalize_key(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Where a city sits in the fetch/cache lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CityState {
    Idle,
    Fetching,
    CachedFresh,
    CachedStale,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: Arc<AstronomicalSnapshot>,
    pub fetched_at: Instant,
    /// Set by an explicit refresh; the entry is stale regardless of age.
    pub invalidated: bool,
}

/// Snapshots by normalized city name. Entries are replaced whole, never edited.
#[derive(Debug)]
pub struct SnapshotCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    failure_ttl: Duration,
}

impl SnapshotCache {
    pub fn new(ttl: Duration, failure_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            failure_ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Failed snapshots expire on the shorter failure TTL.
    pub fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        let ttl = if entry.snapshot.is_ok() {
            self.ttl
        } else {
            self.failure_ttl
        };
        !entry.invalidated && now.saturating_duration_since(entry.fetched_at) < ttl
    }

    /// The cached snapshot and whether it is still fresh.
    pub fn lookup(&self, key: &str, now: Instant) -> Option<(Arc<AstronomicalSnapshot>, bool)> {
        self.entries
            .get(key)
            .map(|entry| (Arc::clone(&entry.snapshot), self.is_fresh(entry, now)))
    }

    pub fn insert(&mut self, key: &str, snapshot: Arc<AstronomicalSnapshot>, now: Instant) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                snapshot,
                fetched_at: now,
                invalidated: false,
            },
        );
    }

    /// Marks an entry stale while keeping its snapshot readable.
    pub fn invalidate(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) => {
                let replacement = CacheEntry {
                    invalidated: true,
                    ..entry.clone()
                };
                self.entries.insert(key.to_string(), replacement);
                true
            }
            None => false,
        }
    }

    /// Drops entries older than `max_age`, except `keep`. Returns how many went.
    pub fn evict_older_than(&mut self, now: Instant, max_age: Duration, keep: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            key == keep || now.saturating_duration_since(entry.fetched_at) <= max_age
        });
        before - self.entries.len()
    }
}
