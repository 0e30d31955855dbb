use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::body::Bytes;
use axum::http::{HeaderValue, Method};
use dashmap::DashMap;
use tracing::debug;

use crate::cache::keys::{KeyMode, QueryParams, response_key};
use crate::cache::models::CacheEntry;
use crate::cache::sweeper::Sweep;
use crate::clock::Clock;

/// Process-wide TTL cache of serialized API responses.
///
/// Entries are only ever replaced whole. Expiry is time-based only: stale
/// entries are dropped when read or when [`ResponseCache::sweep_at`] runs.
/// There is no size bound and no invalidation on writes to the underlying
/// content.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl_ms: u64,
    key_mode: KeyMode,
    clock: Arc<dyn Clock>,
    sweeping: AtomicBool,
}

impl ResponseCache {
    pub fn new(ttl_ms: u64, key_mode: KeyMode, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_ms,
            key_mode,
            clock,
            sweeping: AtomicBool::new(false),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn key_mode(&self) -> KeyMode {
        self.key_mode
    }

    pub fn key_for(&self, method: &Method, path: &str, query: &QueryParams) -> String {
        response_key(method, path, query, self.key_mode)
    }

    /// Fresh entry for the request, if any. A stale entry found here is removed.
    pub fn lookup(&self, method: &Method, path: &str, query: &QueryParams) -> Option<CacheEntry> {
        let key = self.key_for(method, path, query);
        let now = self.clock.now_ms();
        let ttl = self.ttl_ms;

        let cached = self.entries.get(&key).map(|e| e.value().clone());
        match cached {
            Some(entry) if Self::is_fresh(&entry, now, ttl) => Some(entry),
            Some(_) => {
                self.entries.remove_if(&key, |_, e| !Self::is_fresh(e, now, ttl));
                None
            }
            None => None,
        }
    }

    /// Overwrites whatever is stored under the request's key.
    pub fn store(
        &self,
        method: &Method,
        path: &str,
        query: &QueryParams,
        payload: Bytes,
        content_type: Option<HeaderValue>,
    ) -> CacheEntry {
        let key = self.key_for(method, path, query);
        let entry = CacheEntry {
            key: key.clone(),
            payload,
            content_type,
            stored_at: self.clock.now_ms(),
        };
        self.entries.insert(key, entry.clone());
        entry
    }

    pub fn is_fresh(entry: &CacheEntry, now_ms: u64, ttl_ms: u64) -> bool {
        entry.is_fresh(now_ms, ttl_ms)
    }

    /// Drops every entry that is no longer fresh. Returns how many went.
    /// A call made while another sweep is in progress does nothing.
    pub fn sweep_at(&self, now_ms: u64, ttl_ms: u64) -> usize {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }

        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.is_fresh(now_ms, ttl_ms);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.sweeping.store(false, Ordering::Release);

        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Swept response cache");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Sweep for ResponseCache {
    fn name(&self) -> &'static str {
        "response_cache"
    }

    fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now_ms(), self.ttl_ms)
    }
}
