//! Per-zone response cache.
//!
//! One bounded map per zone, guarded by a single reader-writer lock:
//! lookups take the read lock and copy out, every mutation (insert,
//! clear, sweep) takes the write lock. No lock is ever held across a
//! network exchange. A background sweeper drops expired entries at
//! `ttl / 4` until the cache is stopped, which happens when its zone
//! disappears on reload or the process shuts down.

mod key;
mod size;

pub use key::CacheKey;
pub use size::{entry_size, message_size};

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use hickory_proto::op::Message;
use rustc_hash::FxBuildHasher;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct CacheEntry {
    response: Message,
    expires_at: Instant,
}

#[derive(Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub insertions: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(AtomicOrdering::Relaxed) as f64;
        let total = hits + self.misses.load(AtomicOrdering::Relaxed) as f64;
        if total > 0.0 {
            (hits / total) * 100.0
        } else {
            0.0
        }
    }
}

struct CacheState {
    entries: HashMap<CacheKey, CacheEntry, FxBuildHasher>,
    bytes_used: i64,
}

pub struct ZoneCache {
    state: RwLock<CacheState>,
    max_entries: usize,
    ttl: Duration,
    zone: String,
    metrics: Arc<CacheMetrics>,
    sweeper: CancellationToken,
}

impl ZoneCache {
    pub fn new(zone: &str, max_entries: usize, ttl: Duration) -> Arc<Self> {
        let cache = Arc::new(Self {
            state: RwLock::new(CacheState {
                entries: HashMap::with_hasher(FxBuildHasher),
                bytes_used: 0,
            }),
            max_entries,
            ttl,
            zone: zone.to_string(),
            metrics: Arc::new(CacheMetrics::default()),
            sweeper: CancellationToken::new(),
        });

        info!(zone = %cache.zone, max_entries, ttl = ?ttl, "Zone cache initialized");

        let sweeper = Arc::clone(&cache);
        tokio::spawn(async move { sweeper.run_sweeper().await });

        cache
    }

    /// Copies out a live entry. Expired entries report a miss and are
    /// left in place for the sweeper.
    pub fn get(&self, key: &CacheKey) -> Option<Message> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());

        match state.entries.get(key) {
            Some(entry) if Instant::now() <= entry.expires_at => {
                self.metrics.hits.fetch_add(1, AtomicOrdering::Relaxed);
                Some(entry.response.clone())
            }
            _ => {
                self.metrics.misses.fetch_add(1, AtomicOrdering::Relaxed);
                None
            }
        }
    }

    /// Inserts a copy of the response with `expires_at = now + ttl`.
    /// At capacity, expired entries are evicted first; if the map is
    /// still full, the single entry with the earliest expiry goes.
    pub fn put(&self, key: CacheKey, response: &Message) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        if state.entries.len() >= self.max_entries {
            self.evict_expired(&mut state);

            if state.entries.len() >= self.max_entries {
                self.evict_earliest(&mut state);
            }
        }

        let new_size = size::entry_size(key.len(), mem::size_of::<CacheEntry>(), response) as i64;
        let entry = CacheEntry {
            response: response.clone(),
            expires_at: Instant::now() + self.ttl,
        };

        if let Some(replaced) = state.entries.insert(key.clone(), entry) {
            let old_size =
                size::entry_size(key.len(), mem::size_of::<CacheEntry>(), &replaced.response);
            state.bytes_used -= old_size as i64;
        }
        state.bytes_used += new_size;
        self.metrics.insertions.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.entries.clear();
        state.bytes_used = 0;
        info!(zone = %self.zone, "Cache cleared");
    }

    /// Signals the sweeper to terminate. Must be called when the
    /// owning configuration is replaced or the process shuts down.
    /// Inserts after `stop()` still complete; without the sweeper,
    /// expired entries are only dropped under capacity pressure.
    pub fn stop(&self) {
        self.sweeper.cancel();
    }

    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes_used(&self) -> i64 {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.bytes_used
    }

    pub fn metrics(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.metrics)
    }

    async fn run_sweeper(self: Arc<Self>) {
        let period = (self.ttl / 4).max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.sweeper.cancelled() => {
                    debug!(zone = %self.zone, "Cache sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                    self.evict_expired(&mut state);
                }
            }
        }
    }

    fn evict_expired(&self, state: &mut CacheState) {
        let now = Instant::now();
        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| now > entry.expires_at)
            .map(|(key, _)| key.clone())
            .collect();

        if expired.is_empty() {
            return;
        }

        for key in &expired {
            if let Some(entry) = state.entries.remove(key) {
                let freed =
                    size::entry_size(key.len(), mem::size_of::<CacheEntry>(), &entry.response);
                state.bytes_used -= freed as i64;
            }
        }

        self.metrics
            .evictions
            .fetch_add(expired.len() as u64, AtomicOrdering::Relaxed);
        debug!(zone = %self.zone, evicted = expired.len(), "Expired cache entries removed");
    }

    /// Removes the one entry expiring soonest — the cheap stand-in
    /// for oldest-insertion under a fixed TTL.
    fn evict_earliest(&self, state: &mut CacheState) {
        let earliest = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = earliest {
            if let Some(entry) = state.entries.remove(&key) {
                let freed =
                    size::entry_size(key.len(), mem::size_of::<CacheEntry>(), &entry.response);
                state.bytes_used -= freed as i64;
                self.metrics.evictions.fetch_add(1, AtomicOrdering::Relaxed);
                warn!(zone = %self.zone, key = %key, "Cache at capacity, evicted earliest-expiring entry");
            }
        }
    }
}
