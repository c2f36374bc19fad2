//! Process-wide metrics: lock-free counters keyed by zone, published
//! as a JSON snapshot on the stats endpoint.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::dns::cache::ZoneCache;

/// Zone name used for queries that match no configured zone.
pub const FALLBACK_ZONE: &str = "default";

#[derive(Default)]
pub struct ZoneMetrics {
    pub queries: AtomicU64,
    pub synthesized: AtomicU64,
    pub synth_failures: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub upstream_errors: AtomicU64,
    pub blocked_external: AtomicU64,
}

pub struct Metrics {
    queries_total: AtomicU64,
    zones: DashMap<String, Arc<ZoneMetrics>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            queries_total: AtomicU64::new(0),
            zones: DashMap::new(),
        }
    }

    pub fn zone(&self, zone: &str) -> Arc<ZoneMetrics> {
        self.zones
            .entry(zone.to_string())
            .or_default()
            .value()
            .clone()
    }

    pub fn record_query(&self, zone: &str) {
        self.queries_total.fetch_add(1, AtomicOrdering::Relaxed);
        self.zone(zone).queries.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_synthesized(&self, zone: &str) {
        self.zone(zone)
            .synthesized
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_synth_failure(&self, zone: &str) {
        self.zone(zone)
            .synth_failures
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_cache_hit(&self, zone: &str) {
        self.zone(zone)
            .cache_hits
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_cache_miss(&self, zone: &str) {
        self.zone(zone)
            .cache_misses
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_blocked_external(&self, zone: &str) {
        self.zone(zone)
            .blocked_external
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// One coherent view of every counter plus the live cache gauges.
    pub fn snapshot(&self, caches: &HashMap<String, Arc<ZoneCache>>) -> StatsSnapshot {
        let mut zones: BTreeMap<String, ZoneStats> = BTreeMap::new();

        for entry in self.zones.iter() {
            let m = entry.value();
            zones.insert(
                entry.key().clone(),
                ZoneStats {
                    queries: m.queries.load(AtomicOrdering::Relaxed),
                    synthesized: m.synthesized.load(AtomicOrdering::Relaxed),
                    synth_failures: m.synth_failures.load(AtomicOrdering::Relaxed),
                    cache_hits: m.cache_hits.load(AtomicOrdering::Relaxed),
                    cache_misses: m.cache_misses.load(AtomicOrdering::Relaxed),
                    upstream_errors: m.upstream_errors.load(AtomicOrdering::Relaxed),
                    blocked_external: m.blocked_external.load(AtomicOrdering::Relaxed),
                    ..ZoneStats::default()
                },
            );
        }

        for (zone, cache) in caches {
            let stats = zones.entry(zone.clone()).or_default();
            stats.cache_entries = cache.len() as u64;
            stats.cache_bytes = cache.bytes_used();
        }

        StatsSnapshot {
            queries_total: self.queries_total.load(AtomicOrdering::Relaxed),
            zones,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct StatsSnapshot {
    pub queries_total: u64,
    pub zones: BTreeMap<String, ZoneStats>,
}

#[derive(Debug, Default, Serialize)]
pub struct ZoneStats {
    pub queries: u64,
    pub synthesized: u64,
    pub synth_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub upstream_errors: u64,
    pub blocked_external: u64,
    pub cache_entries: u64,
    pub cache_bytes: i64,
}
