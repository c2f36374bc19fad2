//! Cross-zone memory governance.
//!
//! The per-zone cache already enforces its own `maxEntries` bound;
//! this monitor watches the aggregate picture: how many zones exist,
//! how many bytes each zone cache reports, and whether the sum stays
//! inside the process budget. It is advisory — violations are logged
//! and counted, never turned into a failed response or a rejected
//! reload.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug, Clone)]
pub enum MemoryLimitError {
    #[error("maximum zone count exceeded: {current} of {limit}")]
    ZoneCount { limit: usize, current: usize },

    #[error("zone cache memory limit exceeded: {current} of {limit} bytes")]
    ZoneCache { limit: i64, current: i64 },

    #[error("global memory limit exceeded: {current} of {limit} bytes")]
    GlobalMemory { limit: i64, current: i64 },

    #[error("zone {0} is not registered for memory monitoring")]
    ZoneNotRegistered(String),
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryLimits {
    pub max_zone_count: usize,
    pub max_total_bytes: i64,
    pub max_cache_bytes_per_zone: i64,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            max_zone_count: 100,
            max_total_bytes: 500 * 1024 * 1024,
            max_cache_bytes_per_zone: 50 * 1024 * 1024,
        }
    }
}

#[derive(Default)]
struct ZoneUsage {
    cache_bytes: AtomicI64,
    violations: AtomicU64,
}

pub struct MemoryMonitor {
    zones: DashMap<String, ZoneUsage>,
    limits: MemoryLimits,
    shutdown: CancellationToken,
}

impl MemoryMonitor {
    pub fn new(limits: MemoryLimits) -> Arc<Self> {
        Arc::new(Self {
            zones: DashMap::new(),
            limits,
            shutdown: CancellationToken::new(),
        })
    }

    /// Registers a zone for monitoring. Past the zone-count cap the
    /// registration is refused; callers log the refusal and keep
    /// serving the zone. Re-registration is a no-op.
    pub fn register_zone(&self, zone: &str) -> Result<(), MemoryLimitError> {
        if self.zones.contains_key(zone) {
            return Ok(());
        }
        if self.zones.len() >= self.limits.max_zone_count {
            return Err(MemoryLimitError::ZoneCount {
                limit: self.limits.max_zone_count,
                current: self.zones.len(),
            });
        }

        self.zones.insert(zone.to_string(), ZoneUsage::default());
        info!(
            zone = %zone,
            max_cache_bytes = self.limits.max_cache_bytes_per_zone,
            "Zone memory monitoring registered"
        );
        Ok(())
    }

    /// Reconciles registrations with a freshly published zone table:
    /// removed zones are dropped, new ones registered.
    pub fn sync_zones<'a, I>(&self, zones: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keep: Vec<&str> = zones.into_iter().collect();
        self.zones.retain(|name, _| keep.contains(&name.as_str()));

        for name in keep {
            if let Err(e) = self.register_zone(name) {
                warn!(zone = %name, error = %e, "Zone memory monitoring registration refused");
            }
        }
    }

    /// Records a zone cache's byte gauge. A reading above the
    /// per-zone budget is rejected and counted as a violation; the
    /// previous reading stands.
    pub fn update_cache_usage(&self, zone: &str, bytes: i64) -> Result<(), MemoryLimitError> {
        let Some(usage) = self.zones.get(zone) else {
            return Err(MemoryLimitError::ZoneNotRegistered(zone.to_string()));
        };

        if bytes > self.limits.max_cache_bytes_per_zone {
            usage.violations.fetch_add(1, AtomicOrdering::Relaxed);
            warn!(
                zone = %zone,
                current = bytes,
                limit = self.limits.max_cache_bytes_per_zone,
                "Cache memory limit exceeded"
            );
            return Err(MemoryLimitError::ZoneCache {
                limit: self.limits.max_cache_bytes_per_zone,
                current: bytes,
            });
        }

        usage.cache_bytes.store(bytes, AtomicOrdering::Relaxed);
        Ok(())
    }

    pub fn zone_usage(&self, zone: &str) -> Option<i64> {
        self.zones
            .get(zone)
            .map(|usage| usage.cache_bytes.load(AtomicOrdering::Relaxed))
    }

    pub fn zone_violations(&self, zone: &str) -> u64 {
        self.zones
            .get(zone)
            .map(|usage| usage.violations.load(AtomicOrdering::Relaxed))
            .unwrap_or(0)
    }

    pub fn total_usage(&self) -> i64 {
        self.zones
            .iter()
            .map(|entry| entry.value().cache_bytes.load(AtomicOrdering::Relaxed))
            .sum()
    }

    pub fn check_global_limits(&self) -> Result<(), MemoryLimitError> {
        let current = self.total_usage();
        if current > self.limits.max_total_bytes {
            return Err(MemoryLimitError::GlobalMemory {
                limit: self.limits.max_total_bytes,
                current,
            });
        }
        Ok(())
    }

    /// Periodic global budget check, running until `stop()`.
    pub fn start_periodic_check(self: &Arc<Self>, interval: Duration) {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = monitor.shutdown.cancelled() => {
                        debug!("Memory monitor stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = monitor.check_global_limits() {
                            error!(error = %e, "Global memory check failed");
                        }
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}
