//! Runtime snapshots and hot reload.
//!
//! The handler reads one immutable `ZoneRuntime` per request; reload
//! builds a replacement off to the side and swaps it in atomically.
//! A reload that fails to parse or validate leaves the running
//! snapshot untouched.

use std::collections::HashMap;
use std::sync::Arc;

use prismdns_domain::{Config, ConfigError};
use tracing::{debug, info};

use super::cache::ZoneCache;
use super::handler::QueryHandler;
use super::translator::Translator;

/// The immutable tuple a request works against: validated zone
/// table, translator, and per-zone caches.
pub struct ZoneRuntime {
    pub config: Arc<Config>,
    pub translator: Translator,
    pub caches: HashMap<String, Arc<ZoneCache>>,
}

impl ZoneRuntime {
    /// Builds a runtime from a validated configuration. When a
    /// previous runtime is given, a zone whose configuration is
    /// unchanged keeps its cache instance (and its entries); any
    /// changed or new zone gets a fresh one.
    pub fn build(config: Config, previous: Option<&ZoneRuntime>) -> Result<Self, ConfigError> {
        let config = Arc::new(config);
        let translator = Translator::new(Arc::clone(&config))?;

        let mut caches = HashMap::new();
        for (name, zone) in &config.zones {
            let Some(cache_config) = &zone.cache else {
                continue;
            };
            if cache_config.max_size() == 0 {
                continue;
            }

            let reusable = previous.and_then(|prev| {
                let unchanged = prev.config.zones.get(name) == Some(zone);
                if unchanged {
                    prev.caches.get(name).cloned()
                } else {
                    None
                }
            });

            match reusable {
                Some(cache) => {
                    debug!(zone = %name, "Reusing existing zone cache");
                    caches.insert(name.clone(), cache);
                }
                None => {
                    caches.insert(
                        name.clone(),
                        ZoneCache::new(name, cache_config.max_size(), cache_config.ttl()),
                    );
                }
            }
        }

        Ok(Self {
            config,
            translator,
            caches,
        })
    }

    pub fn stop_caches(&self) {
        for cache in self.caches.values() {
            cache.stop();
        }
    }
}

/// Owns the reload and shutdown lifecycle of a running handler.
pub struct Coordinator {
    handler: Arc<QueryHandler>,
    config_path: String,
}

impl Coordinator {
    pub fn new(handler: Arc<QueryHandler>, config_path: String) -> Self {
        Self {
            handler,
            config_path,
        }
    }

    /// Loads, validates and publishes a new zone configuration.
    /// Caches of unchanged zones survive; every retired cache is
    /// stopped after the swap.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let config = Config::load(&self.config_path)?;

        let previous = self.handler.snapshot();
        let next = ZoneRuntime::build(config, Some(&previous))?;
        let zone_count = next.config.zones.len();
        let synthesis_zones = next.translator.zone_count();

        let retired = self.handler.swap(next);
        let current = self.handler.snapshot();

        for (name, cache) in &retired.caches {
            let reused = current
                .caches
                .get(name)
                .is_some_and(|c| Arc::ptr_eq(c, cache));
            if !reused {
                cache.stop();
            }
        }

        if let Some(monitor) = self.handler.memory_monitor() {
            monitor.sync_zones(current.config.zones.keys().map(String::as_str));
        }

        info!(
            file = %self.config_path,
            zones = zone_count,
            synthesis_zones,
            "Configuration reloaded"
        );
        Ok(())
    }

    /// Stops every cache sweeper in the active runtime.
    pub fn shutdown(&self) {
        self.handler.snapshot().stop_caches();
    }
}
