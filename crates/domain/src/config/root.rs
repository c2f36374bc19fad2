use std::collections::HashMap;
use std::net::SocketAddr;

use ipnetwork::Ipv6Network;
use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use super::zone::{
    BackendConfig, CacheConfig, Zone, DEFAULT_BACKEND_RETRIES, DEFAULT_BACKEND_TIMEOUT,
    DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL,
};
use crate::synthetic;

const DEFAULT_DNS_SERVERS: [&str; 2] = ["8.8.8.8:53", "1.1.1.1:53"];

/// The zone table plus global defaults. Loaded once at startup and
/// again on every reload; request handling only ever sees validated
/// instances.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub zones: HashMap<String, Zone>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct GlobalConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Reads and parses a zone file. The format is JSON with `//` and
    /// `/* */` comments and trailing commas permitted.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::parse_str(&contents)
    }

    pub fn parse_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            json5::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.set_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Fills global defaults and inherits them per-field into zones.
    fn set_defaults(&mut self) {
        if self.global.backend.dns_servers.is_empty() {
            self.global.backend.dns_servers =
                DEFAULT_DNS_SERVERS.iter().map(|s| s.to_string()).collect();
        }
        if self.global.backend.timeout.is_none() {
            self.global.backend.timeout = Some(DEFAULT_BACKEND_TIMEOUT);
        }
        if self.global.backend.retries.is_none() {
            self.global.backend.retries = Some(DEFAULT_BACKEND_RETRIES);
        }
        if self.global.cache.max_size.is_none() {
            self.global.cache.max_size = Some(DEFAULT_CACHE_MAX_SIZE);
        }
        if self.global.cache.ttl.is_none() {
            self.global.cache.ttl = Some(DEFAULT_CACHE_TTL);
        }

        for zone in self.zones.values_mut() {
            if zone.backend.dns_servers.is_empty() {
                zone.backend.dns_servers = self.global.backend.dns_servers.clone();
            }
            if zone.backend.timeout.is_none() {
                zone.backend.timeout = self.global.backend.timeout;
            }
            if zone.backend.retries.is_none() {
                zone.backend.retries = self.global.backend.retries;
            }

            if zone.translate_id.is_some() && zone.prefix_subnet.is_none() {
                zone.prefix_subnet = Some(synthetic::DEFAULT_PREFIX_SUBNET.to_string());
            }

            if zone.cache.is_none() && self.global.cache.max_size() > 0 {
                zone.cache = Some(self.global.cache.clone());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zones.is_empty() {
            return Err(ConfigError::Validation(
                "at least one zone must be configured".to_string(),
            ));
        }

        let mut site_ids: HashMap<u16, &str> = HashMap::new();

        let mut names: Vec<&String> = self.zones.keys().collect();
        names.sort();

        for name in names {
            let zone = &self.zones[name];

            if zone.domains.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "zone {name} must have at least one domain"
                )));
            }

            if zone.backend.dns_servers.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "zone {name} must have at least one backend DNS server"
                )));
            }

            for server in &zone.backend.dns_servers {
                if server.parse::<SocketAddr>().is_err() {
                    return Err(ConfigError::Validation(format!(
                        "zone {name} backend server {server} is not an ip:port endpoint"
                    )));
                }
            }

            if zone.has_synthesis() {
                let reflected = zone.reflected_domain();
                if reflected.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "zone {name}: reflectedDomain is required when synthesis is configured"
                    )));
                }

                let site_id = zone.translate_id.ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "zone {name}: translateid is required when synthesis is configured"
                    ))
                })?;
                if site_id == 0 {
                    return Err(ConfigError::Validation(format!(
                        "zone {name}: translateid cannot be 0 (reserved)"
                    )));
                }
                if let Some(other) = site_ids.insert(site_id, name) {
                    return Err(ConfigError::Validation(format!(
                        "duplicate translateid {site_id} in zones {other} and {name}"
                    )));
                }

                let subnet = zone
                    .prefix_subnet
                    .as_deref()
                    .unwrap_or(synthetic::DEFAULT_PREFIX_SUBNET);
                let network: Ipv6Network = subnet.parse().map_err(|e| {
                    ConfigError::Validation(format!(
                        "zone {name}: invalid prefix subnet {subnet}: {e}"
                    ))
                })?;
                if !synthetic::is_overlay_prefix(&network) {
                    return Err(ConfigError::Validation(format!(
                        "zone {name}: prefix subnet {subnet} is outside the overlay range"
                    )));
                }

                if zone.allow_external_clients {
                    return Err(ConfigError::Validation(format!(
                        "zone {name}: external clients cannot be admitted on synthesis zones"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Selects the zone for a query name: every pattern of every zone
    /// is tested, the longest matching pattern wins, and ties break by
    /// pattern then zone name so the answer never depends on map
    /// iteration order.
    pub fn select_zone(&self, name: &str) -> Option<(&str, &Zone)> {
        let mut best: Option<(&str, &str, &Zone)> = None;

        for (zone_name, zone) in &self.zones {
            for pattern in &zone.domains {
                if !Zone::matches_domain(name, pattern) {
                    continue;
                }
                let candidate = (pattern.as_str(), zone_name.as_str(), zone);
                best = Some(match best {
                    None => candidate,
                    Some(current) => {
                        let (cur_pat, cur_name, _) = current;
                        if pattern.len() > cur_pat.len()
                            || (pattern.len() == cur_pat.len()
                                && (pattern.as_str(), zone_name.as_str()) < (cur_pat, cur_name))
                        {
                            candidate
                        } else {
                            current
                        }
                    }
                });
            }
        }

        best.map(|(_, zone_name, zone)| (zone_name, zone))
    }

    /// The parsed prefix network for a synthesis zone. Validation has
    /// already accepted the subnet, so failures only occur when called
    /// on an unvalidated instance.
    pub fn prefix_network(zone: &Zone) -> Result<Ipv6Network, ConfigError> {
        let subnet = zone
            .prefix_subnet
            .as_deref()
            .unwrap_or(synthetic::DEFAULT_PREFIX_SUBNET);
        subnet
            .parse()
            .map_err(|e| ConfigError::Validation(format!("invalid prefix subnet {subnet}: {e}")))
    }
}
