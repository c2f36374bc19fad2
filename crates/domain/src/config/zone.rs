use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A named rule set: domain patterns, upstream backend, optional
/// synthesis parameters and optional response cache.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Zone {
    /// Domain patterns: exact FQDNs or single-label wildcards
    /// (`*.suffix`).
    pub domains: Vec<String>,

    /// Upstream resolvers for this zone. Fields left unset inherit
    /// the global backend.
    #[serde(default)]
    pub backend: BackendConfig,

    /// FQDN (or literal IPv4) whose A record gets embedded in
    /// synthetic answers.
    #[serde(rename = "reflectedDomain", default, skip_serializing_if = "Option::is_none")]
    pub reflected_domain: Option<String>,

    /// Per-zone site identifier placed at bytes 10..11 of synthetic
    /// addresses. Nonzero; unique across synthesis zones.
    #[serde(rename = "translateid", default, skip_serializing_if = "Option::is_none")]
    pub translate_id: Option<u16>,

    /// IPv6 CIDR the synthetic addresses are carved from. Must lie
    /// within the reserved overlay range.
    #[serde(rename = "prefixSubnet", default, skip_serializing_if = "Option::is_none")]
    pub prefix_subnet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,

    /// Admit clients from outside the overlay. Refused on synthesis
    /// zones at validation time.
    #[serde(rename = "allowExternalClients", default)]
    pub allow_external_clients: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct BackendConfig {
    #[serde(rename = "dnsServers", default)]
    pub dns_servers: Vec<String>,

    #[serde(with = "humantime_serde::option", default)]
    pub timeout: Option<Duration>,

    #[serde(default)]
    pub retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CacheConfig {
    #[serde(rename = "maxSize", default)]
    pub max_size: Option<usize>,

    #[serde(with = "humantime_serde::option", default)]
    pub ttl: Option<Duration>,
}

pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_BACKEND_RETRIES: u32 = 3;
pub const DEFAULT_CACHE_MAX_SIZE: usize = 10_000;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Lowercases a name and guarantees the trailing dot. Both matching
/// and cache keying depend on this exact normalization.
pub fn normalize_fqdn(name: &str) -> String {
    let mut fqdn = name.to_ascii_lowercase();
    if !fqdn.ends_with('.') {
        fqdn.push('.');
    }
    fqdn
}

impl Zone {
    /// Whether any synthesis parameter is present. Validation turns a
    /// partial set into an error, so after load this is equivalent to
    /// "synthesis enabled".
    pub fn has_synthesis(&self) -> bool {
        self.translate_id.is_some()
            || self.reflected_domain.as_deref().is_some_and(|d| !d.is_empty())
            || self.prefix_subnet.is_some()
    }

    pub fn reflected_domain(&self) -> &str {
        self.reflected_domain.as_deref().unwrap_or_default()
    }

    /// Tests one pattern against a query name. `name` and `pattern`
    /// are normalized before comparison.
    ///
    /// Arms: exact match; `*.suffix` matching any name ending in
    /// `.suffix` (the bare `suffix` itself does not match); and
    /// proper-subdomain match for plain patterns.
    pub fn matches_domain(name: &str, pattern: &str) -> bool {
        let name = normalize_fqdn(name);
        let pattern = normalize_fqdn(pattern);

        if let Some(suffix) = pattern.strip_prefix("*.") {
            return name.ends_with(&format!(".{suffix}"));
        }

        name == pattern || name.ends_with(&format!(".{pattern}"))
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_BACKEND_TIMEOUT)
    }

    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(DEFAULT_BACKEND_RETRIES)
    }
}

impl CacheConfig {
    pub fn max_size(&self) -> usize {
        self.max_size.unwrap_or(DEFAULT_CACHE_MAX_SIZE)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl.unwrap_or(DEFAULT_CACHE_TTL)
    }
}
