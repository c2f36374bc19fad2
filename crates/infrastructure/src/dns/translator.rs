//! Synthetic AAAA translation.
//!
//! Each synthesis-enabled zone owns a precomputed rule: the reflected
//! target, the site id, the prefix network bytes and the upstream
//! endpoints used to resolve the target. `forward` turns a query name
//! into a synthetic IPv6, `reverse` recovers the reflected target and
//! embedded IPv4 from one.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::{Message, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use prismdns_domain::{normalize_fqdn, synthetic, Config, ConfigError, DomainError, Zone};
use tracing::{debug, info, warn};

use super::transport::DialPath;

/// Everything `forward` needs for one zone, derived once at
/// construction.
#[derive(Debug, Clone)]
pub struct SyntheticRule {
    pub reflected_target: String,
    pub site_id: u16,
    pub prefix: [u8; 16],
    pub endpoints: Vec<SocketAddr>,
    pub timeout: Duration,
}

struct ZoneTranslator {
    domains: Vec<String>,
    rule: SyntheticRule,
}

pub struct Translator {
    table: Arc<Config>,
    zones: HashMap<String, ZoneTranslator>,
    sites: HashMap<u16, String>,
}

impl Translator {
    pub fn new(table: Arc<Config>) -> Result<Self, ConfigError> {
        let mut zones = HashMap::new();
        let mut sites = HashMap::new();

        for (name, zone) in &table.zones {
            if !zone.has_synthesis() {
                continue;
            }

            let rule = build_rule(name, zone)?;
            info!(
                zone = %name,
                reflected = %rule.reflected_target,
                site_id = rule.site_id,
                "Synthesis zone registered"
            );

            sites.insert(rule.site_id, name.clone());
            zones.insert(
                name.clone(),
                ZoneTranslator {
                    domains: zone.domains.clone(),
                    rule,
                },
            );
        }

        Ok(Self { table, zones, sites })
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Synthesizes the AAAA address for `name`: selects the zone,
    /// resolves the reflected target to an IPv4 (skipped for literal
    /// targets), and embeds prefix, site id and address.
    pub async fn forward(&self, name: &str, dial: &DialPath) -> Result<Ipv6Addr, DomainError> {
        let fqdn = normalize_fqdn(name);

        let (zone_name, _) = self
            .table
            .select_zone(&fqdn)
            .ok_or_else(|| DomainError::ZoneNotFound(fqdn.clone()))?;
        let zone = self
            .zones
            .get(zone_name)
            .ok_or_else(|| DomainError::ZoneNotFound(fqdn.clone()))?;

        if let Ok(v4) = zone.rule.reflected_target.parse::<Ipv4Addr>() {
            return Ok(synthetic::embed(&zone.rule.prefix, zone.rule.site_id, v4));
        }

        let reflected = zone.effective_reflected(&fqdn);
        debug!(
            name = %fqdn,
            reflected = %reflected,
            site_id = zone.rule.site_id,
            "Resolving reflected target"
        );

        let v4 = self.resolve_reflected(&zone.rule, &reflected, dial).await?;
        Ok(synthetic::embed(&zone.rule.prefix, zone.rule.site_id, v4))
    }

    /// Inverse decode: recovers `(reflected target, embedded IPv4)`
    /// from a synthetic address.
    pub fn reverse(&self, addr: Ipv6Addr) -> Result<(String, Ipv4Addr), DomainError> {
        let (site_id, v4) = synthetic::decode(addr)?;

        let zone_name = self
            .sites
            .get(&site_id)
            .ok_or(DomainError::UnknownSite(site_id))?;
        let zone = &self.zones[zone_name];

        Ok((zone.rule.reflected_target.clone(), v4))
    }

    /// Type-A resolution of the reflected FQDN through the zone's own
    /// endpoints, one pass, per-endpoint deadline.
    async fn resolve_reflected(
        &self,
        rule: &SyntheticRule,
        reflected: &str,
        dial: &DialPath,
    ) -> Result<Ipv4Addr, DomainError> {
        let name = Name::from_utf8(reflected).map_err(|e| DomainError::ReflectFailed {
            target: reflected.to_string(),
            reason: e.to_string(),
        })?;

        let mut query = Message::new();
        query.set_id(fastrand::u16(..));
        query.set_recursion_desired(true);
        query.add_query(Query::query(name, RecordType::A));

        let payload = query.to_vec().map_err(|e| DomainError::ReflectFailed {
            target: reflected.to_string(),
            reason: e.to_string(),
        })?;

        for endpoint in &rule.endpoints {
            let bytes = match dial.exchange(&payload, *endpoint, rule.timeout).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(server = %endpoint, error = %e, "Reflected resolution exchange failed");
                    continue;
                }
            };

            let response = match Message::from_vec(&bytes) {
                Ok(response) => response,
                Err(e) => {
                    warn!(server = %endpoint, error = %e, "Undecodable reflected resolution response");
                    continue;
                }
            };

            if response.response_code() != ResponseCode::NoError {
                continue;
            }

            let answer = response.answers().iter().find_map(|record| {
                match record.data() {
                    Some(RData::A(a)) => Some(a.0),
                    _ => None,
                }
            });

            if let Some(v4) = answer {
                return Ok(v4);
            }
        }

        Err(DomainError::ReflectFailed {
            target: reflected.to_string(),
            reason: "no A record from any endpoint".to_string(),
        })
    }
}

impl ZoneTranslator {
    /// The FQDN actually resolved for a query name. For wildcard
    /// patterns the matched suffix is swapped for the reflected
    /// target, so `foo.` + wildcard base becomes `foo.` + target;
    /// exact and subdomain patterns use the target as-is.
    fn effective_reflected(&self, fqdn: &str) -> String {
        let reflected = normalize_fqdn(&self.rule.reflected_target);

        for pattern in &self.domains {
            if !Zone::matches_domain(fqdn, pattern) {
                continue;
            }

            let pattern = normalize_fqdn(pattern);
            if let Some(base) = pattern.strip_prefix("*.") {
                if let Some(head) = fqdn.strip_suffix(base) {
                    return format!("{head}{reflected}");
                }
            }
            break;
        }

        reflected
    }
}

fn build_rule(name: &str, zone: &Zone) -> Result<SyntheticRule, ConfigError> {
    let site_id = zone.translate_id.ok_or_else(|| {
        ConfigError::Validation(format!("zone {name}: translateid missing"))
    })?;

    let network = Config::prefix_network(zone)?;

    let endpoints = zone
        .backend
        .dns_servers
        .iter()
        .filter_map(|server| server.parse::<SocketAddr>().ok())
        .collect();

    Ok(SyntheticRule {
        reflected_target: zone.reflected_domain().to_string(),
        site_id,
        prefix: network.network().octets(),
        endpoints,
        timeout: zone.backend.timeout(),
    })
}
