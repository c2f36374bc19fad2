use std::fmt;
use std::net::IpAddr;

use hickory_proto::rr::RecordType;
use prismdns_domain::normalize_fqdn;

/// Cache key: lowercased trailing-dot FQDN, `:`, the query-type
/// mnemonic, and optionally `:` plus the client address.
///
/// Lookup and store must build keys identically or hits become
/// unreachable; the dispatcher always passes `client = None`. The
/// client segment is kept for per-client policy responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(name: &str, query_type: RecordType, client: Option<IpAddr>) -> Self {
        let mut key = format!("{}:{}", normalize_fqdn(name), query_type);
        if let Some(client) = client {
            key.push(':');
            key.push_str(&client.to_string());
        }
        CacheKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
