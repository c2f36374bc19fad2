#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use prismdns_domain::DomainError;
use prismdns_infrastructure::dns::{transport, OverlayNetwork};

/// Overlay fake: a static host table plus OS-dialed exchanges.
pub struct MockOverlay {
    suffix: String,
    hosts: HashMap<String, IpAddr>,
}

impl MockOverlay {
    pub fn new(suffix: &str) -> Self {
        Self {
            suffix: suffix.to_string(),
            hosts: HashMap::new(),
        }
    }

    pub fn with_host(mut self, host: &str, addr: IpAddr) -> Self {
        self.hosts.insert(host.to_string(), addr);
        self
    }
}

#[async_trait]
impl OverlayNetwork for MockOverlay {
    fn dns_suffix(&self) -> &str {
        &self.suffix
    }

    async fn lookup_host(&self, host: &str) -> Option<IpAddr> {
        self.hosts.get(host).copied()
    }

    async fn exchange(
        &self,
        payload: &[u8],
        endpoint: SocketAddr,
        timeout: Duration,
    ) -> Result<Vec<u8>, DomainError> {
        transport::udp_exchange(payload, endpoint, timeout).await
    }
}
