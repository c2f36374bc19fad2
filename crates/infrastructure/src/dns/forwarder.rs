//! Forwarding pipeline: ordered endpoints, per-endpoint deadline,
//! outer retry loop, failover on any error.

use std::net::SocketAddr;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::{Message, ResponseCode};
use prismdns_domain::{BackendConfig, DomainError};
use tracing::{debug, warn};

use super::cache::{CacheKey, ZoneCache};
use super::message::reply_with_code;
use super::transport::DialPath;
use crate::metrics::ZoneMetrics;

pub struct Forwarder {
    endpoints: Vec<SocketAddr>,
    timeout: Duration,
    retries: u32,
    dial: DialPath,
    metrics: Option<Arc<ZoneMetrics>>,
}

impl Forwarder {
    pub fn new(backend: &BackendConfig) -> Self {
        Self::with_dial(backend, DialPath::Os)
    }

    pub fn with_dial(backend: &BackendConfig, dial: DialPath) -> Self {
        // Validation already rejected unparseable endpoints; anything
        // that slips through an unvalidated config is skipped, not
        // retried forever.
        let endpoints = backend
            .dns_servers
            .iter()
            .filter_map(|server| match server.parse::<SocketAddr>() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    warn!(server = %server, error = %e, "Skipping unparseable upstream endpoint");
                    None
                }
            })
            .collect();

        Self {
            endpoints,
            timeout: backend.timeout(),
            retries: backend.retries().max(1),
            dial,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ZoneMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Tries every endpoint in order, `retries` times over. The first
    /// decodable response wins and is stored in the zone cache under
    /// the request's question. Exhaustion yields a `ServerFailure`
    /// reply mirroring the request.
    pub async fn forward(&self, request: &Message, cache: Option<&ZoneCache>) -> Message {
        let payload = match request.to_vec() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode request for forwarding");
                return reply_with_code(request, ResponseCode::ServFail);
            }
        };

        let mut last_error: Option<DomainError> = None;

        for attempt in 0..self.retries {
            for endpoint in &self.endpoints {
                let response = match self.dial.exchange(&payload, *endpoint, self.timeout).await {
                    Ok(bytes) => match Message::from_vec(&bytes) {
                        Ok(response) => response,
                        Err(e) => {
                            debug!(server = %endpoint, error = %e, "Undecodable upstream response");
                            last_error = Some(DomainError::Malformed(e.to_string()));
                            self.record_error();
                            continue;
                        }
                    },
                    Err(e) => {
                        debug!(server = %endpoint, attempt, error = %e, "Upstream exchange failed");
                        last_error = Some(e);
                        self.record_error();
                        continue;
                    }
                };

                if let (Some(cache), Some(question)) = (cache, request.queries().first()) {
                    let key =
                        CacheKey::new(&question.name().to_utf8(), question.query_type(), None);
                    cache.put(key, &response);
                }

                return response;
            }
        }

        warn!(
            retries = self.retries,
            endpoints = self.endpoints.len(),
            error = ?last_error,
            "All upstream servers failed"
        );
        reply_with_code(request, ResponseCode::ServFail)
    }

    fn record_error(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.upstream_errors.fetch_add(1, AtomicOrdering::Relaxed);
        }
    }
}
