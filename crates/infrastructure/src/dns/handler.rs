//! The query dispatcher.
//!
//! Each request is served against one runtime snapshot taken at
//! entry, so a concurrent reload never changes the zone table, the
//! translator or the caches mid-request. Decision order: cache,
//! synthesis, overlay system names, access gate, forwarding.

use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{RData, Record, RecordType};
use prismdns_domain::{classify, normalize_fqdn, ClientClass, RuntimeOptions};
use tracing::{debug, error, info, warn};

use super::cache::CacheKey;
use super::forwarder::Forwarder;
use super::message::{reply_template, reply_with_code};
use super::overlay::OverlayNetwork;
use super::reload::ZoneRuntime;
use super::transport::DialPath;
use crate::memory::MemoryMonitor;
use crate::metrics::{Metrics, FALLBACK_ZONE};

/// Wire header length; anything shorter is dropped without a reply.
const HEADER_LEN: usize = 12;

pub struct QueryHandler {
    runtime: RwLock<Arc<ZoneRuntime>>,
    overlay: Option<Arc<dyn OverlayNetwork>>,
    memory: Option<Arc<MemoryMonitor>>,
    options: RuntimeOptions,
    metrics: Arc<Metrics>,
}

impl QueryHandler {
    pub fn new(runtime: ZoneRuntime, options: RuntimeOptions, metrics: Arc<Metrics>) -> Self {
        Self {
            runtime: RwLock::new(Arc::new(runtime)),
            overlay: None,
            memory: None,
            options,
            metrics,
        }
    }

    pub fn with_overlay(mut self, overlay: Arc<dyn OverlayNetwork>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_memory_monitor(mut self, monitor: Arc<MemoryMonitor>) -> Self {
        self.memory = Some(monitor);
        self
    }

    pub fn memory_monitor(&self) -> Option<Arc<MemoryMonitor>> {
        self.memory.clone()
    }

    /// The runtime snapshot used for one whole request.
    pub fn snapshot(&self) -> Arc<ZoneRuntime> {
        self.runtime
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Publishes a new runtime and returns the retired one so the
    /// caller can stop caches that were not carried over.
    pub fn swap(&self, runtime: ZoneRuntime) -> Arc<ZoneRuntime> {
        let mut slot = self.runtime.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *slot, Arc::new(runtime))
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Serves one datagram. `None` means no response is sent (short
    /// garbage, or an encode failure on the way out).
    pub async fn handle(&self, payload: &[u8], client: IpAddr) -> Option<Vec<u8>> {
        if payload.len() < HEADER_LEN {
            debug!(client = %client, len = payload.len(), "Dropping undersized datagram");
            return None;
        }

        let response = match Message::from_vec(payload) {
            Ok(request) => self.dispatch(&request, client).await,
            Err(e) => {
                debug!(client = %client, error = %e, "Unparseable request");
                form_err_raw(payload)
            }
        };

        match response.to_vec() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!(error = %e, "Failed to encode response");
                None
            }
        }
    }

    async fn dispatch(&self, request: &Message, client: IpAddr) -> Message {
        let Some(question) = request.queries().first().cloned() else {
            return reply_with_code(request, ResponseCode::FormErr);
        };

        let name = normalize_fqdn(&question.name().to_utf8());
        let qtype = question.query_type();
        let class = classify(client);

        let runtime = self.snapshot();
        let selected = runtime.config.select_zone(&name);
        let zone_label = selected.map(|(n, _)| n).unwrap_or(FALLBACK_ZONE).to_string();

        self.metrics.record_query(&zone_label);
        if self.options.log_queries {
            info!(
                name = %name,
                qtype = %qtype,
                client = %client,
                client_class = class.as_str(),
                "DNS query"
            );
        }

        if let Some(cache) = selected.and_then(|(zone_name, _)| runtime.caches.get(zone_name)) {
            let key = CacheKey::new(&name, qtype, None);
            if let Some(mut cached) = cache.get(&key) {
                self.metrics.record_cache_hit(&zone_label);
                if let Some(monitor) = &self.memory {
                    if let Err(e) = monitor.update_cache_usage(&zone_label, cache.bytes_used()) {
                        debug!(zone = %zone_label, error = %e, "Cache usage reading rejected");
                    }
                }
                debug!(zone = %zone_label, name = %name, qtype = %qtype, "Cache hit");
                cached.set_id(request.id());
                return cached;
            }
            self.metrics.record_cache_miss(&zone_label);
        }

        if class.is_overlay() {
            if let Some((zone_name, zone)) = selected {
                if zone.has_synthesis() && matches!(qtype, RecordType::AAAA | RecordType::A) {
                    return self
                        .answer_synthesis(&runtime, request, &name, qtype, zone_name)
                        .await;
                }
            }
        }

        if let Some(overlay) = &self.overlay {
            if is_system_name(&name, overlay.dns_suffix()) {
                return self.answer_system_name(overlay, request, &name, qtype).await;
            }
        }

        let admits_external = selected.is_some_and(|(_, zone)| zone.allow_external_clients);
        if !class.is_overlay() && !admits_external {
            self.metrics.record_blocked_external(&zone_label);
            debug!(client = %client, zone = %zone_label, name = %name, "External client blocked");
            return reply_with_code(request, ResponseCode::NXDomain);
        }

        if !class.is_overlay() {
            info!(client = %client, zone = %zone_label, name = %name, "External client accessing admitted zone");
        }

        let dial = match (&self.overlay, class) {
            (Some(overlay), ClientClass::Overlay) => DialPath::Overlay(Arc::clone(overlay)),
            _ => DialPath::Os,
        };

        match selected {
            Some((zone_name, zone)) => {
                let forwarder = Forwarder::with_dial(&zone.backend, dial)
                    .with_metrics(self.metrics.zone(zone_name));
                let cache = runtime.caches.get(zone_name).map(Arc::as_ref);
                forwarder.forward(request, cache).await
            }
            None => {
                let forwarder = Forwarder::with_dial(&runtime.config.global.backend, dial)
                    .with_metrics(self.metrics.zone(FALLBACK_ZONE));
                forwarder.forward(request, None).await
            }
        }
    }

    /// AAAA on a synthesis zone answers with the synthetic address;
    /// failed reflection and A queries both answer NODATA. Every
    /// outcome is authoritative, `NoError`, and cached.
    async fn answer_synthesis(
        &self,
        runtime: &ZoneRuntime,
        request: &Message,
        name: &str,
        qtype: RecordType,
        zone_name: &str,
    ) -> Message {
        let mut reply = reply_template(request);
        reply.set_authoritative(true);

        if qtype == RecordType::AAAA {
            match runtime.translator.forward(name, &DialPath::Os).await {
                Ok(addr) => {
                    self.metrics.record_synthesized(zone_name);
                    if let Some(question) = request.queries().first() {
                        reply.add_answer(Record::from_rdata(
                            question.name().clone(),
                            self.options.default_ttl,
                            RData::AAAA(AAAA(addr)),
                        ));
                    }
                }
                Err(e) => {
                    warn!(zone = %zone_name, name = %name, error = %e, "Synthesis failed");
                    self.metrics.record_synth_failure(zone_name);
                }
            }
        }

        if let Some(cache) = runtime.caches.get(zone_name) {
            cache.put(CacheKey::new(name, qtype, None), &reply);
        }

        reply
    }

    /// Overlay system names resolve from the overlay's host table.
    async fn answer_system_name(
        &self,
        overlay: &Arc<dyn OverlayNetwork>,
        request: &Message,
        name: &str,
        qtype: RecordType,
    ) -> Message {
        let host = name.trim_end_matches('.');

        let Some(addr) = overlay.lookup_host(host).await else {
            debug!(name = %name, "Overlay host not found");
            return reply_with_code(request, ResponseCode::NXDomain);
        };

        let mut reply = reply_template(request);
        reply.set_authoritative(true);

        if let Some(question) = request.queries().first() {
            match (qtype, addr) {
                (RecordType::A, IpAddr::V4(v4)) => {
                    reply.add_answer(Record::from_rdata(
                        question.name().clone(),
                        self.options.default_ttl,
                        RData::A(A(v4)),
                    ));
                }
                (RecordType::AAAA, IpAddr::V6(v6)) => {
                    reply.add_answer(Record::from_rdata(
                        question.name().clone(),
                        self.options.default_ttl,
                        RData::AAAA(AAAA(v6)),
                    ));
                }
                _ => {}
            }
        }

        if reply.answers().is_empty() {
            reply.set_response_code(ResponseCode::NXDomain);
        }

        reply
    }
}

fn is_system_name(fqdn: &str, suffix: &str) -> bool {
    let suffix = suffix.trim_start_matches('.').trim_end_matches('.');
    fqdn.trim_end_matches('.')
        .ends_with(&format!(".{}", suffix.to_ascii_lowercase()))
}

/// Minimal `FormErr` reply for requests hickory refuses to decode:
/// the id is echoed from the raw header, everything else is empty.
fn form_err_raw(payload: &[u8]) -> Message {
    let id = u16::from_be_bytes([payload[0], payload[1]]);
    let mut reply = Message::new();
    reply.set_id(id);
    reply.set_message_type(MessageType::Response);
    reply.set_response_code(ResponseCode::FormErr);
    reply
}
