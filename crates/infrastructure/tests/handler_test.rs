mod helpers;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use helpers::dns_server_mock::MockDnsServer;
use helpers::overlay_mock::MockOverlay;
use hickory_proto::op::{Message, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use prismdns_domain::{Config, RuntimeOptions};
use prismdns_infrastructure::dns::{QueryHandler, ZoneRuntime};
use prismdns_infrastructure::{MemoryLimits, MemoryMonitor, Metrics};

const OVERLAY_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(100, 100, 1, 1));
const EXTERNAL_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 50));

fn options() -> RuntimeOptions {
    RuntimeOptions {
        default_ttl: 300,
        ..RuntimeOptions::default()
    }
}

fn handler(json: &str) -> QueryHandler {
    let config = Config::parse_str(json).expect("valid test configuration");
    let runtime = ZoneRuntime::build(config, None).expect("runtime builds");
    QueryHandler::new(runtime, options(), Arc::new(Metrics::new()))
}

fn request(id: u16, name: &str, qtype: RecordType) -> Message {
    let mut message = Message::new();
    message.set_id(id);
    message.set_recursion_desired(true);
    message.add_query(Query::query(Name::from_utf8(name).unwrap(), qtype));
    message
}

async fn ask(handler: &QueryHandler, request: &Message, client: IpAddr) -> Message {
    let payload = request.to_vec().unwrap();
    let response = handler
        .handle(&payload, client)
        .await
        .expect("a response is sent");
    Message::from_vec(&response).unwrap()
}

const SYNTH_ZONE: &str = r#"{
    "zones": {
        "z1": {
            "domains": ["*.bench.local"],
            "reflectedDomain": "203.0.113.7",
            "translateid": 42,
        },
    },
}"#;

#[tokio::test]
async fn test_aaaa_synthesis_for_overlay_client() {
    let handler = handler(SYNTH_ZONE);
    let request = request(0x1234, "foo.bench.local.", RecordType::AAAA);

    let response = ask(&handler, &request, OVERLAY_CLIENT).await;

    assert_eq!(response.id(), 0x1234);
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert!(response.authoritative());
    assert_eq!(response.answers().len(), 1);

    let answer = &response.answers()[0];
    match answer.data() {
        Some(RData::AAAA(aaaa)) => assert_eq!(
            aaaa.0.octets(),
            [
                0xfd, 0x7a, 0x11, 0x5c, 0xa1, 0xe0, 0x0b, 0x1a, 0x00, 0x00, 0x00, 0x2a, 0xcb,
                0x00, 0x71, 0x07,
            ]
        ),
        other => panic!("expected AAAA answer, got {other:?}"),
    }
    assert_eq!(answer.ttl(), 300);
}

#[tokio::test]
async fn test_a_query_on_synthesis_zone_is_authoritative_nodata() {
    let handler = handler(SYNTH_ZONE);
    let request = request(0x2345, "foo.bench.local.", RecordType::A);

    let response = ask(&handler, &request, OVERLAY_CLIENT).await;

    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert!(response.authoritative());
    assert!(response.answers().is_empty());
}

#[tokio::test]
async fn test_external_client_is_gated_with_nxdomain() {
    let handler = handler(SYNTH_ZONE);
    let request = request(0x3456, "example.org.", RecordType::A);

    let response = ask(&handler, &request, EXTERNAL_CLIENT).await;

    assert_eq!(response.response_code(), ResponseCode::NXDomain);
    assert!(response.answers().is_empty());
}

#[tokio::test]
async fn test_external_client_blocked_even_on_synthesis_zone_names() {
    let handler = handler(SYNTH_ZONE);
    let request = request(0x4567, "foo.bench.local.", RecordType::AAAA);

    let response = ask(&handler, &request, EXTERNAL_CLIENT).await;

    // Synthesis is overlay-only, and the zone does not admit
    // external clients, so the gate answers.
    assert_eq!(response.response_code(), ResponseCode::NXDomain);
}

#[tokio::test]
async fn test_second_query_is_served_from_cache_with_new_id() {
    let handler = handler(SYNTH_ZONE);

    let first = ask(
        &handler,
        &request(0x0001, "foo.bench.local.", RecordType::AAAA),
        OVERLAY_CLIENT,
    )
    .await;
    let second = ask(
        &handler,
        &request(0x0002, "foo.bench.local.", RecordType::AAAA),
        OVERLAY_CLIENT,
    )
    .await;

    assert_eq!(second.id(), 0x0002);
    assert_eq!(second.answers(), first.answers());

    let metrics = handler.metrics();
    let runtime = handler.snapshot();
    let stats = metrics.snapshot(&runtime.caches);
    assert_eq!(stats.zones["z1"].cache_hits, 1);

    runtime.stop_caches();
}

#[tokio::test]
async fn test_cache_hit_feeds_the_memory_monitor_without_failing_responses() {
    let monitor = MemoryMonitor::new(MemoryLimits {
        max_zone_count: 10,
        max_total_bytes: 1 << 20,
        // A budget no response fits under: the reading is rejected,
        // the response still goes out.
        max_cache_bytes_per_zone: 1,
    });
    monitor.register_zone("z1").unwrap();

    let config = Config::parse_str(SYNTH_ZONE).unwrap();
    let runtime = ZoneRuntime::build(config, None).unwrap();
    let handler = QueryHandler::new(runtime, options(), Arc::new(Metrics::new()))
        .with_memory_monitor(monitor.clone());

    let first = ask(
        &handler,
        &request(0x0011, "foo.bench.local.", RecordType::AAAA),
        OVERLAY_CLIENT,
    )
    .await;
    let second = ask(
        &handler,
        &request(0x0012, "foo.bench.local.", RecordType::AAAA),
        OVERLAY_CLIENT,
    )
    .await;

    assert_eq!(first.answers(), second.answers());
    assert_eq!(second.response_code(), ResponseCode::NoError);

    // The hit tried to record usage, the budget rejected it, and the
    // violation was counted instead of surfacing to the client.
    assert_eq!(monitor.zone_usage("z1"), Some(0));
    assert_eq!(monitor.zone_violations("z1"), 1);

    handler.snapshot().stop_caches();
}

#[tokio::test]
async fn test_other_types_on_synthesis_zone_fall_through_to_forwarding() {
    let upstream = MockDnsServer::start(Ipv4Addr::new(198, 51, 100, 9)).await.unwrap();

    let handler = handler(&format!(
        r#"{{
            "zones": {{
                "z1": {{
                    "domains": ["*.bench.local"],
                    "backend": {{ "dnsServers": ["{}"], "timeout": "1s", "retries": 1 }},
                    "reflectedDomain": "203.0.113.7",
                    "translateid": 42,
                }},
            }},
        }}"#,
        upstream.endpoint()
    ));

    let response = ask(
        &handler,
        &request(0x5678, "foo.bench.local.", RecordType::TXT),
        OVERLAY_CLIENT,
    )
    .await;

    // The upstream mock answered, so the query was forwarded rather
    // than answered synthetically.
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert_eq!(upstream.queries(), vec!["foo.bench.local.".to_string()]);
    assert!(!response.authoritative());
}

#[tokio::test]
async fn test_zone_admitting_external_clients_forwards_for_them() {
    let upstream = MockDnsServer::start(Ipv4Addr::new(198, 51, 100, 7)).await.unwrap();

    let handler = handler(&format!(
        r#"{{
            "zones": {{
                "open": {{
                    "domains": ["*.open.example"],
                    "backend": {{ "dnsServers": ["{}"], "timeout": "1s", "retries": 1 }},
                    "allowExternalClients": true,
                }},
            }},
        }}"#,
        upstream.endpoint()
    ));

    let response = ask(
        &handler,
        &request(0x6789, "host.open.example.", RecordType::A),
        EXTERNAL_CLIENT,
    )
    .await;

    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert!(!response.answers().is_empty());
}

#[tokio::test]
async fn test_overlay_system_names_resolve_from_host_table() {
    let overlay = Arc::new(
        MockOverlay::new("mesh.internal")
            .with_host("web.mesh.internal", IpAddr::V4(Ipv4Addr::new(100, 100, 50, 5))),
    );
    let handler = handler(SYNTH_ZONE).with_overlay(overlay);

    let response = ask(
        &handler,
        &request(0x789a, "web.mesh.internal.", RecordType::A),
        OVERLAY_CLIENT,
    )
    .await;

    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert!(response.authoritative());
    assert_eq!(response.answers().len(), 1);
    match response.answers()[0].data() {
        Some(RData::A(a)) => assert_eq!(a.0, Ipv4Addr::new(100, 100, 50, 5)),
        other => panic!("expected A answer, got {other:?}"),
    }

    let missing = ask(
        &handler,
        &request(0x789b, "gone.mesh.internal.", RecordType::A),
        OVERLAY_CLIENT,
    )
    .await;
    assert_eq!(missing.response_code(), ResponseCode::NXDomain);
}

#[tokio::test]
async fn test_undersized_datagrams_are_dropped() {
    let handler = handler(SYNTH_ZONE);

    assert!(handler.handle(&[0u8; 5], OVERLAY_CLIENT).await.is_none());
}

#[tokio::test]
async fn test_garbage_with_a_header_gets_formerr_with_echoed_id() {
    let handler = handler(SYNTH_ZONE);

    let mut garbage = vec![0u8; 20];
    garbage[0] = 0xde;
    garbage[1] = 0xad;
    // A header claiming questions that are not there.
    garbage[4] = 0x00;
    garbage[5] = 0x07;

    if let Some(payload) = handler.handle(&garbage, OVERLAY_CLIENT).await {
        let response = Message::from_vec(&payload).unwrap();
        assert_eq!(response.id(), 0xdead);
        assert_eq!(response.response_code(), ResponseCode::FormErr);
    }
}

#[tokio::test]
async fn test_request_without_questions_gets_formerr() {
    let handler = handler(SYNTH_ZONE);

    let mut empty = Message::new();
    empty.set_id(0xbeef);
    let payload = empty.to_vec().unwrap();

    let response = Message::from_vec(&handler.handle(&payload, OVERLAY_CLIENT).await.unwrap()).unwrap();
    assert_eq!(response.id(), 0xbeef);
    assert_eq!(response.response_code(), ResponseCode::FormErr);
}
