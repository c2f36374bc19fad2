mod helpers;

use std::net::Ipv4Addr;
use std::time::Duration;

use helpers::dns_server_mock::MockDnsServer;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use prismdns_domain::BackendConfig;
use prismdns_infrastructure::dns::{CacheKey, Forwarder, ZoneCache};

fn request(name: &str, qtype: RecordType) -> Message {
    let mut message = Message::new();
    message.set_id(0x77aa);
    message.set_recursion_desired(true);
    message.add_query(hickory_proto::op::Query::query(
        Name::from_utf8(name).unwrap(),
        qtype,
    ));
    message
}

fn backend(servers: Vec<String>) -> BackendConfig {
    BackendConfig {
        dns_servers: servers,
        timeout: Some(Duration::from_millis(500)),
        retries: Some(1),
    }
}

#[tokio::test]
async fn test_failover_to_second_endpoint() {
    let upstream = MockDnsServer::start(Ipv4Addr::new(93, 184, 216, 34)).await.unwrap();

    // First endpoint is a dead port; the second answers.
    let forwarder = Forwarder::new(&backend(vec![
        "127.0.0.1:1".to_string(),
        upstream.endpoint(),
    ]));

    let response = forwarder.forward(&request("example.com.", RecordType::A), None).await;

    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert_eq!(response.id(), 0x77aa);
    assert!(!response.answers().is_empty());
}

#[tokio::test]
async fn test_all_endpoints_failing_returns_servfail() {
    let forwarder = Forwarder::new(&backend(vec![
        "127.0.0.1:1".to_string(),
        "127.0.0.1:2".to_string(),
    ]));

    let request = request("example.com.", RecordType::A);
    let response = forwarder.forward(&request, None).await;

    assert_eq!(response.response_code(), ResponseCode::ServFail);
    assert_eq!(response.id(), request.id());
    assert_eq!(response.queries(), request.queries());
    assert!(response.answers().is_empty());
}

#[tokio::test]
async fn test_successful_forward_fills_the_zone_cache() {
    let upstream = MockDnsServer::start(Ipv4Addr::new(10, 9, 8, 7)).await.unwrap();
    let cache = ZoneCache::new("z", 16, Duration::from_secs(60));

    let forwarder = Forwarder::new(&backend(vec![upstream.endpoint()]));
    let response = forwarder
        .forward(&request("cached.example.", RecordType::A), Some(&cache))
        .await;

    assert_eq!(response.response_code(), ResponseCode::NoError);

    let key = CacheKey::new("cached.example.", RecordType::A, None);
    let hit = cache.get(&key).expect("response stored under the request's question");
    assert_eq!(hit, response);

    cache.stop();
}

#[tokio::test]
async fn test_failed_forward_does_not_fill_the_cache() {
    let cache = ZoneCache::new("z", 16, Duration::from_secs(60));
    let forwarder = Forwarder::new(&backend(vec!["127.0.0.1:1".to_string()]));

    let response = forwarder
        .forward(&request("missing.example.", RecordType::A), Some(&cache))
        .await;

    assert_eq!(response.response_code(), ResponseCode::ServFail);
    assert!(cache.is_empty());

    cache.stop();
}
