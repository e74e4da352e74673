//! Trusted-proxy gating: spoofing defeat and correct attribution.

use super::test_utils::{ok_service, req_from, req_with_header};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tower::{Layer, Service, ServiceExt};
use tower_edgeguard_ratelimit::{
    ClientIpExtractor, IpRateLimitConfig, MemoryStore, RateLimitStore, TrustedProxyIpExtractor,
};

fn proxy_layer(store: Arc<MemoryStore>) -> tower_edgeguard_ratelimit::IpRateLimitLayer {
    let extractor =
        TrustedProxyIpExtractor::new(vec!["10.0.0.0/8".parse().unwrap()]).unwrap();
    IpRateLimitConfig::builder()
        .limit(3)
        .window(Duration::from_secs(60))
        .store(store as Arc<dyn RateLimitStore>)
        .extractor(Arc::new(extractor) as Arc<dyn ClientIpExtractor>)
        .build()
}

#[tokio::test]
async fn spoofed_forwarded_for_cannot_reset_the_key() {
    let store = Arc::new(MemoryStore::new(1_000));
    let mut service = proxy_layer(Arc::clone(&store)).layer(ok_service());

    // An untrusted peer rotates X-Forwarded-For on every request; all
    // five must be accounted to the peer itself.
    let mut statuses = Vec::new();
    for i in 0..5 {
        let req = req_with_header(
            "203.0.113.50:4000",
            "/login",
            "x-forwarded-for",
            &format!("10.9.8.{i}"),
        );
        let response = service.ready().await.unwrap().call(req).await.unwrap();
        statuses.push(response.status().as_u16());
    }

    assert_eq!(statuses, vec![200, 200, 200, 429, 429]);
    assert_eq!(store.request_count("203.0.113.50", UNIX_EPOCH).unwrap(), 3);
}

#[tokio::test]
async fn trusted_proxy_requests_attribute_to_the_forwarded_client() {
    let store = Arc::new(MemoryStore::new(1_000));
    let mut service = proxy_layer(Arc::clone(&store)).layer(ok_service());

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let req = req_with_header("10.0.0.5:4000", "/login", "x-forwarded-for", "203.0.113.1");
        let response = service.ready().await.unwrap().call(req).await.unwrap();
        statuses.push(response.status().as_u16());
    }

    assert_eq!(statuses, vec![200, 200, 200, 429, 429]);
    // Only allowed requests are recorded, all under the forwarded IP.
    assert_eq!(store.request_count("203.0.113.1", UNIX_EPOCH).unwrap(), 3);
    assert_eq!(store.request_count("10.0.0.5", UNIX_EPOCH).unwrap(), 0);
}

#[tokio::test]
async fn x_real_ip_attributes_when_forwarded_for_is_absent() {
    let store = Arc::new(MemoryStore::new(1_000));
    let mut service = proxy_layer(Arc::clone(&store)).layer(ok_service());

    let req = req_with_header("10.0.0.5:4000", "/login", "x-real-ip", "198.51.100.9");
    let response = service.ready().await.unwrap().call(req).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(store.request_count("198.51.100.9", UNIX_EPOCH).unwrap(), 1);
}

#[tokio::test]
async fn direct_extraction_never_reads_headers() {
    let store = Arc::new(MemoryStore::new(1_000));
    let layer = IpRateLimitConfig::builder()
        .limit(3)
        .store(Arc::clone(&store) as Arc<dyn RateLimitStore>)
        .build();
    let mut service = layer.layer(ok_service());

    let req = req_with_header("203.0.113.50:4000", "/x", "x-forwarded-for", "10.9.8.7");
    service.ready().await.unwrap().call(req).await.unwrap();
    assert_eq!(store.request_count("203.0.113.50", UNIX_EPOCH).unwrap(), 1);
    assert_eq!(store.request_count("10.9.8.7", UNIX_EPOCH).unwrap(), 0);

    // Plain requests key by peer as well.
    let req = req_from("203.0.113.50:4000", "/x");
    service.ready().await.unwrap().call(req).await.unwrap();
    assert_eq!(store.request_count("203.0.113.50", UNIX_EPOCH).unwrap(), 2);
}
