//! The basic denial sequence: statuses, headers, and the 429 body.

use super::test_utils::{json_body, ok_service, req_from};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};
use tower_edgeguard_core::{Clock, ManualClock};
use tower_edgeguard_ratelimit::{IpRateLimitConfig, MemoryStore};

#[tokio::test]
async fn four_requests_against_limit_three() {
    let clock = Arc::new(ManualClock::at_epoch_secs(1_000));
    let layer = IpRateLimitConfig::builder()
        .limit(3)
        .window(Duration::from_secs(60))
        .store(Arc::new(MemoryStore::new(1_000)))
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .build();
    let mut service = layer.layer(ok_service());

    let mut statuses = Vec::new();
    let mut remaining = Vec::new();
    let mut last = None;
    for i in 0..4 {
        let response = service
            .ready()
            .await
            .unwrap()
            .call(req_from("192.168.1.1:9000", "/data"))
            .await
            .unwrap();
        statuses.push(response.status().as_u16());
        remaining.push(
            response.headers()["x-ratelimit-remaining"]
                .to_str()
                .unwrap()
                .to_string(),
        );
        last = Some(response);
        if i < 3 {
            clock.advance(Duration::from_secs(1));
        }
    }

    assert_eq!(statuses, vec![200, 200, 200, 429]);
    assert_eq!(remaining, vec!["2", "1", "0", "0"]);

    // Events landed at t=1000..1002; the denial at t=1003 must point at
    // the t=1000 event aging out.
    let denied = last.unwrap();
    assert_eq!(denied.headers()["retry-after"], "57");
    assert_eq!(denied.headers()["x-ratelimit-reset"], "1060");
    assert_eq!(denied.headers()["x-ratelimit-limit"], "3");
    assert_eq!(denied.headers()["x-ratelimit-type"], "ip");
    assert_eq!(denied.headers()["content-type"], "application/json");

    let body = json_body(&denied);
    assert_eq!(body["error"], "rate_limit_exceeded");
    assert_eq!(body["retry_after"], 57);
    assert_eq!(body["limit"], 3);
    assert_eq!(body["window"], "60s");
    assert!(body["message"].as_str().unwrap().contains("rate limit"));
}

#[tokio::test]
async fn headers_appear_on_allowed_responses_too() {
    let layer = IpRateLimitConfig::builder()
        .limit(10)
        .window(Duration::from_secs(60))
        .store(Arc::new(MemoryStore::new(100)))
        .build();
    let mut service = layer.layer(ok_service());

    let response = service
        .ready()
        .await
        .unwrap()
        .call(req_from("192.168.1.1:9000", "/data"))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-ratelimit-limit"], "10");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "9");
    assert!(response.headers().contains_key("x-ratelimit-reset"));
    assert!(!response.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn window_slides_open_again() {
    let clock = Arc::new(ManualClock::at_epoch_secs(5_000));
    let layer = IpRateLimitConfig::builder()
        .limit(2)
        .window(Duration::from_secs(30))
        .store(Arc::new(MemoryStore::new(100)))
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .build();
    let mut service = layer.layer(ok_service());

    for _ in 0..2 {
        let response = service
            .ready()
            .await
            .unwrap()
            .call(req_from("10.0.0.1:1", "/x"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }
    let denied = service
        .ready()
        .await
        .unwrap()
        .call(req_from("10.0.0.1:1", "/x"))
        .await
        .unwrap();
    assert_eq!(denied.status(), 429);

    clock.advance(Duration::from_secs(31));
    let recovered = service
        .ready()
        .await
        .unwrap()
        .call(req_from("10.0.0.1:1", "/x"))
        .await
        .unwrap();
    assert_eq!(recovered.status(), 200);
    assert_eq!(recovered.headers()["x-ratelimit-remaining"], "1");
}
