//! The fail-open contract: a broken store must never block traffic.

use http::{Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tower::{service_fn, Layer, Service, ServiceExt};
use tower_edgeguard_breaker::CircuitBreaker;
use tower_edgeguard_ratelimit::{
    CheckAndAdd, IpRateLimitConfig, PeerAddr, RateLimitStore, StoreError,
};

/// A backend that is down, counting how often anyone asks.
struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self) -> StoreError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StoreError::Backend("connection refused".to_string())
    }
}

impl RateLimitStore for FailingStore {
    fn add_request(&self, _key: &str, _timestamp: SystemTime) -> Result<(), StoreError> {
        Err(self.fail())
    }

    fn request_count(&self, _key: &str, _cutoff: SystemTime) -> Result<usize, StoreError> {
        Err(self.fail())
    }

    fn check_and_add(
        &self,
        _key: &str,
        _timestamp: SystemTime,
        _cutoff: SystemTime,
        _limit: usize,
    ) -> Result<CheckAndAdd, StoreError> {
        Err(self.fail())
    }

    fn cleanup(&self, _cutoff: SystemTime) -> Result<usize, StoreError> {
        Err(self.fail())
    }

    fn key_count(&self) -> usize {
        0
    }

    fn memory_usage(&self) -> usize {
        0
    }
}

fn ok_service(
) -> impl Service<Request<String>, Response = Response<String>, Error = Infallible, Future: Send> + Clone {
    service_fn(|_req: Request<String>| async { Ok(Response::new("handled".to_string())) })
}

fn req() -> Request<String> {
    let peer: SocketAddr = "192.0.2.1:443".parse().unwrap();
    let mut req = Request::builder().uri("/x").body(String::new()).unwrap();
    req.extensions_mut().insert(PeerAddr(peer));
    req
}

#[tokio::test]
async fn one_store_failure_opens_the_circuit_and_requests_keep_flowing() {
    let store = Arc::new(FailingStore::new());
    let breaker = Arc::new(
        CircuitBreaker::builder()
            .failure_threshold(1)
            .recovery_timeout(Duration::from_secs(3_600))
            .name("fail-open-test")
            .build(),
    );
    let layer = IpRateLimitConfig::builder()
        .limit(1)
        .store(Arc::clone(&store) as Arc<dyn RateLimitStore>)
        .circuit_breaker(Arc::clone(&breaker))
        .build();
    let mut service = layer.layer(ok_service());

    // The first request hits the store, which fails; the request still
    // passes and the breaker opens.
    let response = service.ready().await.unwrap().call(req()).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(!response.headers().contains_key("x-ratelimit-limit"));
    assert_eq!(store.calls(), 1);
    assert!(breaker.is_open());

    // The next five checks bypass the store entirely.
    for _ in 0..5 {
        let response = service.ready().await.unwrap().call(req()).await.unwrap();
        assert_eq!(response.status(), 200);
    }
    assert_eq!(store.calls(), 1);
    assert!(breaker.allow());
}

#[tokio::test]
async fn below_threshold_failures_keep_probing_the_store() {
    let store = Arc::new(FailingStore::new());
    let breaker = Arc::new(
        CircuitBreaker::builder()
            .failure_threshold(3)
            .recovery_timeout(Duration::from_secs(3_600))
            .build(),
    );
    let layer = IpRateLimitConfig::builder()
        .limit(1)
        .store(Arc::clone(&store) as Arc<dyn RateLimitStore>)
        .circuit_breaker(Arc::clone(&breaker))
        .build();
    let mut service = layer.layer(ok_service());

    for expected_calls in 1..=3 {
        let response = service.ready().await.unwrap().call(req()).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(store.calls(), expected_calls);
    }
    assert!(breaker.is_open());

    // Threshold reached: the store is left alone now.
    let response = service.ready().await.unwrap().call(req()).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(store.calls(), 3);
}
