//! Admission under contention: the TOCTOU defense observable from the
//! outside.

use super::test_utils::{ok_service, req_from};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};
use tower_edgeguard_ratelimit::{IpRateLimitConfig, MemoryStore, RateLimitStore};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exactly_min_of_n_and_limit_is_allowed() {
    let layer = IpRateLimitConfig::builder()
        .limit(5)
        .window(Duration::from_secs(60))
        .store(Arc::new(MemoryStore::new(1_000)) as Arc<dyn RateLimitStore>)
        .build();
    let service = layer.layer(ok_service());

    let tasks = (0..20).map(|_| {
        let mut service = service.clone();
        tokio::spawn(async move {
            let req = req_from("172.16.0.9:1234", "/burst");
            service
                .ready()
                .await
                .unwrap()
                .call(req)
                .await
                .unwrap()
                .status()
                .as_u16()
        })
    });

    let mut allowed = 0;
    let mut denied = 0;
    for task in tasks {
        match task.await.unwrap() {
            200 => allowed += 1,
            429 => denied += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    // Callers must never observe an over-limit count.
    assert_eq!(allowed, 5);
    assert_eq!(denied, 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contention_on_one_key_leaves_other_keys_alone() {
    let layer = IpRateLimitConfig::builder()
        .limit(5)
        .window(Duration::from_secs(60))
        .store(Arc::new(MemoryStore::new(1_000)) as Arc<dyn RateLimitStore>)
        .build();
    let service = layer.layer(ok_service());

    let tasks: Vec<_> = (0..30)
        .map(|i| {
            let mut service = service.clone();
            let addr = if i % 2 == 0 {
                "10.1.0.1:5000"
            } else {
                "10.1.0.2:5000"
            };
            tokio::spawn(async move {
                let req = req_from(addr, "/burst");
                (
                    addr,
                    service
                        .ready()
                        .await
                        .unwrap()
                        .call(req)
                        .await
                        .unwrap()
                        .status()
                        .as_u16(),
                )
            })
        })
        .collect();

    let mut allowed_per_key = std::collections::HashMap::new();
    for task in tasks {
        let (addr, status) = task.await.unwrap();
        if status == 200 {
            *allowed_per_key.entry(addr).or_insert(0usize) += 1;
        }
    }

    assert_eq!(allowed_per_key["10.1.0.1:5000"], 5);
    assert_eq!(allowed_per_key["10.1.0.2:5000"], 5);
}
