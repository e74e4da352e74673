//! Longest-prefix policy routing, end to end.

use http::{Request, Response};
use std::convert::Infallible;
use tower::{service_fn, Layer, Service, ServiceExt};
use tower_edgeguard_csp::{CspConfig, CspDirectives, CspLayer};

fn ok_service(
) -> impl Service<Request<String>, Response = Response<String>, Error = Infallible, Future: Send> + Clone {
    service_fn(|_req: Request<String>| async { Ok(Response::new(String::new())) })
}

async fn get(layer: &CspLayer, path: &str) -> Response<String> {
    let mut service = layer.layer(ok_service());
    let req = Request::builder().uri(path).body(String::new()).unwrap();
    service.ready().await.unwrap().call(req).await.unwrap()
}

fn api_layer() -> CspLayer {
    CspConfig::builder()
        .default_policy(CspDirectives::strict())
        .path_policy(
            "/api/",
            CspDirectives::new().directive("default-src", ["'none'"]),
        )
        .path_policy(
            "/api/v1/",
            CspDirectives::new()
                .directive("default-src", ["'self'"])
                .directive("connect-src", ["'self'", "https://api.example"]),
        )
        .build()
}

#[tokio::test]
async fn the_longest_matching_prefix_wins() {
    let layer = api_layer();

    let response = get(&layer, "/api/v1/users").await;
    assert_eq!(
        response.headers()["content-security-policy"],
        "connect-src 'self' https://api.example; default-src 'self'"
    );
}

#[tokio::test]
async fn shorter_prefix_covers_its_own_subtree() {
    let layer = api_layer();

    let response = get(&layer, "/api/health").await;
    assert_eq!(
        response.headers()["content-security-policy"],
        "default-src 'none'"
    );
}

#[tokio::test]
async fn unmatched_paths_get_the_default() {
    let layer = api_layer();

    let response = get(&layer, "/dashboard").await;
    let value = response.headers()["content-security-policy"]
        .to_str()
        .unwrap();
    assert!(value.contains("default-src 'self'"));
    assert!(value.contains("frame-ancestors 'none'"));
}

#[tokio::test]
async fn report_only_mode_never_emits_both_headers() {
    let layer = CspConfig::builder()
        .default_policy(CspDirectives::strict())
        .report_only(true)
        .build();

    let response = get(&layer, "/x").await;
    assert!(response
        .headers()
        .contains_key("content-security-policy-report-only"));
    assert!(!response.headers().contains_key("content-security-policy"));
}

#[tokio::test]
async fn empty_policy_for_a_prefix_suppresses_the_header() {
    let layer = CspConfig::builder()
        .default_policy(CspDirectives::strict())
        .path_policy("/public/", CspDirectives::new())
        .build();

    let response = get(&layer, "/public/logo.png").await;
    assert!(!response.headers().contains_key("content-security-policy"));

    let response = get(&layer, "/private").await;
    assert!(response.headers().contains_key("content-security-policy"));
}
