//! Properties of longest-prefix CSP selection, observed through the
//! middleware.

use http::{Request, Response};
use proptest::prelude::*;
use std::convert::Infallible;
use tokio::runtime::Runtime;
use tower::{service_fn, Layer, Service, ServiceExt};
use tower_edgeguard_csp::{CspConfig, CspDirectives};

fn ok_service(
) -> impl Service<Request<String>, Response = Response<String>, Error = Infallible, Future: Send> + Clone {
    service_fn(|_req: Request<String>| async { Ok(Response::new(String::new())) })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// When a path sits under two nested prefixes, the longer prefix's
    /// policy is selected; outside both, the default applies.
    #[test]
    fn longest_prefix_always_wins(
        outer in "[a-z]{1,6}",
        inner in "[a-z]{1,6}",
        tail in "[a-z]{0,8}",
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let outer_prefix = format!("/{outer}/");
            let inner_prefix = format!("/{outer}/{inner}/");

            let layer = CspConfig::builder()
                .default_policy(CspDirectives::new().directive("default-src", ["'self'"]))
                .path_policy(
                    outer_prefix.clone(),
                    CspDirectives::new().directive("default-src", ["'none'"]),
                )
                .path_policy(
                    inner_prefix.clone(),
                    CspDirectives::new().directive("img-src", ["'self'"]),
                )
                .build();
            let mut service = layer.layer(ok_service());

            // Under the inner prefix: the inner policy.
            let req = Request::builder()
                .uri(format!("{inner_prefix}{tail}"))
                .body(String::new())
                .unwrap();
            let response = service.ready().await.unwrap().call(req).await.unwrap();
            prop_assert_eq!(
                response.headers()["content-security-policy"].to_str().unwrap(),
                "img-src 'self'"
            );

            // Directly under the outer prefix: the outer policy.
            let req = Request::builder()
                .uri(format!("{outer_prefix}zz-{tail}"))
                .body(String::new())
                .unwrap();
            let response = service.ready().await.unwrap().call(req).await.unwrap();
            prop_assert_eq!(
                response.headers()["content-security-policy"].to_str().unwrap(),
                "default-src 'none'"
            );

            // Anywhere else: the default.
            let req = Request::builder()
                .uri("/elsewhere")
                .body(String::new())
                .unwrap();
            let response = service.ready().await.unwrap().call(req).await.unwrap();
            prop_assert_eq!(
                response.headers()["content-security-policy"].to_str().unwrap(),
                "default-src 'self'"
            );

            Ok(())
        })?;
    }
}
