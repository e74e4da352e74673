#![allow(dead_code)]

use http::{Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use tower::service_fn;
use tower::Service;
use tower_edgeguard_ratelimit::PeerAddr;

pub fn ok_service(
) -> impl Service<Request<String>, Response = Response<String>, Error = Infallible, Future: Send> + Clone {
    service_fn(|_req: Request<String>| async { Ok(Response::new("handled".to_string())) })
}

pub fn req_from(addr: &str, path: &str) -> Request<String> {
    let peer: SocketAddr = addr.parse().expect("socket addr");
    let mut req = Request::builder()
        .uri(path)
        .body(String::new())
        .expect("request");
    req.extensions_mut().insert(PeerAddr(peer));
    req
}

pub fn req_with_header(addr: &str, path: &str, name: &'static str, value: &str) -> Request<String> {
    let mut req = req_from(addr, path);
    req.headers_mut()
        .insert(name, value.parse().expect("header value"));
    req
}

pub fn json_body(response: &Response<String>) -> serde_json::Value {
    serde_json::from_str(response.body()).expect("json body")
}
