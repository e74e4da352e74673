//! Client-IP resolution with trusted-proxy gating.
//!
//! Forwarding headers are attacker-controlled input: honoring
//! `X-Forwarded-For` from an arbitrary peer lets a client mint a fresh
//! rate-limit key per request. Headers are therefore consulted only
//! when the transport peer itself sits inside a configured trusted
//! prefix; everyone else is keyed by the address they actually
//! connected from.

use crate::error::ExtractError;
use http::{HeaderMap, HeaderName};
use ipnet::IpNet;
use std::net::{IpAddr, SocketAddr};

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
static X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// The transport peer of a request, inserted as a request extension by
/// the server (the `ConnectInfo` convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// Resolves the originating client IP for a request.
pub trait ClientIpExtractor: Send + Sync {
    fn client_ip(
        &self,
        peer: Option<SocketAddr>,
        headers: &HeaderMap,
    ) -> Result<IpAddr, ExtractError>;
}

/// Returns the transport peer and never consults headers. The default,
/// secure choice when no reverse proxy fronts the service.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectIpExtractor;

impl ClientIpExtractor for DirectIpExtractor {
    fn client_ip(
        &self,
        peer: Option<SocketAddr>,
        _headers: &HeaderMap,
    ) -> Result<IpAddr, ExtractError> {
        peer.map(|addr| addr.ip())
            .ok_or(ExtractError::MissingPeerAddr)
    }
}

/// Honors forwarding headers only from peers inside trusted prefixes.
///
/// An untrusted peer can never influence the extracted key: its
/// forwarding headers are ignored (with a warning, since their presence
/// is a spoofing signal) and the transport address is used.
#[derive(Debug, Clone)]
pub struct TrustedProxyIpExtractor {
    trusted: Vec<IpNet>,
}

impl TrustedProxyIpExtractor {
    /// Fails closed: enabling trusted-proxy mode with no prefixes would
    /// silently never trust anything, so it is a construction error.
    pub fn new(trusted: Vec<IpNet>) -> Result<Self, ExtractError> {
        if trusted.is_empty() {
            return Err(ExtractError::NoTrustedProxies);
        }
        Ok(Self { trusted })
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.trusted.iter().any(|net| net.contains(&ip))
    }
}

impl ClientIpExtractor for TrustedProxyIpExtractor {
    fn client_ip(
        &self,
        peer: Option<SocketAddr>,
        headers: &HeaderMap,
    ) -> Result<IpAddr, ExtractError> {
        let peer = peer.ok_or(ExtractError::MissingPeerAddr)?;
        let peer_ip = peer.ip();

        if !self.is_trusted(peer_ip) {
            if headers.contains_key(&X_FORWARDED_FOR) || headers.contains_key(&X_REAL_IP) {
                tracing::warn!(
                    peer = %peer_ip,
                    "forwarding headers from untrusted peer ignored; possible spoof attempt"
                );
            }
            return Ok(peer_ip);
        }

        if let Some(forwarded) = headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            // Leftmost valid entry is the original client.
            for entry in forwarded.split(',') {
                if let Ok(ip) = entry.trim().parse::<IpAddr>() {
                    return Ok(ip);
                }
            }
        }

        if let Some(real_ip) = headers
            .get(&X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(real_ip);
        }

        Ok(peer_ip)
    }
}
