use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::state::AppState;

const UNKNOWN_CLIENT: &str = "unknown";

/// Identifier the rate limiter counts requests against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl FromRequestParts<Arc<AppState>> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(client_key(&parts.headers, peer, state.trust_proxy))
    }
}

/// Forwarded headers are caller-controlled, so they only count behind a trusted proxy.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> ClientKey {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded.or(real_ip) {
            return ClientKey(ip.to_string());
        }
    }

    ClientKey(
        peer.map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn peer_address_is_used_by_default() {
        let peer: SocketAddr = "10.0.0.7:51234".parse().unwrap();
        let h = headers(&[("x-forwarded-for", "1.1.1.1")]);
        assert_eq!(client_key(&h, Some(peer), false), ClientKey("10.0.0.7".into()));
    }

    #[test]
    fn first_forwarded_entry_wins_behind_proxy() {
        let peer: SocketAddr = "10.0.0.7:51234".parse().unwrap();
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.9 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_key(&h, Some(peer), true), ClientKey("203.0.113.9".into()));

        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_key(&h, Some(peer), true), ClientKey("198.51.100.2".into()));

        assert_eq!(client_key(&HeaderMap::new(), Some(peer), true), ClientKey("10.0.0.7".into()));
    }

    #[test]
    fn missing_everything_is_unknown() {
        assert_eq!(client_key(&HeaderMap::new(), None, false), ClientKey("unknown".into()));
    }
}
