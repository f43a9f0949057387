use std::net::SocketAddr;

use http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Key used when neither a forwarded address nor a peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Work out which bucket a request belongs to.
///
/// With `trust_forwarded_for`, the first comma-separated entry of
/// `X-Forwarded-For` wins. That header is client-controlled, so this is only
/// as trustworthy as the proxy in front of the service. Otherwise, or when
/// the header is missing or blank, the peer IP is used.
pub fn resolve_client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(client) = forwarded {
            return client.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.5:41234".parse().unwrap())
    }

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, value.parse().unwrap());
        headers
    }

    #[test]
    fn first_forwarded_entry_wins() {
        let headers = forwarded("9.9.9.9, 10.0.0.1");
        assert_eq!(resolve_client_identity(&headers, peer(), true), "9.9.9.9");
    }

    #[test]
    fn falls_back_to_peer_ip() {
        assert_eq!(resolve_client_identity(&HeaderMap::new(), peer(), true), "10.0.0.5");
        assert_eq!(resolve_client_identity(&forwarded(" , 1.1.1.1"), peer(), true), "10.0.0.5");
    }

    #[test]
    fn untrusted_header_is_ignored() {
        let headers = forwarded("9.9.9.9");
        assert_eq!(resolve_client_identity(&headers, peer(), false), "10.0.0.5");
    }

    #[test]
    fn no_peer_is_unknown() {
        assert_eq!(resolve_client_identity(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
    }
}
