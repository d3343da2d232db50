//! Resolves the client IP the Rate Governor keys on (spec.md §4.9):
//! the direct TCP peer, unless that peer is in `TrustedProxyIps`, in which
//! case the leftmost `X-Forwarded-For` entry is honored instead.

use std::net::IpAddr;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;

pub fn resolve(
    headers: &HeaderMap,
    ConnectInfo(peer): &ConnectInfo<std::net::SocketAddr>,
    trusted_proxy_ips: &[String],
) -> IpAddr {
    let peer_ip = peer.ip();
    let peer_is_trusted = trusted_proxy_ips
        .iter()
        .any(|ip| ip.parse::<IpAddr>().map(|t| t == peer_ip).unwrap_or(false));

    if !peer_is_trusted {
        return peer_ip;
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .and_then(|s| s.parse::<IpAddr>().ok())
        .unwrap_or(peer_ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect_info(ip: &str) -> ConnectInfo<std::net::SocketAddr> {
        ConnectInfo(format!("{ip}:1234").parse().unwrap())
    }

    #[test]
    fn untrusted_peer_is_used_directly_even_with_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.9".parse().unwrap());
        let peer = connect_info("203.0.113.5");
        let ip = resolve(&headers, &peer, &[]);
        assert_eq!(ip, "203.0.113.5".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn trusted_proxy_forwarded_header_is_honored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.9, 10.0.0.1".parse().unwrap());
        let peer = connect_info("203.0.113.5");
        let ip = resolve(&headers, &peer, &["203.0.113.5".to_string()]);
        assert_eq!(ip, "10.0.0.9".parse::<IpAddr>().unwrap());
    }
}
