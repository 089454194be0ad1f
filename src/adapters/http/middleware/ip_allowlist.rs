//! IP allowlist middleware for the gateway webhook.
//!
//! By default the socket peer is the client address. Behind a reverse proxy
//! that overwrites `X-Forwarded-For`, enable header trust and the first
//! `X-Forwarded-For` entry, then `X-Real-IP`, take precedence. Any caller can
//! set those headers, so trusting them without such a proxy turns the list
//! into a hint; the webhook signature stays the authentication boundary.
//! An empty allowlist admits everyone.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::post, middleware};
//! use std::sync::Arc;
//!
//! let allowlist = Arc::new(
//!     IpAllowlist::new(config.gateway.webhook_allowed_ips.clone())
//!         .trust_forwarded_headers(config.gateway.webhook_trust_forwarded),
//! );
//!
//! let app = Router::new()
//!     .route("/integrations/asaas/webhook", post(handler))
//!     .route_layer(middleware::from_fn_with_state(allowlist, ip_allowlist_middleware));
//! ```

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Middleware state.
pub type IpAllowlistState = Arc<IpAllowlist>;

/// Addresses allowed to call a route.
#[derive(Debug, Clone, Default)]
pub struct IpAllowlist {
    allowed: Vec<IpAddr>,
    trust_forwarded: bool,
}

impl IpAllowlist {
    pub fn new(allowed: Vec<IpAddr>) -> Self {
        Self {
            allowed,
            trust_forwarded: false,
        }
    }

    /// Take the client address from proxy headers instead of the peer.
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }

    /// The address checked against the list.
    pub fn source_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
        if self.trust_forwarded {
            client_ip(headers, peer)
        } else {
            peer.map(|addr| addr.ip())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Whether `ip` may pass. Unknown addresses only pass an empty list.
    pub fn admits(&self, ip: Option<IpAddr>) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        match ip {
            Some(ip) => self.allowed.iter().any(|allowed| same_address(*allowed, ip)),
            None => false,
        }
    }
}

/// Compares addresses, treating IPv4-mapped IPv6 as the IPv4 address.
fn same_address(a: IpAddr, b: IpAddr) -> bool {
    canonical(a) == canonical(b)
}

fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

/// Resolves the calling client's address from proxy headers, then the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());
    if forwarded.is_some() {
        return forwarded;
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if real_ip.is_some() {
        return real_ip;
    }

    peer.map(|addr| addr.ip())
}

/// Rejects requests from addresses outside the allowlist with 403.
pub async fn ip_allowlist_middleware(
    State(allowlist): State<IpAllowlistState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    if allowlist.is_empty() {
        return next.run(request).await;
    }

    let ip = allowlist.source_ip(request.headers(), connect_info.map(|ConnectInfo(addr)| addr));
    if !allowlist.admits(ip) {
        tracing::warn!(
            client_ip = ?ip,
            path = %request.uri().path(),
            "Request rejected by IP allowlist"
        );
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "code": "FORBIDDEN",
                "message": "Source address is not allowed",
            })),
        )
            .into_response();
    }

    next.run(request).await
}
