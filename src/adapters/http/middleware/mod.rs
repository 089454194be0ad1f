//! HTTP middleware for axum.
//!
//! - `ip_allowlist` - source address filtering for gateway callbacks

pub mod ip_allowlist;

pub use ip_allowlist::{client_ip, ip_allowlist_middleware, IpAllowlist, IpAllowlistState};
