use std::fmt::Debug;
use std::net::SocketAddr;

use axum::http::HeaderMap;

const FORWARDED_FOR: &str = "x-forwarded-for";
const ANONYMOUS: &str = "anonymous";

/// Who is calling, as far as the session layer is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Key of the caller's session
    pub identity: String,
    /// Client address as seen through any proxy, echoed back in responses
    pub real_ip: Option<String>,
}

/// Maps an inbound request to a caller identity
pub trait IdentityResolver: Send + Sync + Debug {
    fn resolve(&self, user_id: Option<&str>, headers: &HeaderMap, peer: Option<SocketAddr>) -> Caller;
}

/// Uses the `user_id` query parameter when given, otherwise the client
/// address from `X-Forwarded-For` or the socket peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardedIdentityResolver;

impl IdentityResolver for ForwardedIdentityResolver {
    fn resolve(&self, user_id: Option<&str>, headers: &HeaderMap, peer: Option<SocketAddr>) -> Caller {
        let real_ip = real_ip(headers, peer);
        let identity = user_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| real_ip.clone())
            .unwrap_or_else(|| ANONYMOUS.to_string());

        Caller { identity, real_ip }
    }
}

/// First `X-Forwarded-For` hop, falling back to the peer IP
pub fn real_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
