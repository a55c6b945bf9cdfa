//! Request extractors.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use gate_core::{extract_site_key, Role, SiteKey};
use std::net::SocketAddr;

use crate::response::ApiError;
use crate::state::{AppState, ProxyTrust};

/// Tracked site identified by the beacon's site key.
#[derive(Debug, Clone)]
pub struct SiteAuth {
    pub site_key: SiteKey,
    pub project_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for SiteAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let api_key_header = parts.headers.get("X-API-Key").and_then(|h| h.to_str().ok());

        let site_key = extract_site_key(auth_header, api_key_header)?;
        let project_id = site_key.project_id();

        Ok(SiteAuth {
            site_key,
            project_id,
        })
    }
}

/// Client IP address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl ClientIp {
    /// Address used as the limiter key when none could be determined.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn or_unknown(&self) -> &str {
        self.0.as_deref().unwrap_or(Self::UNKNOWN)
    }

    /// Resolve the address, honouring forwarding headers only when the
    /// socket peer is trusted to set them.
    pub fn from_parts(parts: &Parts, trust: &ProxyTrust) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        if trust.honours(peer) {
            if let Some(ip) = forwarded_ip(parts) {
                return ClientIp(Some(ip));
            }
        }

        ClientIp(peer.map(|ip| ip.to_string()))
    }
}

fn forwarded_ip(parts: &Parts) -> Option<String> {
    // Try X-Forwarded-For first (for proxied requests)
    if let Some(xff) = parts.headers.get("X-Forwarded-For") {
        if let Ok(xff_str) = xff.to_str() {
            // Take the first IP in the chain
            if let Some(ip) = xff_str.split(',').next().map(str::trim) {
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    // Try X-Real-IP
    let real_ip = parts.headers.get("X-Real-IP")?.to_str().ok()?.trim();
    (!real_ip.is_empty()).then(|| real_ip.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp::from_parts(parts, &state.proxy))
    }
}

/// Signed-in dashboard user, inserted as a request extension by the
/// upstream session layer.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub user_id: String,
    pub role: Option<Role>,
}

/// Role of the caller of an administrative route, if any.
///
/// A session extension wins; otherwise a bearer token is looked up in the
/// configured admin tokens.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub role: Option<Role>,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<AdminSession>() {
            return Ok(Caller { role: session.role });
        }

        let role = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .and_then(|token| state.access.role_for_token(token.trim()));

        Ok(Caller { role })
    }
}
