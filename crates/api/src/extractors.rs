//! Request extractors.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::Deserialize;

/// Resolves the client IP from proxy headers.
pub fn client_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    // Try X-Forwarded-For first (for proxied requests)
    if let Some(xff) = headers.get("X-Forwarded-For") {
        if let Ok(xff_str) = xff.to_str() {
            // Take the first IP in the chain
            if let Some(ip) = xff_str.split(',').next() {
                return Some(ip.trim().to_string());
            }
        }
    }

    // Try X-Real-IP
    if let Some(real_ip) = headers.get("X-Real-IP") {
        if let Ok(ip) = real_ip.to_str() {
            return Some(ip.to_string());
        }
    }

    None
}

/// Client IP address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip_from_headers(&parts.headers)))
    }
}

/// Pagination query parameters with bounded page size.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    pub fn clamp(mut self) -> Self {
        self.page = self.page.max(1);
        self.per_page = self.per_page.clamp(1, 100);
        self
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1) * self.per_page) as usize
    }

    pub fn limit(&self) -> usize {
        self.per_page as usize
    }
}
