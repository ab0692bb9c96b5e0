//! Shopify Admin REST API access.
//!
//! # Architecture
//!
//! - [`CommerceApi`] is the seam the services depend on; tests swap in a fake
//! - [`ShopifyRestClient`] is the production implementation over `reqwest`
//! - Credentials are per store and passed on every call, never held by the client
//!
//! Only two endpoints are used: `shop.json` to validate a credential and learn
//! the canonical domain, and `products.json` to read a catalog page by page.

mod client;
mod pagination;
pub mod types;

pub use client::ShopifyRestClient;
pub use pagination::next_page_info;
pub use types::*;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use cartshield_core::ShopDomain;

/// Errors that can occur when calling the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed (connect, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The access token was rejected (401/403).
    #[error("Unauthorized: access token rejected with status {0}")]
    Unauthorized(u16),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Failed to parse a response or build a request.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ShopifyError {
    /// Whether the error means the credential itself is bad.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Upstream HTTP status, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Unauthorized(status) => Some(*status),
            Self::RateLimited(_) => Some(429),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Parse(_) => None,
        }
    }
}

/// Read access to a commerce platform's Admin API.
#[async_trait]
pub trait CommerceApi: Send + Sync {
    /// Fetch shop identity using `token`. Doubles as credential validation.
    async fn shop_info(
        &self,
        domain: &ShopDomain,
        token: &SecretString,
    ) -> Result<ShopInfo, ShopifyError>;

    /// Fetch one page of products. `page_info` is the cursor from the
    /// previous page; `None` requests the first page.
    async fn products_page(
        &self,
        domain: &ShopDomain,
        token: &SecretString,
        page_info: Option<&str>,
    ) -> Result<ProductPage, ShopifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_error() {
        let err = ShopifyError::Unauthorized(401);
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(401));
        assert_eq!(
            err.to_string(),
            "Unauthorized: access token rejected with status 401"
        );
    }

    #[test]
    fn test_api_error_display() {
        let err = ShopifyError::Api {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert!(!err.is_unauthorized());
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.to_string(), "API error: 503 - Service Unavailable");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ShopifyError::RateLimited(2);
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.to_string(), "Rate limited, retry after 2 seconds");
    }
}
