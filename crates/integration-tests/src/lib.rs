//! Integration tests for Cartshield.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p cartshield-cli -- migrate
//! cargo run -p cartshield-server &
//! cargo test -p cartshield-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `CARTSHIELD_TEST_BASE_URL` - Server under test (default: `http://localhost:3002`)
//! - `CARTSHIELD_TEST_PRIMARY_DOMAIN` - An onboarded primary store, for tests
//!   that need one

use reqwest::Client;
use serde::Deserialize;

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("CARTSHIELD_TEST_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3002".to_string())
        .trim_end_matches('/')
        .to_string()
}

/// An onboarded primary store domain, if configured.
#[must_use]
pub fn primary_domain() -> Option<String> {
    std::env::var("CARTSHIELD_TEST_PRIMARY_DOMAIN").ok()
}

/// HTTP client that keeps session cookies between requests.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialized.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Response body of `POST /api/checkout/route`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub redirect: bool,
    pub checkout_url: Option<String>,
    pub backup_store_domain: Option<String>,
    pub items_mapped: Option<usize>,
    pub reason: Option<String>,
}

/// Error body returned by the merchant API.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
