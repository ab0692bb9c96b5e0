//! Public checkout routing endpoint, called by storefront scripts.
//!
//! Always answers `200` with a [`RouteResult`]; a malformed body is just
//! another "no redirect" outcome.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, Method, header},
};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};

use cartshield_core::CartLine;

use crate::config::CheckoutConfig;
use crate::services::{NoRedirectReason, RouteResult};
use crate::state::AppState;

/// Body of `POST /api/checkout/route`.
#[derive(Debug, Deserialize)]
pub struct RouteCheckoutRequest {
    pub domain: String,
    #[serde(default)]
    pub items: Vec<CartLine>,
}

/// `POST /api/checkout/route`
pub async fn route_checkout(
    State(state): State<AppState>,
    payload: Result<Json<RouteCheckoutRequest>, JsonRejection>,
) -> Json<RouteResult> {
    let Ok(Json(request)) = payload else {
        return Json(RouteResult::no_redirect(NoRedirectReason::InvalidRequest));
    };

    Json(state.checkout().route(&request.domain, &request.items).await)
}

/// CORS for the checkout endpoint. An empty origin list allows any origin.
#[must_use]
pub fn cors_layer(config: &CheckoutConfig) -> CorsLayer {
    let origins = if config.allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
