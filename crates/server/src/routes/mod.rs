//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                             - Liveness
//! GET    /health/ready                       - Readiness (database)
//!
//! # Merchant API (requires session)
//! GET    /api/multi-store/config             - Feature flag, backup stores, sync status
//! POST   /api/multi-store/backup-stores      - Add backup store
//! DELETE /api/multi-store/backup-stores/{id} - Remove backup store
//! PATCH  /api/multi-store/backup-stores/{id} - Enable/disable backup store
//! POST   /api/multi-store/toggle             - Enable/disable checkout routing
//! POST   /api/multi-store/sync               - Sync product mappings
//! POST   /api/multi-store/prune              - Delete stale mappings
//!
//! # Public (CORS)
//! POST   /api/checkout/route                 - Route a cart to a backup store
//! ```

pub mod checkout;
pub mod health;
pub mod multi_store;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::config::ServerConfig;
use crate::state::AppState;

/// Create the merchant API router.
pub fn multi_store_routes() -> Router<AppState> {
    Router::new()
        .route("/config", get(multi_store::get_config))
        .route("/backup-stores", post(multi_store::add_backup_store))
        .route(
            "/backup-stores/{id}",
            patch(multi_store::toggle_backup_store).delete(multi_store::remove_backup_store),
        )
        .route("/toggle", post(multi_store::toggle_feature))
        .route("/sync", post(multi_store::sync_products))
        .route("/prune", post(multi_store::prune_mappings))
}

/// Create the public checkout router.
pub fn checkout_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/route", post(checkout::route_checkout))
        .layer(checkout::cors_layer(&config.checkout))
}

/// Create all routes.
pub fn routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/multi-store", multi_store_routes())
        .nest("/api/checkout", checkout_routes(config))
}
