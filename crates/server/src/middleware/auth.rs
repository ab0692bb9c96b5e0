//! Merchant session extractor.
//!
//! Sessions are written by the merchant dashboard's login flow under
//! [`session_keys::CURRENT_MERCHANT`]; this service only reads them.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{CurrentMerchant, session_keys};

/// Extractor that requires a merchant session.
///
/// Rejects with `401 {"code": "not_authenticated"}` when the session is
/// missing or holds no merchant.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireMerchant(merchant): RequireMerchant) -> impl IntoResponse {
///     format!("Hello, {}!", merchant.domain)
/// }
/// ```
pub struct RequireMerchant(pub CurrentMerchant);

impl<S> FromRequestParts<S> for RequireMerchant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AppError::NotAuthenticated)?;

        let merchant: CurrentMerchant = session
            .get(session_keys::CURRENT_MERCHANT)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to load merchant session");
                AppError::NotAuthenticated
            })?
            .ok_or(AppError::NotAuthenticated)?;

        sentry::configure_scope(|scope| {
            scope.set_tag("store_id", merchant.store_id);
        });

        Ok(Self(merchant))
    }
}

/// Store the merchant in the session.
///
/// Used by the dashboard login flow and by tests.
///
/// # Errors
///
/// Returns error if the session store fails.
pub async fn set_current_merchant(
    session: &Session,
    merchant: &CurrentMerchant,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_MERCHANT, merchant).await
}
