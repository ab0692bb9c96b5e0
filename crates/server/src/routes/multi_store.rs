//! Merchant-facing multi-store configuration API.
//!
//! Every handler requires a merchant session and only touches the session
//! store's own backup stores.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cartshield_core::BackupStoreId;

use crate::error::AppError;
use crate::middleware::RequireMerchant;
use crate::services::{
    BackupStoreView, MultiStoreConfigView, PruneReport, SyncReport, SyncScope,
};
use crate::state::AppState;

/// Body of `POST /api/multi-store/backup-stores`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBackupStoreRequest {
    pub domain: String,
    pub access_token: String,
}

/// Body of the toggle endpoints.
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

/// Response of `POST /api/multi-store/toggle`.
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub enabled: bool,
}

/// `GET /api/multi-store/config`
#[instrument(skip_all, fields(store_id = %merchant.store_id))]
pub async fn get_config(
    State(state): State<AppState>,
    RequireMerchant(merchant): RequireMerchant,
) -> Result<Json<MultiStoreConfigView>, AppError> {
    let config = state.registry().get_config(merchant.store_id).await?;
    Ok(Json(config))
}

/// `POST /api/multi-store/backup-stores`
#[instrument(skip_all, fields(store_id = %merchant.store_id))]
pub async fn add_backup_store(
    State(state): State<AppState>,
    RequireMerchant(merchant): RequireMerchant,
    payload: Result<Json<AddBackupStoreRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BackupStoreView>), AppError> {
    let Json(body) = payload?;
    let backup = state
        .registry()
        .add_backup_store(
            merchant.store_id,
            &body.domain,
            SecretString::from(body.access_token),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(BackupStoreView::from(backup))))
}

/// `DELETE /api/multi-store/backup-stores/{id}`
#[instrument(skip_all, fields(store_id = %merchant.store_id, backup_store_id = id))]
pub async fn remove_backup_store(
    State(state): State<AppState>,
    RequireMerchant(merchant): RequireMerchant,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    state
        .registry()
        .remove_backup_store(merchant.store_id, BackupStoreId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PATCH /api/multi-store/backup-stores/{id}`
///
/// Returns the refreshed configuration.
#[instrument(skip_all, fields(store_id = %merchant.store_id, backup_store_id = id))]
pub async fn toggle_backup_store(
    State(state): State<AppState>,
    RequireMerchant(merchant): RequireMerchant,
    Path(id): Path<i32>,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<Json<MultiStoreConfigView>, AppError> {
    let Json(body) = payload?;
    state
        .registry()
        .toggle_backup_store(merchant.store_id, BackupStoreId::new(id), body.enabled)
        .await?;
    let config = state.registry().get_config(merchant.store_id).await?;
    Ok(Json(config))
}

/// `POST /api/multi-store/toggle`
#[instrument(skip_all, fields(store_id = %merchant.store_id))]
pub async fn toggle_feature(
    State(state): State<AppState>,
    RequireMerchant(merchant): RequireMerchant,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<Json<ToggleResponse>, AppError> {
    let Json(body) = payload?;
    state
        .registry()
        .toggle_multi_store(merchant.store_id, body.enabled)
        .await?;
    Ok(Json(ToggleResponse {
        enabled: body.enabled,
    }))
}

/// `POST /api/multi-store/sync`
#[instrument(skip_all, fields(store_id = %merchant.store_id))]
pub async fn sync_products(
    State(state): State<AppState>,
    RequireMerchant(merchant): RequireMerchant,
) -> Result<Json<SyncReport>, AppError> {
    let report = state
        .sync()
        .sync_products(merchant.store_id, SyncScope::All)
        .await?;
    Ok(Json(report))
}

/// `POST /api/multi-store/prune`
#[instrument(skip_all, fields(store_id = %merchant.store_id))]
pub async fn prune_mappings(
    State(state): State<AppState>,
    RequireMerchant(merchant): RequireMerchant,
) -> Result<Json<PruneReport>, AppError> {
    let report = state.sync().prune_stale_mappings(merchant.store_id).await?;
    Ok(Json(report))
}
