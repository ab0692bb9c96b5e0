//! Domain models for the failover registry and mapping table.

pub mod session;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use cartshield_core::{BackupStoreId, ShopDomain, Sku, StoreId, VariantRef};

pub use session::{CurrentMerchant, keys as session_keys};

/// Hard cap on backup stores per primary store.
pub const MAX_BACKUP_STORES: usize = 5;

/// A merchant's primary storefront.
///
/// Implements `Debug` manually to redact the Admin API token.
#[derive(Clone)]
pub struct Store {
    pub id: StoreId,
    pub domain: ShopDomain,
    /// Admin API token. `None` until the merchant completes onboarding.
    pub access_token: Option<SecretString>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A candidate failover storefront.
///
/// Implements `Debug` manually to redact the Admin API token.
#[derive(Clone)]
pub struct BackupStore {
    pub id: BackupStoreId,
    pub store_id: StoreId,
    /// Canonical domain as reported by the platform's shop endpoint.
    pub domain: ShopDomain,
    pub access_token: SecretString,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for BackupStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupStore")
            .field("id", &self.id)
            .field("store_id", &self.store_id)
            .field("domain", &self.domain)
            .field("access_token", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Input for registering a backup store.
#[derive(Clone)]
pub struct NewBackupStore {
    pub store_id: StoreId,
    pub domain: ShopDomain,
    pub access_token: SecretString,
}

/// A resolved primary-variant to backup-variant correspondence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductMapping {
    pub store_id: StoreId,
    pub backup_store_id: BackupStoreId,
    pub sku: Sku,
    pub primary_variant_id: VariantRef,
    pub backup_variant_id: VariantRef,
    pub primary_product_title: String,
    pub last_synced_at: DateTime<Utc>,
}

/// A mapping row emitted by the synchronizer, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingDraft {
    pub sku: Sku,
    pub primary_variant_id: VariantRef,
    pub backup_variant_id: VariantRef,
    pub primary_product_title: String,
}

/// Per-backup-store mapping summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingStats {
    pub backup_store_id: BackupStoreId,
    pub mapping_count: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
}
