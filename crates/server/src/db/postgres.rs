//! `PostgreSQL` implementation of [`FailoverRepository`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use cartshield_core::{BackupStoreId, ShopDomain, StoreId, VariantRef};

use super::{FailoverRepository, RepositoryError};
use crate::models::{BackupStore, MappingDraft, MappingStats, NewBackupStore, Store};

// =============================================================================
// Row types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    domain: String,
    access_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let domain = ShopDomain::parse(&row.domain).map_err(|e| {
            RepositoryError::DataCorruption(format!("store {} domain: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            domain,
            access_token: row
                .access_token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BackupStoreRow {
    id: BackupStoreId,
    store_id: StoreId,
    domain: String,
    access_token: String,
    enabled: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<BackupStoreRow> for BackupStore {
    type Error = RepositoryError;

    fn try_from(row: BackupStoreRow) -> Result<Self, Self::Error> {
        let domain = ShopDomain::parse(&row.domain).map_err(|e| {
            RepositoryError::DataCorruption(format!("backup store {} domain: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            store_id: row.store_id,
            domain,
            access_token: SecretString::from(row.access_token),
            enabled: row.enabled,
            created_at: row.created_at,
        })
    }
}

const BACKUP_STORE_COLUMNS: &str = "id, store_id, domain, access_token, enabled, created_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository backed by the `failover` schema.
#[derive(Debug, Clone)]
pub struct PgFailoverRepository {
    pool: PgPool,
}

impl PgFailoverRepository {
    /// Create a new repository over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl FailoverRepository for PgFailoverRepository {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(
            r"
            SELECT id, domain, access_token, created_at
            FROM failover.stores
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Store::try_from).transpose()
    }

    async fn find_store_by_domain(
        &self,
        domain: &ShopDomain,
    ) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(
            r"
            SELECT id, domain, access_token, created_at
            FROM failover.stores
            WHERE domain = $1
            ",
        )
        .bind(domain.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Store::try_from).transpose()
    }

    async fn create_store(
        &self,
        domain: &ShopDomain,
        access_token: Option<&SecretString>,
    ) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(
            r"
            INSERT INTO failover.stores (domain, access_token)
            VALUES ($1, $2)
            ON CONFLICT (domain) DO NOTHING
            RETURNING id, domain, access_token, created_at
            ",
        )
        .bind(domain.as_str())
        .bind(access_token.map(|t| t.expose_secret().to_owned()))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict(format!("store {domain} already exists")))?;

        Store::try_from(row)
    }

    async fn set_store_token(
        &self,
        id: StoreId,
        access_token: &SecretString,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE failover.stores
            SET access_token = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(access_token.expose_secret())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn multi_store_enabled(&self, store_id: StoreId) -> Result<bool, RepositoryError> {
        let enabled = sqlx::query_scalar::<_, bool>(
            "SELECT enabled FROM failover.multi_store_config WHERE store_id = $1",
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(enabled.unwrap_or(false))
    }

    async fn set_multi_store_enabled(
        &self,
        store_id: StoreId,
        enabled: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO failover.multi_store_config (store_id, enabled)
            VALUES ($1, $2)
            ON CONFLICT (store_id) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                updated_at = NOW()
            ",
        )
        .bind(store_id)
        .bind(enabled)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_backup_stores(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<BackupStore>, RepositoryError> {
        let rows = sqlx::query_as::<_, BackupStoreRow>(&format!(
            r"
            SELECT {BACKUP_STORE_COLUMNS}
            FROM failover.backup_stores
            WHERE store_id = $1
            ORDER BY created_at, id
            "
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BackupStore::try_from).collect()
    }

    async fn find_backup_store(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
    ) -> Result<Option<BackupStore>, RepositoryError> {
        let row = sqlx::query_as::<_, BackupStoreRow>(&format!(
            r"
            SELECT {BACKUP_STORE_COLUMNS}
            FROM failover.backup_stores
            WHERE id = $1 AND store_id = $2
            "
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BackupStore::try_from).transpose()
    }

    async fn insert_backup_store(
        &self,
        new: NewBackupStore,
        max: usize,
    ) -> Result<BackupStore, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the owning store serializes concurrent adds for it.
        let locked = sqlx::query_scalar::<_, StoreId>(
            "SELECT id FROM failover.stores WHERE id = $1 FOR UPDATE",
        )
        .bind(new.store_id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM failover.backup_stores WHERE store_id = $1",
        )
        .bind(new.store_id)
        .fetch_one(&mut *tx)
        .await?;

        if usize::try_from(count).unwrap_or(usize::MAX) >= max {
            return Err(RepositoryError::CapacityExceeded { max });
        }

        let row = sqlx::query_as::<_, BackupStoreRow>(&format!(
            r"
            INSERT INTO failover.backup_stores (store_id, domain, access_token, enabled)
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (store_id, domain) DO NOTHING
            RETURNING {BACKUP_STORE_COLUMNS}
            "
        ))
        .bind(new.store_id)
        .bind(new.domain.as_str())
        .bind(new.access_token.expose_secret())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            RepositoryError::Conflict(format!("backup store {} already exists", new.domain))
        })?;

        tx.commit().await?;

        BackupStore::try_from(row)
    }

    async fn delete_backup_store(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
    ) -> Result<bool, RepositoryError> {
        // product_mappings rows go with it via ON DELETE CASCADE.
        let result = sqlx::query(
            r"
            DELETE FROM failover.backup_stores
            WHERE id = $1 AND store_id = $2
            ",
        )
        .bind(id)
        .bind(store_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_backup_store_enabled(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
        enabled: bool,
    ) -> Result<Option<BackupStore>, RepositoryError> {
        let row = sqlx::query_as::<_, BackupStoreRow>(&format!(
            r"
            UPDATE failover.backup_stores
            SET enabled = $3
            WHERE id = $1 AND store_id = $2
            RETURNING {BACKUP_STORE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(store_id)
        .bind(enabled)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BackupStore::try_from).transpose()
    }

    async fn upsert_mappings(
        &self,
        store_id: StoreId,
        backup_store_id: BackupStoreId,
        drafts: &[MappingDraft],
        synced_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Stamp the sync epoch even when nothing matched, so prune can drop
        // every row this run did not refresh.
        let stamped = sqlx::query(
            r"
            UPDATE failover.backup_stores
            SET last_synced_at = GREATEST(last_synced_at, $3)
            WHERE id = $1 AND store_id = $2
            ",
        )
        .bind(backup_store_id)
        .bind(store_id)
        .bind(synced_at)
        .execute(&mut *tx)
        .await?;
        if stamped.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if drafts.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        let skus: Vec<String> = drafts.iter().map(|d| d.sku.to_string()).collect();
        let primary_ids: Vec<String> = drafts
            .iter()
            .map(|d| d.primary_variant_id.to_string())
            .collect();
        let backup_ids: Vec<String> = drafts
            .iter()
            .map(|d| d.backup_variant_id.to_string())
            .collect();
        let titles: Vec<String> = drafts
            .iter()
            .map(|d| d.primary_product_title.clone())
            .collect();

        // Single statement, so the batch lands atomically. SKUs must be unique
        // within the batch: ON CONFLICT cannot touch the same row twice.
        let result = sqlx::query(
            r"
            INSERT INTO failover.product_mappings (
                store_id, backup_store_id, sku,
                primary_variant_id, backup_variant_id, primary_product_title,
                last_synced_at
            )
            SELECT $1, $2, t.sku, t.primary_variant_id, t.backup_variant_id, t.title, $7
            FROM UNNEST($3::text[], $4::text[], $5::text[], $6::text[])
                AS t(sku, primary_variant_id, backup_variant_id, title)
            ON CONFLICT (store_id, backup_store_id, sku) DO UPDATE SET
                primary_variant_id = EXCLUDED.primary_variant_id,
                backup_variant_id = EXCLUDED.backup_variant_id,
                primary_product_title = EXCLUDED.primary_product_title,
                last_synced_at = EXCLUDED.last_synced_at
            ",
        )
        .bind(store_id)
        .bind(backup_store_id)
        .bind(skus)
        .bind(primary_ids)
        .bind(backup_ids)
        .bind(titles)
        .bind(synced_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn resolve_variants(
        &self,
        store_id: StoreId,
        backup_store_id: BackupStoreId,
        primary_variant_ids: &[VariantRef],
    ) -> Result<HashMap<VariantRef, VariantRef>, RepositoryError> {
        let ids: Vec<String> = primary_variant_ids.iter().map(ToString::to_string).collect();

        // Oldest first, so a newer row wins if a variant's SKU was changed and
        // a stale row still points at it.
        let rows = sqlx::query_as::<_, (String, String)>(
            r"
            SELECT primary_variant_id, backup_variant_id
            FROM failover.product_mappings
            WHERE store_id = $1
              AND backup_store_id = $2
              AND primary_variant_id = ANY($3)
            ORDER BY last_synced_at, id
            ",
        )
        .bind(store_id)
        .bind(backup_store_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(primary, backup)| {
                let primary = VariantRef::parse(&primary)
                    .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
                let backup = VariantRef::parse(&backup)
                    .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
                Ok((primary, backup))
            })
            .collect()
    }

    async fn last_synced_at(
        &self,
        store_id: StoreId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let last = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(last_synced_at) FROM failover.product_mappings WHERE store_id = $1",
        )
        .bind(store_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(last)
    }

    async fn mapping_stats(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<MappingStats>, RepositoryError> {
        let rows = sqlx::query_as::<_, (BackupStoreId, i64, Option<DateTime<Utc>>)>(
            r"
            SELECT backup_store_id, COUNT(*), MAX(last_synced_at)
            FROM failover.product_mappings
            WHERE store_id = $1
            GROUP BY backup_store_id
            ORDER BY backup_store_id
            ",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(backup_store_id, mapping_count, last_synced_at)| MappingStats {
                backup_store_id,
                mapping_count,
                last_synced_at,
            })
            .collect())
    }

    async fn prune_stale_mappings(&self, store_id: StoreId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM failover.product_mappings pm
            USING failover.backup_stores b
            WHERE pm.store_id = $1
              AND b.id = pm.backup_store_id
              AND b.store_id = $1
              AND b.last_synced_at IS NOT NULL
              AND pm.last_synced_at < b.last_synced_at
            ",
        )
        .bind(store_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
