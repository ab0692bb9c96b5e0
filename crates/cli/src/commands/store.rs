//! Primary store onboarding.
//!
//! # Usage
//!
//! ```bash
//! cartshield store create --domain primary.myshopify.com --token shpat_...
//! cartshield store set-token --store-id 1 --token shpat_...
//! ```
//!
//! When a token is given it is checked against the shop endpoint first, and
//! the store is registered under the platform's canonical domain.

use secrecy::SecretString;

use cartshield_core::{ShopDomain, StoreId};
use cartshield_server::config::ShopifyApiConfig;
use cartshield_server::db::{FailoverRepository, PgFailoverRepository};
use cartshield_server::shopify::{CommerceApi, ShopifyRestClient};

use super::{CommandError, connect};

/// Register a primary store.
pub async fn create(domain: &str, token: Option<String>) -> Result<(), CommandError> {
    let mut domain = ShopDomain::parse(domain)?;
    let token = token
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .map(SecretString::from);

    if let Some(token) = &token {
        domain = verified_domain(&domain, token).await?;
    }

    let repo = PgFailoverRepository::new(connect().await?);
    let store = repo.create_store(&domain, token.as_ref()).await?;

    tracing::info!(store_id = %store.id, domain = %store.domain, "Store created");
    Ok(())
}

/// Replace a primary store's Admin API token.
pub async fn set_token(store_id: i32, token: String) -> Result<(), CommandError> {
    let id = StoreId::new(store_id);
    let token = SecretString::from(token.trim().to_owned());

    let repo = PgFailoverRepository::new(connect().await?);
    let store = repo
        .find_store(id)
        .await?
        .ok_or(CommandError::StoreNotFound(store_id))?;

    verified_domain(&store.domain, &token).await?;
    repo.set_store_token(id, &token).await?;

    tracing::info!(store_id = %id, domain = %store.domain, "Store token updated");
    Ok(())
}

/// Check `token` against the shop endpoint and return the canonical domain.
async fn verified_domain(
    domain: &ShopDomain,
    token: &SecretString,
) -> Result<ShopDomain, CommandError> {
    let client = ShopifyRestClient::new(&ShopifyApiConfig::from_env()?)?;
    let info = client.shop_info(domain, token).await?;

    Ok(info
        .canonical_domain()
        .and_then(|d| ShopDomain::parse(d).ok())
        .unwrap_or_else(|| domain.clone()))
}
