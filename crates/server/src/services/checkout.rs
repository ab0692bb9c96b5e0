//! Checkout routing to a backup store.
//!
//! Routing only reads persisted state: the store, its feature flag, its
//! backup stores and the mapping table. It never calls the platform. Every
//! outcome is a [`RouteResult`]; failures degrade to "no redirect" so the
//! storefront falls back to its normal checkout.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::seq::IndexedRandom;
use serde::Serialize;
use tracing::instrument;

use cartshield_core::{CartLine, CartPermalink, ShopDomain, VariantRef};

use crate::db::{FailoverRepository, RepositoryError};
use crate::models::BackupStore;

/// Picks one backup store from the enabled candidates.
pub trait BackupSelector: Send + Sync {
    /// `candidates` are enabled and in insertion order. Returns `None` only
    /// when `candidates` is empty.
    fn select<'a>(&self, candidates: &'a [BackupStore]) -> Option<&'a BackupStore>;
}

/// Uniform random choice. Spreads load; no health checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformRandomSelector;

impl BackupSelector for UniformRandomSelector {
    fn select<'a>(&self, candidates: &'a [BackupStore]) -> Option<&'a BackupStore> {
        candidates.choose(&mut rand::rng())
    }
}

/// Always the first enabled store, in insertion order.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedSelector;

impl BackupSelector for OrderedSelector {
    fn select<'a>(&self, candidates: &'a [BackupStore]) -> Option<&'a BackupStore> {
        candidates.first()
    }
}

/// Configurable selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorKind {
    #[default]
    Random,
    Ordered,
}

impl SelectorKind {
    /// Build the selector for this strategy.
    #[must_use]
    pub fn build(self) -> Arc<dyn BackupSelector> {
        match self {
            Self::Random => Arc::new(UniformRandomSelector),
            Self::Ordered => Arc::new(OrderedSelector),
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("random"),
            Self::Ordered => f.write_str("ordered"),
        }
    }
}

impl FromStr for SelectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "ordered" => Ok(Self::Ordered),
            other => Err(format!("unknown selector '{other}', expected 'random' or 'ordered'")),
        }
    }
}

/// Why a checkout was not redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoRedirectReason {
    InvalidRequest,
    EmptyCart,
    InvalidQuantity,
    StoreNotFound,
    FeatureDisabled,
    NoEnabledBackups,
    UnmappedItems,
    InternalError,
}

/// Routing outcome, serialized as the checkout endpoint's response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub redirect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_store_domain: Option<ShopDomain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_mapped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<NoRedirectReason>,
}

impl RouteResult {
    #[must_use]
    pub const fn no_redirect(reason: NoRedirectReason) -> Self {
        Self {
            redirect: false,
            checkout_url: None,
            backup_store_domain: None,
            items_mapped: None,
            reason: Some(reason),
        }
    }

    fn redirect(permalink: &CartPermalink) -> Self {
        Self {
            redirect: true,
            checkout_url: Some(permalink.to_url()),
            backup_store_domain: Some(permalink.domain().clone()),
            items_mapped: Some(permalink.len()),
            reason: None,
        }
    }
}

/// Routes storefront carts to a backup store.
#[derive(Clone)]
pub struct CheckoutRouter {
    repo: Arc<dyn FailoverRepository>,
    selector: Arc<dyn BackupSelector>,
}

impl CheckoutRouter {
    #[must_use]
    pub fn new(repo: Arc<dyn FailoverRepository>, selector: Arc<dyn BackupSelector>) -> Self {
        Self { repo, selector }
    }

    /// Route a cart from the primary store at `domain`.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn route(&self, domain: &str, items: &[CartLine]) -> RouteResult {
        match self.try_route(domain, items).await {
            Ok(Ok(permalink)) => {
                tracing::info!(
                    backup = %permalink.domain(),
                    items_mapped = permalink.len(),
                    "checkout routed to backup store"
                );
                RouteResult::redirect(&permalink)
            }
            Ok(Err(reason)) => {
                tracing::debug!(?reason, "checkout not redirected");
                RouteResult::no_redirect(reason)
            }
            Err(e) => {
                tracing::error!(error = %e, "checkout routing failed");
                RouteResult::no_redirect(NoRedirectReason::InternalError)
            }
        }
    }

    async fn try_route(
        &self,
        domain: &str,
        items: &[CartLine],
    ) -> Result<Result<CartPermalink, NoRedirectReason>, RepositoryError> {
        if items.is_empty() {
            return Ok(Err(NoRedirectReason::EmptyCart));
        }
        if items.iter().any(|item| item.quantity == 0) {
            return Ok(Err(NoRedirectReason::InvalidQuantity));
        }

        let Ok(domain) = ShopDomain::parse(domain) else {
            return Ok(Err(NoRedirectReason::StoreNotFound));
        };
        let Some(store) = self.repo.find_store_by_domain(&domain).await? else {
            return Ok(Err(NoRedirectReason::StoreNotFound));
        };

        if !self.repo.multi_store_enabled(store.id).await? {
            return Ok(Err(NoRedirectReason::FeatureDisabled));
        }

        let candidates: Vec<BackupStore> = self
            .repo
            .list_backup_stores(store.id)
            .await?
            .into_iter()
            .filter(|b| b.enabled)
            .collect();
        let Some(backup) = self.selector.select(&candidates) else {
            return Ok(Err(NoRedirectReason::NoEnabledBackups));
        };

        let mut wanted: Vec<VariantRef> = items.iter().map(|i| i.variant_id.clone()).collect();
        wanted.sort();
        wanted.dedup();

        let resolved: HashMap<VariantRef, VariantRef> = self
            .repo
            .resolve_variants(store.id, backup.id, &wanted)
            .await?;

        let lines: Option<Vec<(VariantRef, u32)>> = items
            .iter()
            .map(|item| {
                resolved
                    .get(&item.variant_id)
                    .map(|backup_variant| (backup_variant.clone(), item.quantity))
            })
            .collect();

        Ok(lines
            .map(|lines| CartPermalink::new(backup.domain.clone(), lines))
            .ok_or(NoRedirectReason::UnmappedItems))
    }
}
