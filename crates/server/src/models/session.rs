//! Session-related types for merchant dashboard requests.
//!
//! Sessions are established by the dashboard's login flow; this service only
//! reads them.

use serde::{Deserialize, Serialize};

use cartshield_core::{ShopDomain, StoreId};

/// Session-stored merchant identity.
///
/// Minimal data stored in the session to identify the merchant's primary store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentMerchant {
    /// Primary store's database ID.
    pub store_id: StoreId,
    /// Primary store's canonical domain.
    pub domain: ShopDomain,
}

/// Session keys for merchant authentication data.
pub mod keys {
    /// Key for storing the current logged-in merchant.
    pub const CURRENT_MERCHANT: &str = "current_merchant";
}
