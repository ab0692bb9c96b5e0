//! Cart line, variant reference and SKU types.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Prefix of Shopify global IDs for product variants.
const VARIANT_GID_PREFIX: &str = "gid://shopify/ProductVariant/";

/// Errors that can occur when parsing cart input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartLineError {
    /// The variant ID is empty.
    #[error("variant id cannot be empty")]
    EmptyVariantId,
    /// The variant ID is not numeric.
    #[error("variant id must be numeric: {0}")]
    NonNumericVariantId(String),
    /// The quantity is zero.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
}

/// A stock-keeping unit, the join key between otherwise unrelated catalogs.
///
/// Surrounding whitespace is trimmed. A blank SKU is treated as absent, so
/// variants without a SKU never participate in mapping. Matching is
/// case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Parse a SKU, returning `None` for blank input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// Returns the SKU as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A commerce-platform variant identifier in its numeric string form.
///
/// Storefront scripts send variant IDs as JSON numbers, numeric strings or
/// Shopify global IDs (`gid://shopify/ProductVariant/123`); all three
/// normalize to `"123"`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct VariantRef(String);

impl VariantRef {
    /// Parse a variant reference from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or not numeric once any global
    /// ID prefix has been removed.
    pub fn parse(raw: &str) -> Result<Self, CartLineError> {
        let trimmed = raw.trim();
        let id = trimmed.strip_prefix(VARIANT_GID_PREFIX).unwrap_or(trimmed);

        if id.is_empty() {
            return Err(CartLineError::EmptyVariantId);
        }

        if !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CartLineError::NonNumericVariantId(raw.to_owned()));
        }

        Ok(Self(id.to_owned()))
    }

    /// Returns the variant ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for VariantRef {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for VariantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VariantRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::from(n)),
            Raw::Text(s) => Self::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// One line of a storefront cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Variant on the primary store.
    pub variant_id: VariantRef,
    /// Number of units.
    pub quantity: u32,
}

impl CartLine {
    /// Create a cart line, rejecting zero quantities.
    ///
    /// # Errors
    ///
    /// Returns [`CartLineError::ZeroQuantity`] if `quantity` is zero.
    pub fn new(variant_id: VariantRef, quantity: u32) -> Result<Self, CartLineError> {
        if quantity == 0 {
            return Err(CartLineError::ZeroQuantity);
        }
        Ok(Self {
            variant_id,
            quantity,
        })
    }
}
