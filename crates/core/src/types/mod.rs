//! Core types for Cartshield.
//!
//! This module provides type-safe wrappers for the failover checkout domain.

pub mod cart;
pub mod domain;
pub mod id;
pub mod permalink;

pub use cart::{CartLine, CartLineError, Sku, VariantRef};
pub use domain::{DomainError, ShopDomain};
pub use id::*;
pub use permalink::CartPermalink;
