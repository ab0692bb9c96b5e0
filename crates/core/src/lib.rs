//! Cartshield Core - Shared domain types.
//!
//! This crate provides the types shared by the Cartshield components:
//! - `server` - Backup store registry, product mapping sync and checkout routing
//! - `cli` - Command-line tools for migrations, onboarding and sync
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, canonical shop domains, SKUs, cart lines and
//!   cart permalinks

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
