//! Bramble Market Core - Shared types library.
//!
//! This crate provides common types used across all Bramble Market components:
//! - `client` - Storefront client library (cart, auth, remote gateway)
//! - `cli` - Command-line driver for the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure derivations - no I/O, no HTTP
//! clients, no storage access. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, cart line items, money helpers, checkout totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
