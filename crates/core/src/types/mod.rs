//! Core types for Bramble Market.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod money;
pub mod summary;

pub use cart::CartLineItem;
pub use id::*;
pub use money::{cart_item_count, cart_subtotal, line_total, round_money};
pub use summary::{CheckoutRates, OrderSummary};
