//! Derived checkout totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::CartLineItem;
use super::money::{cart_subtotal, round_money};

/// Rates used to derive an [`OrderSummary`] from a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRates {
    /// Sales tax rate applied to the subtotal.
    pub tax_rate: Decimal,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Decimal,
    /// Flat shipping charge below the threshold.
    pub flat_shipping: Decimal,
}

impl Default for CheckoutRates {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(7, 2),                // 7%
            free_shipping_threshold: Decimal::new(50, 0), // $50
            flat_shipping: Decimal::new(599, 2),          // $5.99
        }
    }
}

/// Checkout order summary, fully derived from the cart lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

impl OrderSummary {
    /// Derive the summary for a cart at the given rates.
    ///
    /// All amounts are rounded to two decimal places.
    #[must_use]
    pub fn compute(items: &[CartLineItem], rates: &CheckoutRates) -> Self {
        let subtotal = cart_subtotal(items);
        let shipping = if subtotal >= rates.free_shipping_threshold {
            Decimal::ZERO
        } else {
            rates.flat_shipping
        };
        let tax = round_money(subtotal * rates.tax_rate);
        let total = round_money(subtotal + shipping + tax);

        Self {
            subtotal,
            shipping,
            tax,
            total,
        }
    }
}
