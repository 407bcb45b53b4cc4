//! Decimal money helpers.
//!
//! Prices are carried as [`rust_decimal::Decimal`] everywhere. Display-facing
//! amounts (totals, subtotals) are always rounded to two decimal places;
//! per-unit prices are stored as captured and never re-rounded.

use rust_decimal::{Decimal, RoundingStrategy};

use super::cart::CartLineItem;

/// Round an amount to two decimal places (midpoint away from zero).
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Extended price for a single line: unit price times quantity, rounded.
#[must_use]
pub fn line_total(line: &CartLineItem) -> Decimal {
    round_money(line.price_at_purchase * Decimal::from(line.quantity))
}

/// Cart subtotal: `round(Σ(priceAtPurchase × quantity), 2)`.
///
/// Never stored - recomputed from the line items after every mutation.
#[must_use]
pub fn cart_subtotal(items: &[CartLineItem]) -> Decimal {
    let sum: Decimal = items
        .iter()
        .map(|line| line.price_at_purchase * Decimal::from(line.quantity))
        .sum();
    round_money(sum)
}

/// Total unit count across all lines: `Σ(quantity)`.
#[must_use]
pub fn cart_item_count(items: &[CartLineItem]) -> u32 {
    items.iter().map(|line| line.quantity).sum()
}
