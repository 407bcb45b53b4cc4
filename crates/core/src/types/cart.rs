//! Cart line item types.
//!
//! A cart is an ordered collection of [`CartLineItem`]s, unique by product
//! ID. There is no standalone persisted cart aggregate on the client side -
//! the derived total is always recomputed from the lines (see
//! [`crate::types::money::cart_subtotal`]).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// One product's quantity/price entry within a cart.
///
/// Serializes with camelCase field names to match both the local storage
/// payload and the REST wire format. `priceAtPurchase` is the unit price
/// captured when the item was added or last synced; it is NOT refreshed when
/// the catalog price changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Product identifier - unique key within a cart.
    pub product_id: ProductId,
    /// Unit count; invariant: `quantity >= 1`. A requested quantity of zero
    /// is interpreted as removal by the cart engine, never stored.
    pub quantity: u32,
    /// Unit price locked at add/sync time, encoded as a JSON number.
    #[serde(with = "rust_decimal::serde::float")]
    pub price_at_purchase: Decimal,
    /// When the item was added. Informational only - never compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl CartLineItem {
    /// Create a line item stamped with the current time.
    #[must_use]
    pub fn new(product_id: ProductId, quantity: u32, price_at_purchase: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            price_at_purchase,
            added_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_camel_case() {
        let line = CartLineItem {
            product_id: ProductId::new(101),
            quantity: 2,
            price_at_purchase: "19.99".parse().unwrap(),
            added_at: None,
        };

        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["productId"], 101);
        assert_eq!(json["quantity"], 2);
        assert!((json["priceAtPurchase"].as_f64().unwrap() - 19.99).abs() < 1e-9);
        assert!(json.get("addedAt").is_none());
    }

    #[test]
    fn test_deserialize_without_added_at() {
        let line: CartLineItem =
            serde_json::from_str(r#"{"productId":5,"quantity":1,"priceAtPurchase":5.5}"#).unwrap();
        assert_eq!(line.product_id, ProductId::new(5));
        assert_eq!(line.quantity, 1);
        assert_eq!(line.price_at_purchase, "5.5".parse().unwrap());
        assert!(line.added_at.is_none());
    }
}
