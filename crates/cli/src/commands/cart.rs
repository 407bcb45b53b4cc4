//! Cart commands.

#![allow(clippy::print_stdout)]

use rust_decimal::Decimal;

use bramble_market_client::StorefrontSession;
use bramble_market_core::{OrderSummary, ProductId, line_total};

/// Print the cart lines and the derived checkout summary.
pub fn show(session: &StorefrontSession) {
    let items = session.cart().current_items();
    if items.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    println!("{:>10}  {:>4}  {:>10}  {:>10}", "product", "qty", "unit", "total");
    for line in &items {
        println!(
            "{:>10}  {:>4}  {:>10}  {:>10}",
            line.product_id,
            line.quantity,
            format!("${}", line.price_at_purchase),
            format!("${}", line_total(line)),
        );
    }

    let summary = OrderSummary::compute(&items, &session.config().rates);
    println!();
    println!("Subtotal: ${}", summary.subtotal);
    println!("Shipping: ${}", summary.shipping);
    println!("Tax:      ${}", summary.tax);
    println!("Total:    ${}", summary.total);
}

/// Print the total unit count.
pub fn count(session: &StorefrontSession) {
    println!("{}", session.cart().item_count());
}

/// Add a product at the given catalog price.
pub fn add(session: &StorefrontSession, product_id: i32, price: Decimal, quantity: u32) {
    let product_id = ProductId::new(product_id);
    session.cart().add_item(product_id, price, quantity);
    match session.cart().get_item(product_id) {
        Some(line) => println!("Added product {product_id} (now {} in cart).", line.quantity),
        None => println!("Nothing added."),
    }
}

/// Set a line's quantity; zero or negative removes the line.
pub fn update(session: &StorefrontSession, product_id: i32, quantity: i64) {
    let product_id = ProductId::new(product_id);
    let quantity = u32::try_from(quantity).unwrap_or(0);
    session.cart().update_quantity(product_id, quantity);
    match session.cart().get_item(product_id) {
        Some(line) => println!("Product {product_id} set to {}.", line.quantity),
        None => println!("Product {product_id} removed."),
    }
}

/// Remove a product's line.
pub fn remove(session: &StorefrontSession, product_id: i32) {
    session.cart().remove_item(ProductId::new(product_id));
    println!("Product {product_id} removed.");
}

/// Empty the cart.
pub fn clear(session: &StorefrontSession) {
    session.cart().clear();
    println!("Cart cleared.");
}

/// Re-run the server reconciliation.
pub async fn sync(session: &StorefrontSession) {
    if !session.auth().has_valid_token() {
        println!("Not logged in; nothing to sync.");
        return;
    }
    session.cart().sync_with_server().await;
    println!("Cart synced ({} items).", session.cart().item_count());
}
