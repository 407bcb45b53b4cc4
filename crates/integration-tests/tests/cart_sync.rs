//! End-to-end cart synchronization scenarios against a mock API.

#![allow(clippy::unwrap_used)]

use httpmock::Method::{GET, POST, PUT};
use httpmock::MockServer;
use rust_decimal::Decimal;

use bramble_market_client::store::keys;
use bramble_market_core::{CartLineItem, ProductId};
use bramble_market_integration_tests::{TestContext, issue_token};

fn price(raw: &str) -> Decimal {
    raw.parse().unwrap()
}

/// The full login journey: browse anonymously, log in, and end up with the
/// reconciled server cart.
///
/// Product 101 is in both carts; the server line (qty 3 at 18.50) wins over
/// the local line (qty 1 at 19.99).
#[tokio::test]
async fn test_anonymous_cart_reconciles_on_login() {
    let server = MockServer::start_async().await;
    let ctx = TestContext::new(&server.base_url());

    ctx.cart.init().await;
    ctx.cart.add_item(ProductId::new(101), price("19.99"), 1);
    ctx.cart.flush().await;

    // Anonymous browsing persisted one line on the device.
    let local: Vec<CartLineItem> = ctx.store.get_json(keys::CART).unwrap();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].quantity, 1);

    let login = server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(200)
                .json_body(serde_json::json!({ "token": issue_token(7) }));
        })
        .await;
    let fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/carts/user/7");
            then.status(200).json_body(serde_json::json!({
                "id": 5,
                "items": [{ "productId": 101, "quantity": 3, "priceAtAddition": 18.5 }]
            }));
        })
        .await;
    let replace = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/carts/user/7")
                .json_body(serde_json::json!({
                    "items": [{ "productId": 101, "quantity": 3, "priceAtAddition": 18.5 }]
                }));
            then.status(200).json_body(serde_json::json!({
                "id": 5,
                "items": [{ "productId": 101, "quantity": 3, "priceAtAddition": 18.5 }]
            }));
        })
        .await;

    ctx.auth.login("maria", "hunter2").await.unwrap();
    ctx.cart.sync_with_server().await;

    // The server line replaced the local one wholesale.
    let items = ctx.cart.current_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, ProductId::new(101));
    assert_eq!(items[0].quantity, 3);
    assert_eq!(items[0].price_at_purchase, price("18.5"));
    assert_eq!(ctx.cart.item_count(), 3);
    assert_eq!(ctx.cart.current_total(), price("55.50"));

    login.assert_async().await;
    // One fetch for the merge, one existence check before the replace.
    assert_eq!(fetch.hits_async().await, 2);
    assert_eq!(replace.hits_async().await, 1);
}

/// Products only in the local cart survive the merge, appended after the
/// server's lines.
#[tokio::test]
async fn test_merge_keeps_local_only_products() {
    let server = MockServer::start_async().await;
    let ctx = TestContext::new(&server.base_url());

    ctx.cart.add_item(ProductId::new(202), price("5.00"), 1);
    ctx.cart.flush().await;
    ctx.store
        .set_raw(keys::AUTH_TOKEN, &issue_token(7))
        .unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET).path("/carts/user/7");
            then.status(200).json_body(serde_json::json!({
                "id": 5,
                "items": [{ "productId": 101, "quantity": 2, "priceAtAddition": 18.5 }]
            }));
        })
        .await;
    let replace = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/carts/user/7")
                .json_body(serde_json::json!({
                    "items": [
                        { "productId": 101, "quantity": 2, "priceAtAddition": 18.5 },
                        { "productId": 202, "quantity": 1, "priceAtAddition": 5.0 }
                    ]
                }));
            then.status(200).json_body(serde_json::json!({
                "id": 5,
                "items": [
                    { "productId": 101, "quantity": 2, "priceAtAddition": 18.5 },
                    { "productId": 202, "quantity": 1, "priceAtAddition": 5.0 }
                ]
            }));
        })
        .await;

    ctx.cart.sync_with_server().await;

    replace.assert_async().await;
    let items = ctx.cart.current_items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].product_id, ProductId::new(101));
    assert_eq!(items[1].product_id, ProductId::new(202));
}

/// Anonymous mutations never touch the network; they land in the local
/// store only.
#[tokio::test]
async fn test_unauthenticated_mutations_stay_local() {
    let server = MockServer::start_async().await;
    let ctx = TestContext::new(&server.base_url());
    let api = server
        .mock_async(|when, then| {
            when.path_contains("carts");
            then.status(500);
        })
        .await;

    ctx.cart.add_item(ProductId::new(1), price("10"), 2);
    ctx.cart.update_quantity(ProductId::new(1), 5);
    ctx.cart.remove_item(ProductId::new(1));
    ctx.cart.add_item(ProductId::new(2), price("3.25"), 1);
    ctx.cart.flush().await;

    assert_eq!(api.hits_async().await, 0);
    let local: Vec<CartLineItem> = ctx.store.get_json(keys::CART).unwrap();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].product_id, ProductId::new(2));
}

/// An authenticated mutation persists remotely: existence check first, then
/// create when no cart exists yet.
#[tokio::test]
async fn test_authenticated_mutation_creates_missing_cart() {
    let server = MockServer::start_async().await;
    let ctx = TestContext::new_authenticated(&server.base_url(), 7);

    let fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/carts/user/7");
            then.status(404);
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/carts").json_body(serde_json::json!({
                "userId": 7,
                "items": [{ "productId": 101, "quantity": 2, "priceAtAddition": 19.99 }]
            }));
            then.status(201).json_body(serde_json::json!({
                "id": 9,
                "items": [{ "productId": 101, "quantity": 2, "priceAtAddition": 19.99 }]
            }));
        })
        .await;

    ctx.cart.add_item(ProductId::new(101), price("19.99"), 2);
    ctx.cart.flush().await;

    assert_eq!(fetch.hits_async().await, 1);
    create.assert_async().await;
    // Remote persistence leaves no device-local copy behind.
    assert!(!ctx.store.contains(keys::CART));
}

/// An authenticated session replaces the existing server cart on every
/// mutation, including the empty replace after a clear.
#[tokio::test]
async fn test_authenticated_clear_replaces_with_empty_cart() {
    let server = MockServer::start_async().await;
    let ctx = TestContext::new_authenticated(&server.base_url(), 7);

    server
        .mock_async(|when, then| {
            when.method(GET).path("/carts/user/7");
            then.status(200)
                .json_body(serde_json::json!({ "id": 9, "items": [] }));
        })
        .await;
    let replace = server
        .mock_async(|when, then| {
            when.method(PUT).path("/carts/user/7");
            then.status(200)
                .json_body(serde_json::json!({ "id": 9, "items": [] }));
        })
        .await;

    ctx.cart.add_item(ProductId::new(1), price("10"), 1);
    ctx.cart.flush().await;
    ctx.cart.clear();
    ctx.cart.flush().await;

    // One replace for the add, one for the cleared cart.
    assert_eq!(replace.hits_async().await, 2);
    assert!(ctx.cart.current_items().is_empty());
}

/// A rejected credential ends the session: the stale token is dropped and
/// the login status observable flips back to anonymous.
#[tokio::test]
async fn test_rejected_credential_forces_logout() {
    let server = MockServer::start_async().await;
    let ctx = TestContext::new_authenticated(&server.base_url(), 7);
    server
        .mock_async(|when, then| {
            when.path_contains("carts");
            then.status(401);
        })
        .await;

    let status = ctx.auth.status();
    assert!(*status.borrow());

    ctx.cart.add_item(ProductId::new(1), price("10"), 1);
    ctx.cart.flush().await;

    assert!(ctx.auth.token().is_none());
    assert!(!*status.borrow());
}

/// A server outage during sync degrades: the failure is logged and the
/// pre-merge in-memory cart stays authoritative.
#[tokio::test]
async fn test_sync_failure_keeps_local_state() {
    let server = MockServer::start_async().await;
    let ctx = TestContext::new(&server.base_url());

    ctx.cart.add_item(ProductId::new(202), price("5.00"), 1);
    ctx.cart.flush().await;
    ctx.store
        .set_raw(keys::AUTH_TOKEN, &issue_token(7))
        .unwrap();

    server
        .mock_async(|when, then| {
            when.path_contains("carts");
            then.status(500);
        })
        .await;

    ctx.cart.sync_with_server().await;

    let items = ctx.cart.current_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, ProductId::new(202));
    assert_eq!(items[0].quantity, 1);
}
