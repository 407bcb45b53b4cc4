//! REST client for the server-side cart.
//!
//! The wire contract is deliberately plain: fetch by user, create, and
//! wholesale replace. There is no partial update - every persist ships the
//! full item list. A bearer credential from the auth session is attached to
//! every call; without one the engine routes persistence through the local
//! store instead and this client is never invoked.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use bramble_market_core::{CartId, CartLineItem, ProductId, UserId};

/// Errors that can occur talking to the cart API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The credential was rejected. Calling flows force a logout.
    #[error("unauthorized")]
    Unauthorized,

    /// The API returned an unexpected status.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// One cart line as the API represents it.
///
/// The server calls the locked unit price `priceAtAddition`; the client
/// model calls it `priceAtPurchase`. Conversions below bridge the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_at_addition: Decimal,
}

impl From<&CartLineItem> for RemoteCartLine {
    fn from(line: &CartLineItem) -> Self {
        Self {
            product_id: line.product_id,
            quantity: line.quantity,
            price_at_addition: line.price_at_purchase,
        }
    }
}

impl From<RemoteCartLine> for CartLineItem {
    fn from(line: RemoteCartLine) -> Self {
        Self {
            product_id: line.product_id,
            quantity: line.quantity,
            price_at_purchase: line.price_at_addition,
            // The server does not echo add timestamps.
            added_at: None,
        }
    }
}

/// The server-side cart for a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCart {
    #[serde(default)]
    pub id: Option<CartId>,
    #[serde(default)]
    pub items: Vec<RemoteCartLine>,
}

impl RemoteCart {
    /// Convert the remote lines into client cart line items.
    #[must_use]
    pub fn into_items(self) -> Vec<CartLineItem> {
        self.items.into_iter().map(CartLineItem::from).collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCartRequest<'a> {
    user_id: UserId,
    items: &'a [RemoteCartLine],
}

#[derive(Debug, Serialize)]
struct ReplaceCartRequest<'a> {
    items: &'a [RemoteCartLine],
}

/// Client for the cart REST API.
///
/// Cart state is never cached here - it is mutable per request, and the
/// engine owns the canonical copy.
#[derive(Clone)]
pub struct CartGateway {
    inner: Arc<CartGatewayInner>,
}

struct CartGatewayInner {
    client: reqwest::Client,
    base_url: Url,
}

impl CartGateway {
    /// Create a new cart gateway over the given API base URL.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            inner: Arc::new(CartGatewayInner { client, base_url }),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{path}",
            self.inner.base_url.as_str().trim_end_matches('/')
        )
    }

    /// Fetch the cart for a user. `Ok(None)` means no cart exists yet.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` on 401, `UnexpectedStatus` on other
    /// non-success statuses, or a transport/parse error.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn fetch_cart(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<Option<RemoteCart>, GatewayError> {
        let response = self
            .inner
            .client
            .get(self.endpoint(&format!("carts/user/{user_id}")))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::check(response).await?;
        let cart: RemoteCart = serde_json::from_str(&body)?;
        Ok(Some(cart))
    }

    /// Create a cart for a user who has none yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    #[instrument(skip(self, items, token), fields(user_id = %user_id, lines = items.len()))]
    pub async fn create_cart(
        &self,
        user_id: UserId,
        items: &[CartLineItem],
        token: &str,
    ) -> Result<RemoteCart, GatewayError> {
        let lines: Vec<RemoteCartLine> = items.iter().map(RemoteCartLine::from).collect();
        let response = self
            .inner
            .client
            .post(self.endpoint("carts"))
            .bearer_auth(token)
            .json(&CreateCartRequest {
                user_id,
                items: &lines,
            })
            .send()
            .await?;

        let body = Self::check(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Replace a user's cart wholesale. No partial update exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    #[instrument(skip(self, items, token), fields(user_id = %user_id, lines = items.len()))]
    pub async fn replace_cart(
        &self,
        user_id: UserId,
        items: &[CartLineItem],
        token: &str,
    ) -> Result<RemoteCart, GatewayError> {
        let lines: Vec<RemoteCartLine> = items.iter().map(RemoteCartLine::from).collect();
        let response = self
            .inner
            .client
            .put(self.endpoint(&format!("carts/user/{user_id}")))
            .bearer_auth(token)
            .json(&ReplaceCartRequest { items: &lines })
            .send()
            .await?;

        let body = Self::check(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Map a response to its body text, surfacing auth and status failures.
    async fn check(response: reqwest::Response) -> Result<String, GatewayError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthorized);
        }
        // Read the body as text first for better error diagnostics.
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Cart API returned non-success status"
            );
            return Err(GatewayError::UnexpectedStatus {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(body)
    }
}

impl std::fmt::Debug for CartGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartGateway")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}
