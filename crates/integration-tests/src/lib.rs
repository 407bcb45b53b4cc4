//! End-to-end tests for the Bramble Market client.
//!
//! Tests drive the real [`CartService`] against an `httpmock` server
//! standing in for the storefront REST API, with a `tempfile`-backed local
//! store standing in for device storage.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bramble-market-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use url::Url;

use bramble_market_client::auth::AuthSession;
use bramble_market_client::cart::CartService;
use bramble_market_client::gateway::CartGateway;
use bramble_market_client::store::{LocalStore, keys};

/// A client wired against a mock API server and a throwaway local store.
pub struct TestContext {
    pub cart: CartService,
    pub auth: AuthSession,
    pub store: LocalStore,
    // Held for its Drop: removes the storage directory.
    _storage: tempfile::TempDir,
}

impl TestContext {
    /// Build a context talking to the given API base URL.
    ///
    /// # Panics
    ///
    /// Panics on setup failure; these helpers only run under tests.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn new(api_url: &str) -> Self {
        let storage = tempfile::tempdir().unwrap();
        let store = LocalStore::open(storage.path()).unwrap();
        Self::build(api_url, storage, store)
    }

    /// Build a context that already holds a session token for `user_id`.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn new_authenticated(api_url: &str, user_id: i32) -> Self {
        let storage = tempfile::tempdir().unwrap();
        let store = LocalStore::open(storage.path()).unwrap();
        // Seed the token before the session is built so the login status
        // observable starts out authenticated.
        store.set_raw(keys::AUTH_TOKEN, &issue_token(user_id)).unwrap();
        Self::build(api_url, storage, store)
    }

    #[allow(clippy::unwrap_used)]
    fn build(api_url: &str, storage: tempfile::TempDir, store: LocalStore) -> Self {
        let api_url: Url = api_url.parse().unwrap();
        let http = reqwest::Client::new();
        let auth = AuthSession::new(http.clone(), api_url.clone(), store.clone());
        let cart = CartService::new(auth.clone(), CartGateway::new(http, api_url), store.clone());

        Self {
            cart,
            auth,
            store,
            _storage: storage,
        }
    }
}

/// Issue an unsigned JWT for a user, expiring an hour from now.
///
/// # Panics
///
/// Panics if claim serialization fails; test helper only.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn issue_token(user_id: i32) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = serde_json::json!({
        "userId": user_id,
        "username": "maria",
        "exp": Utc::now().timestamp() + 3600,
    });
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    format!("{header}.{payload}.sig")
}
