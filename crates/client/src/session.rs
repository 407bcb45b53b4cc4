//! Session wiring shared across the client.
//!
//! [`StorefrontSession`] builds the collaborators from configuration and
//! hands out cheap clones, so every consumer works against the same auth
//! state and the same canonical cart.

use crate::auth::AuthSession;
use crate::cart::CartService;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::gateway::CartGateway;
use crate::store::LocalStore;

/// One storefront session: config, auth, local store, and the cart engine.
///
/// Must be created inside a Tokio runtime (the cart engine spawns its
/// persistence writer on construction).
#[derive(Clone)]
pub struct StorefrontSession {
    config: ClientConfig,
    store: LocalStore,
    auth: AuthSession,
    cart: CartService,
}

impl StorefrontSession {
    /// Build a session from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the local store cannot be
    /// initialized.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let store = LocalStore::open(&config.storage_dir)?;
        let auth = AuthSession::new(http.clone(), config.api_url.clone(), store.clone());
        let gateway = CartGateway::new(http, config.api_url.clone());
        let cart = CartService::new(auth.clone(), gateway, store.clone());

        Ok(Self {
            config,
            store,
            auth,
            cart,
        })
    }

    /// Build a session from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or session setup fails.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get a reference to the local key/value store.
    #[must_use]
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Get a reference to the authentication session.
    #[must_use]
    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    /// Get a reference to the cart engine.
    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.cart
    }
}
