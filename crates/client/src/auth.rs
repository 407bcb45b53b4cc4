//! Authentication session against the storefront REST API.
//!
//! The API issues a bearer JWT on login/signup. The client stores it in the
//! local store and decodes its claims without signature verification - the
//! server is the one enforcing the signature; the client only needs the
//! embedded identity and expiry. Login state is exposed as a replay-latest
//! observable so the cart engine and presentation layers can react to
//! transitions.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::instrument;
use url::Url;

use bramble_market_core::UserId;

use crate::store::{LocalStore, StoreError, keys};

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The API returned an unexpected status.
    #[error("auth request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// No session token is present.
    #[error("no authentication token available")]
    NoSession,

    /// The stored token could not be decoded.
    #[error("malformed session token")]
    MalformedToken,

    /// The token carries no user id claim.
    #[error("user id not found in token")]
    MissingUserId,

    /// Local storage write failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Claims the client reads out of the bearer JWT.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: Option<UserId>,
    username: Option<String>,
    role: Option<String>,
    exp: Option<i64>,
}

/// Signup request payload.
#[derive(Debug, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SignupResponse {
    token: String,
    username: Option<String>,
}

/// Bearer-token session provider.
///
/// Cheaply cloneable; all handles share one token store and one observable
/// login status.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<AuthSessionInner>,
}

struct AuthSessionInner {
    http: reqwest::Client,
    api_url: Url,
    store: LocalStore,
    status_tx: watch::Sender<bool>,
}

impl AuthSession {
    /// Create a session over the given store and API base URL.
    #[must_use]
    pub fn new(http: reqwest::Client, api_url: Url, store: LocalStore) -> Self {
        let session = Self {
            inner: Arc::new(AuthSessionInner {
                http,
                api_url,
                store,
                status_tx: watch::Sender::new(false),
            }),
        };
        // Seed the observable from whatever token survived the last run.
        session
            .inner
            .status_tx
            .send_replace(session.has_valid_token());
        session
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{path}",
            self.inner.api_url.as_str().trim_end_matches('/')
        )
    }

    // =========================================================================
    // Auth operations
    // =========================================================================

    /// Log in with username and password.
    ///
    /// On success the issued token is stored and the login status flips to
    /// authenticated. Callers drive the one-time cart merge afterwards.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` on a 401 response, `Api` on any other
    /// non-success status.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let response = self
            .inner
            .http
            .post(self.endpoint("auth/login"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body: LoginResponse = response.json().await?;
        self.handle_auth_success(&body.token, Some(username))?;
        Ok(())
    }

    /// Create an account and log in with the issued token.
    ///
    /// # Errors
    ///
    /// Returns `Api` on any non-success status.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn signup(&self, request: &SignupRequest) -> Result<(), AuthError> {
        let response = self
            .inner
            .http
            .post(self.endpoint("auth/signup"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body: SignupResponse = response.json().await?;
        self.handle_auth_success(&body.token, body.username.as_deref())?;
        Ok(())
    }

    /// Drop the session: clears the stored token, username, and the local
    /// cart copy. The remote cart, if any, is unaffected.
    pub fn logout(&self) {
        self.inner.store.remove(keys::AUTH_TOKEN);
        self.inner.store.remove(keys::AUTH_USERNAME);
        self.inner.store.remove(keys::CART);
        self.inner.status_tx.send_replace(false);
    }

    fn handle_auth_success(&self, token: &str, username: Option<&str>) -> Result<(), AuthError> {
        self.inner.store.set_raw(keys::AUTH_TOKEN, token)?;
        if let Some(username) = username {
            self.inner.store.set_raw(keys::AUTH_USERNAME, username)?;
        }
        self.inner.status_tx.send_replace(true);
        Ok(())
    }

    // =========================================================================
    // Session reads
    // =========================================================================

    /// The stored bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.inner
            .store
            .get_raw(keys::AUTH_TOKEN)
            .map(SecretString::from)
    }

    /// Whether a decodable, unexpired token is present.
    ///
    /// A token without an `exp` claim is treated as unexpired; an
    /// undecodable token is treated as absent.
    #[must_use]
    pub fn has_valid_token(&self) -> bool {
        let Some(token) = self.token() else {
            return false;
        };
        let Some(claims) = decode_claims(token.expose_secret()) else {
            return false;
        };
        claims.exp.is_none_or(|exp| exp > Utc::now().timestamp())
    }

    /// The authenticated user's id.
    ///
    /// # Errors
    ///
    /// This is a hard failure when no session exists - there is no sensible
    /// fallback identity.
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        let token = self.token().ok_or(AuthError::NoSession)?;
        let claims = decode_claims(token.expose_secret()).ok_or(AuthError::MalformedToken)?;
        claims.user_id.ok_or(AuthError::MissingUserId)
    }

    /// Display username: token claim first, stored copy as fallback.
    #[must_use]
    pub fn username(&self) -> Option<String> {
        if let Some(token) = self.token()
            && let Some(claims) = decode_claims(token.expose_secret())
            && let Some(username) = claims.username
        {
            return Some(username);
        }
        self.inner.store.get_raw(keys::AUTH_USERNAME)
    }

    /// Whether the token carries the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.token()
            .and_then(|token| decode_claims(token.expose_secret()))
            .and_then(|claims| claims.role)
            .is_some_and(|role| role == "ADMIN")
    }

    /// Observable login status. Replays the latest value to new subscribers.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<bool> {
        self.inner.status_tx.subscribe()
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("api_url", &self.inner.api_url.as_str())
            .field("authenticated", &self.has_valid_token())
            .finish_non_exhaustive()
    }
}

/// Decode JWT claims without verifying the signature.
fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}
