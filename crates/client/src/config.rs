//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BRAMBLE_API_URL` - Base URL of the storefront REST API
//!
//! ## Optional
//! - `BRAMBLE_STORAGE_DIR` - Local storage directory (default: .bramble)
//! - `BRAMBLE_HTTP_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `BRAMBLE_TAX_RATE` - Sales tax rate (default: 0.07)
//! - `BRAMBLE_FREE_SHIPPING_THRESHOLD` - Free shipping subtotal (default: 50)
//! - `BRAMBLE_FLAT_SHIPPING` - Flat shipping charge (default: 5.99)

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

use bramble_market_core::CheckoutRates;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the storefront REST API
    pub api_url: Url,
    /// Directory holding the device-local key/value store
    pub storage_dir: PathBuf,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
    /// Rates for the derived checkout summary
    pub rates: CheckoutRates,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = get_required_env("BRAMBLE_API_URL")?
            .parse::<Url>()
            .map_err(|e| ConfigError::InvalidEnvVar("BRAMBLE_API_URL".to_string(), e.to_string()))?;
        let storage_dir = PathBuf::from(get_env_or_default("BRAMBLE_STORAGE_DIR", ".bramble"));
        let timeout_secs = get_env_or_default("BRAMBLE_HTTP_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BRAMBLE_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        let defaults = CheckoutRates::default();
        let rates = CheckoutRates {
            tax_rate: get_decimal_or("BRAMBLE_TAX_RATE", defaults.tax_rate)?,
            free_shipping_threshold: get_decimal_or(
                "BRAMBLE_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
            flat_shipping: get_decimal_or("BRAMBLE_FLAT_SHIPPING", defaults.flat_shipping)?,
        };

        Ok(Self {
            api_url,
            storage_dir,
            http_timeout: Duration::from_secs(timeout_secs),
            rates,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an optional decimal environment variable, falling back to a default.
fn get_decimal_or(key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<Decimal>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rates_match_checkout_rates() {
        let defaults = CheckoutRates::default();
        assert_eq!(defaults.tax_rate, "0.07".parse().unwrap());
        assert_eq!(defaults.free_shipping_threshold, "50".parse().unwrap());
        assert_eq!(defaults.flat_shipping, "5.99".parse().unwrap());
    }

    #[test]
    fn test_get_decimal_or_falls_back() {
        let value = get_decimal_or("BRAMBLE_TEST_UNSET_DECIMAL", Decimal::ONE).unwrap();
        assert_eq!(value, Decimal::ONE);
    }
}
