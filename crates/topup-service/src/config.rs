//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Ledger service base URL. Required to start.
    pub ledger_url: Option<String>,

    /// Audit log service base URL (optional).
    pub audit_url: Option<String>,

    /// Redis URL for the shared snapshot cache (optional).
    pub redis_url: Option<String>,

    /// Key prefix for the shared snapshot cache.
    pub redis_prefix: String,

    /// Stripe secret API key.
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret.
    pub stripe_webhook_secret: Option<String>,

    /// Stripe publishable key handed to clients.
    pub stripe_publishable_key: Option<String>,

    /// Stripe price every unit is billed at.
    pub stripe_price_id: String,

    /// Where Stripe redirects after payment.
    pub stripe_success_url: String,

    /// Stripe API base URL.
    pub stripe_api_base: String,

    /// Exchange rate API base URL.
    pub rates_api_url: String,

    /// Exchange rate API key.
    pub rates_api_key: Option<String>,

    /// Currency rates are quoted against (default: "HKD").
    pub rates_base_currency: String,

    /// Upper bound of the rate freshness jitter, seconds (default: 7200).
    pub rates_jitter_max_secs: u64,

    /// Maximum age of a signed webhook, seconds (default: 300).
    pub webhook_tolerance_secs: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Timeout for calls to the ledger, audit log, Stripe and the rate API.
    pub upstream_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
    #[serde(default)]
    publishable_key: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Try to load Stripe secrets from file first, then fall back to env vars
        let (stripe_api_key, stripe_webhook_secret, stripe_publishable_key) =
            load_stripe_secrets();

        Self {
            listen_addr: env_or("LISTEN_ADDR", defaults.listen_addr),
            ledger_url: std::env::var("LEDGER_URL").ok(),
            audit_url: std::env::var("AUDIT_URL").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            redis_prefix: env_or("REDIS_PREFIX", defaults.redis_prefix),
            stripe_api_key,
            stripe_webhook_secret,
            stripe_publishable_key,
            stripe_price_id: env_or("STRIPE_PRICE_ID", defaults.stripe_price_id),
            stripe_success_url: env_or("STRIPE_SUCCESS_URL", defaults.stripe_success_url),
            stripe_api_base: env_or("STRIPE_API_BASE", defaults.stripe_api_base),
            rates_api_url: env_or("RATES_API_URL", defaults.rates_api_url),
            rates_api_key: std::env::var("RATES_API_KEY").ok(),
            rates_base_currency: env_or("RATES_BASE_CURRENCY", defaults.rates_base_currency),
            rates_jitter_max_secs: env_parse("RATES_JITTER_MAX_SECS")
                .unwrap_or(defaults.rates_jitter_max_secs),
            webhook_tolerance_secs: env_parse("WEBHOOK_TOLERANCE_SECS")
                .unwrap_or(defaults.webhook_tolerance_secs),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            upstream_timeout_seconds: env_parse("UPSTREAM_TIMEOUT_SECONDS")
                .unwrap_or(defaults.upstream_timeout_seconds),
        }
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "topup/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (
                Some(secrets.api_key),
                secrets.webhook_secret,
                secrets
                    .publishable_key
                    .or_else(|| std::env::var("STRIPE_PUB_KEY").ok()),
            );
        }
    }

    // Fall back to environment variables
    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        std::env::var("STRIPE_API_KEY").ok(),
        std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
        std::env::var("STRIPE_PUB_KEY").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            ledger_url: None,
            audit_url: None,
            redis_url: None,
            redis_prefix: String::new(),
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_publishable_key: None,
            stripe_price_id: String::new(),
            stripe_success_url: "http://localhost:3000/topup/success".into(),
            stripe_api_base: "https://api.stripe.com/v1".into(),
            rates_api_url: "https://v6.exchangerate-api.com".into(),
            rates_api_key: None,
            rates_base_currency: "HKD".into(),
            rates_jitter_max_secs: 7200,
            webhook_tolerance_secs: 300,
            cors_origins: vec!["*".into()],
            max_body_bytes: 512 * 1024,
            request_timeout_seconds: 30,
            upstream_timeout_seconds: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.rates_base_currency, "HKD");
        assert_eq!(config.rates_jitter_max_secs, 7200);
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert_eq!(config.max_body_bytes, 512 * 1024);
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
    }

    #[test]
    fn missing_secrets_file_is_not_found() {
        let err = load_secrets_file::<StripeSecrets>("does/not/exist.json").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
