//! Upstream exchange-rate source.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use topup_core::{RateSnapshot, TopupError};

/// `User-Agent` sent to the rate provider, which rejects library defaults.
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Error type for rate source calls.
#[derive(Debug, thiserror::Error)]
pub enum RateSourceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with something other than `"success"`.
    #[error("rate API returned {0}")]
    Unsuccessful(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<RateSourceError> for TopupError {
    fn from(err: RateSourceError) -> Self {
        Self::upstream("rates", err.to_string())
    }
}

/// Something that can produce a current rate table.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the latest snapshot.
    async fn fetch_latest(&self) -> Result<RateSnapshot, RateSourceError>;
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    result: String,
    #[serde(default)]
    time_last_update_unix: u64,
    #[serde(default)]
    time_next_update_unix: u64,
    #[serde(default)]
    base_code: String,
    #[serde(default)]
    conversion_rates: BTreeMap<String, f32>,
}

/// exchangerate-api.com v6 client.
#[derive(Debug, Clone)]
pub struct ExchangeRateApi {
    client: Client,
    base_url: String,
    api_key: String,
    base_currency: String,
}

impl ExchangeRateApi {
    /// Public API endpoint.
    pub const BASE_URL: &'static str = "https://v6.exchangerate-api.com";

    /// Create a new client quoting against `base_currency`.
    ///
    /// # Errors
    ///
    /// Returns `RateSourceError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        base_currency: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RateSourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RateSourceError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            base_currency: base_currency.into(),
        })
    }
}

#[async_trait]
impl RateSource for ExchangeRateApi {
    async fn fetch_latest(&self) -> Result<RateSnapshot, RateSourceError> {
        let url = format!(
            "{}/v6/{}/latest/{}",
            self.base_url, self.api_key, self.base_currency
        );

        let body: LatestResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.result != "success" {
            return Err(RateSourceError::Unsuccessful(body.result));
        }

        Ok(RateSnapshot {
            base: body.base_code,
            rates: body.conversion_rates,
            last_update: body.time_last_update_unix,
            next_update: body.time_next_update_unix,
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn parses_latest_rates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v6/key/latest/HKD"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "success",
                "time_last_update_unix": 1_700_000_000u64,
                "time_next_update_unix": 1_700_086_400u64,
                "base_code": "HKD",
                "conversion_rates": {"HKD": 1.0, "USD": 0.128}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = ExchangeRateApi::new(&server.uri(), "key", "HKD", Duration::from_secs(5)).unwrap();
        let snapshot = api.fetch_latest().await.unwrap();

        assert_eq!(snapshot.base, "HKD");
        assert_eq!(snapshot.last_update, 1_700_000_000);
        assert_eq!(snapshot.rate("USD"), Some(0.128));
    }

    #[tokio::test]
    async fn unsuccessful_result_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "error",
                "error-type": "invalid-key"
            })))
            .mount(&server)
            .await;

        let api = ExchangeRateApi::new(&server.uri(), "bad", "HKD", Duration::from_secs(5)).unwrap();
        let err = api.fetch_latest().await.unwrap_err();
        assert!(matches!(err, RateSourceError::Unsuccessful(ref r) if r == "error"));
    }
}
