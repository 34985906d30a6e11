//! Stripe API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use topup_core::{Payload, TopupError};

use super::types::{CheckoutSession, Price, StripeErrorResponse};
use crate::provider::{self, PaymentProvider, ProviderSession, SessionParams};

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid webhook signature.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Signed timestamp is older than the tolerance.
    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<StripeError> for TopupError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::InvalidSignature | StripeError::TimestampOutOfTolerance => {
                Self::Authentication(err.to_string())
            }
            other => Self::upstream("stripe", other.to_string()),
        }
    }
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    /// * `base_url` - API base, [`Self::BASE_URL`] unless pointing at a mock
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, StripeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StripeError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a Checkout session.
    pub async fn create_session(
        &self,
        params: &SessionParams,
    ) -> Result<CheckoutSession, StripeError> {
        let form = session_form(params);

        tracing::debug!(
            price_id = %params.price_id,
            quantity = %params.quantity,
            currency = ?params.currency,
            reuse_customer = %params.customer.is_some(),
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&form)
            .send()
            .await?;

        handle_response(response).await
    }

    /// Retrieve a price by ID.
    pub async fn retrieve_price(&self, price_id: &str) -> Result<Price, StripeError> {
        let response = self
            .client
            .get(format!("{}/prices/{}", self.base_url, price_id))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await?;

        handle_response(response).await
    }
}

/// Form fields for `POST /checkout/sessions`.
fn session_form(params: &SessionParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), params.success_url.clone()),
        ("line_items[0][price]".to_string(), params.price_id.clone()),
        (
            "line_items[0][quantity]".to_string(),
            params.quantity.to_string(),
        ),
    ];

    if let Some(currency) = &params.currency {
        form.push(("currency".to_string(), currency.clone()));
    }

    match &params.customer {
        Some(customer) => form.push(("customer".to_string(), customer.clone())),
        None => form.push(("customer_creation".to_string(), "always".to_string())),
    }

    for (key, value) in &params.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }

    form
}

/// Handle API response and convert errors.
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json().await?);
    }

    // Try to parse error response
    let error_body: Result<StripeErrorResponse, _> = response.json().await;

    match error_body {
        Ok(stripe_error) => Err(StripeError::Api {
            error_type: stripe_error.error.error_type,
            message: stripe_error.error.message,
            code: stripe_error.error.code,
        }),
        Err(_) => Err(StripeError::Api {
            error_type: "unknown".to_string(),
            message: format!("HTTP {status}"),
            code: None,
        }),
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_checkout_session(
        &self,
        params: &SessionParams,
    ) -> topup_core::Result<ProviderSession> {
        let session = self.create_session(params).await?;

        let url = session
            .url
            .clone()
            .ok_or_else(|| TopupError::upstream("stripe", "checkout session has no url"))?;

        let mut snapshot = Vec::new();
        ciborium::into_writer(&session, &mut snapshot)
            .map_err(|e| StripeError::Serialization(e.to_string()))?;

        Ok(ProviderSession {
            id: session.id,
            url,
            currency: session.currency,
            amount_total: session.amount_total,
            payload: Payload::new(snapshot),
        })
    }

    async fn get_price(&self, price_id: &str) -> topup_core::Result<provider::Price> {
        let price = self.retrieve_price(price_id).await?;
        let unit_amount = price
            .unit_amount
            .ok_or_else(|| TopupError::upstream("stripe", format!("price {} has no unit amount", price.id)))?;

        Ok(provider::Price {
            unit_amount,
            currency: price.currency,
        })
    }
}
