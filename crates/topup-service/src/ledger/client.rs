//! HTTP client for the ledger service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use topup_core::{Charge, ChargeId, Currency, CustomerLink, Payload, UserId, Wallet};

use super::types::{
    ChargeInput, CompleteChargeInput, Envelope, ExpendInput, Page, UidPagination,
    UpdateChargeInput,
};
use super::{Ledger, LedgerError};
use crate::context::CallerContext;

/// Ledger REST client.
///
/// Every request carries the caller's identity headers.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Customer link as returned by the ledger.
///
/// Lookups ask for `fields=customer`, so the key columns may be absent and
/// are filled in from the request.
#[derive(Debug, Deserialize)]
struct CustomerOutput {
    #[serde(default)]
    uid: Option<UserId>,
    #[serde(default)]
    provider: Option<String>,
    customer: String,
    #[serde(default)]
    payload: Option<Payload>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    updated_at: Option<i64>,
}

impl CustomerOutput {
    fn into_link(self, uid: UserId, provider: &str) -> CustomerLink {
        CustomerLink {
            uid: self.uid.unwrap_or(uid),
            provider: self.provider.unwrap_or_else(|| provider.to_string()),
            customer: self.customer,
            payload: self.payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl LedgerClient {
    /// Create a new ledger client.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, ctx: &CallerContext, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.client.request(method, format!("{}{path}", self.base_url));
        for (name, value) in ctx.headers() {
            req = req.header(name, value);
        }
        req
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Envelope<T>, LedgerError> {
        let response = req.send().await?;
        handle_response(response).await
    }
}

/// Map a ledger response to its envelope or a typed error.
async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Envelope<T>, LedgerError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(ErrorEnvelope { error }) => error
            .message
            .or(error.code)
            .unwrap_or_else(|| format!("HTTP {status}")),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => format!("HTTP {status}"),
    };

    Err(match status {
        StatusCode::CONFLICT => LedgerError::Conflict(message),
        StatusCode::NOT_FOUND => LedgerError::NotFound(message),
        _ => LedgerError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

#[async_trait]
impl Ledger for LedgerClient {
    async fn create_charge(
        &self,
        ctx: &CallerContext,
        input: &ChargeInput,
    ) -> Result<Charge, LedgerError> {
        let req = self.request(ctx, Method::POST, "/v1/charge").json(input);
        let output: Envelope<Charge> = self.send(req).await?;
        Ok(output.result.with_derived_created_at())
    }

    async fn update_charge(
        &self,
        ctx: &CallerContext,
        input: &UpdateChargeInput,
    ) -> Result<Charge, LedgerError> {
        let req = self.request(ctx, Method::PATCH, "/v1/charge").json(input);
        let output: Envelope<Charge> = self.send(req).await?;
        Ok(output.result.with_derived_created_at())
    }

    async fn complete_charge(
        &self,
        ctx: &CallerContext,
        input: &CompleteChargeInput,
    ) -> Result<Charge, LedgerError> {
        let req = self
            .request(ctx, Method::POST, "/v1/charge/complete")
            .json(input);
        let output: Envelope<Charge> = self.send(req).await?;
        Ok(output.result.with_derived_created_at())
    }

    async fn get_charge(
        &self,
        ctx: &CallerContext,
        uid: UserId,
        id: ChargeId,
        fields: Option<&str>,
    ) -> Result<Charge, LedgerError> {
        let mut query = vec![("uid", uid.to_string()), ("id", id.to_string())];
        if let Some(fields) = fields.filter(|f| !f.is_empty()) {
            query.push(("fields", fields.to_string()));
        }

        let req = self.request(ctx, Method::GET, "/v1/charge").query(&query);
        let output: Envelope<Charge> = self.send(req).await?;
        Ok(output.result.with_derived_created_at())
    }

    async fn list_charges(
        &self,
        ctx: &CallerContext,
        input: &UidPagination,
    ) -> Result<Page<Charge>, LedgerError> {
        let req = self.request(ctx, Method::POST, "/v1/charge/list").json(input);
        let output: Envelope<Vec<Charge>> = self.send(req).await?;

        Ok(Page {
            items: output
                .result
                .into_iter()
                .map(Charge::with_derived_created_at)
                .collect(),
            next_page_token: output.next_page_token,
        })
    }

    async fn get_customer(
        &self,
        ctx: &CallerContext,
        uid: UserId,
        provider: &str,
    ) -> Result<CustomerLink, LedgerError> {
        let query = [
            ("uid", uid.to_string()),
            ("provider", provider.to_string()),
            ("fields", "customer".to_string()),
        ];
        let req = self.request(ctx, Method::GET, "/v1/customer").query(&query);
        let output: Envelope<CustomerOutput> = self.send(req).await?;
        Ok(output.result.into_link(uid, provider))
    }

    async fn upsert_customer(
        &self,
        ctx: &CallerContext,
        link: &CustomerLink,
    ) -> Result<CustomerLink, LedgerError> {
        let req = self.request(ctx, Method::POST, "/v1/customer").json(link);
        let output: Envelope<CustomerOutput> = self.send(req).await?;
        Ok(output.result.into_link(link.uid, &link.provider))
    }

    async fn list_currencies(&self, ctx: &CallerContext) -> Result<Vec<Currency>, LedgerError> {
        let req = self.request(ctx, Method::GET, "/currencies");
        let output: Envelope<Vec<Currency>> = self.send(req).await?;
        Ok(output.result)
    }

    async fn get_wallet(&self, ctx: &CallerContext, uid: UserId) -> Result<Wallet, LedgerError> {
        let req = self
            .request(ctx, Method::GET, "/v1/wallet")
            .query(&[("uid", uid.to_string())]);
        let output: Envelope<Wallet> = self.send(req).await?;
        Ok(output.result)
    }

    async fn sponsor(
        &self,
        ctx: &CallerContext,
        input: &ExpendInput,
    ) -> Result<Wallet, LedgerError> {
        let req = self
            .request(ctx, Method::POST, "/v1/wallet/sponsor")
            .json(input);
        let output: Envelope<Wallet> = self.send(req).await?;
        Ok(output.result)
    }
}
