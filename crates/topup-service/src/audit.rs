//! Audit log ("logbase") integration.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use topup_core::{Payload, UserId};

use crate::context::CallerContext;

/// Action recorded when a top-up is credited.
pub const ACTION_USER_TOPUP: &str = "user.topup";

/// Action recorded when a user sponsors another user.
pub const ACTION_USER_SPONSOR: &str = "user.sponsor";

/// Status value for a successful action.
pub const STATUS_SUCCESS: i8 = 1;

/// Status value for an attempted action that failed.
pub const STATUS_FAILURE: i8 = -1;

/// Error type for audit log writes.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The audit service returned an error.
    #[error("audit API error: {status}")]
    Api {
        /// HTTP status code.
        status: u16,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Structured payload of an audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditPayload {
    /// Kind of the referenced entity, e.g. `"charge"`.
    pub kind: String,
    /// Id of the referenced entity.
    pub id: String,
    /// User who paid.
    pub payer: UserId,
    /// User who received, for transfers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee: Option<UserId>,
    /// Units involved.
    pub amount: i64,
}

/// Sink for audit entries.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record `action` for `uid`.
    async fn log(
        &self,
        ctx: &CallerContext,
        action: &str,
        status: i8,
        uid: UserId,
        payload: &AuditPayload,
    ) -> Result<(), AuditError>;
}

#[derive(Debug, Serialize)]
struct LogInput<'a> {
    uid: UserId,
    action: &'a str,
    status: i8,
    payload: Payload,
}

/// Audit service REST client.
#[derive(Debug, Clone)]
pub struct HttpAuditLog {
    client: Client,
    base_url: String,
}

impl HttpAuditLog {
    /// Create a new audit client.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuditError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AuditLog for HttpAuditLog {
    async fn log(
        &self,
        ctx: &CallerContext,
        action: &str,
        status: i8,
        uid: UserId,
        payload: &AuditPayload,
    ) -> Result<(), AuditError> {
        let mut encoded = Vec::new();
        ciborium::into_writer(payload, &mut encoded)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        let input = LogInput {
            uid,
            action,
            status,
            payload: Payload::new(encoded),
        };

        let mut req = self
            .client
            .post(format!("{}/v1/log", self.base_url))
            .json(&input);
        for (name, value) in ctx.headers() {
            req = req.header(name, value);
        }

        let response = req.send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuditError::Api {
                status: response.status().as_u16(),
            })
        }
    }
}

/// Writes audit entries to the service log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn log(
        &self,
        _ctx: &CallerContext,
        action: &str,
        status: i8,
        uid: UserId,
        payload: &AuditPayload,
    ) -> Result<(), AuditError> {
        tracing::info!(
            action = %action,
            status = %status,
            user_id = %uid,
            kind = %payload.kind,
            id = %payload.id,
            payee = ?payload.payee,
            amount = %payload.amount,
            "Audit entry"
        );
        Ok(())
    }
}
