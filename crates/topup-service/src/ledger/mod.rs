//! Ledger ("walletbase") integration.
//!
//! The ledger owns charges, customers, currencies and wallets. This service
//! never writes a charge status without telling the ledger which status it
//! expects the charge to be in; the ledger rejects stale expectations with
//! a conflict. That conditional write is the only cross-instance
//! consistency mechanism.

pub mod client;
pub mod memory;
pub mod types;

use async_trait::async_trait;

use topup_core::{
    Charge, ChargeId, Currency, CustomerLink, TopupError, UserId, Wallet,
};

use crate::context::CallerContext;

pub use client::LedgerClient;
pub use memory::MemoryLedger;
pub use types::{
    ChargeInput, CompleteChargeInput, ExpendInput, Page, UidPagination, UpdateChargeInput,
    MAX_PAGE_SIZE, MAX_SPONSOR_AMOUNT, MIN_PAGE_SIZE, MIN_SPONSOR_AMOUNT,
};

/// Error type for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The ledger rejected a conditional write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The ledger returned an error.
    #[error("ledger API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<LedgerError> for TopupError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Conflict(msg) => Self::Conflict(msg),
            LedgerError::NotFound(msg) => Self::NotFound(msg),
            LedgerError::Api {
                status: 400,
                message,
            } => Self::Validation(message),
            other => Self::upstream("ledger", other.to_string()),
        }
    }
}

/// Operations consumed from the ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create a `Pending` charge.
    async fn create_charge(
        &self,
        ctx: &CallerContext,
        input: &ChargeInput,
    ) -> Result<Charge, LedgerError>;

    /// Conditionally update a charge.
    async fn update_charge(
        &self,
        ctx: &CallerContext,
        input: &UpdateChargeInput,
    ) -> Result<Charge, LedgerError>;

    /// Conditionally settle a charge, crediting the user's wallet.
    async fn complete_charge(
        &self,
        ctx: &CallerContext,
        input: &CompleteChargeInput,
    ) -> Result<Charge, LedgerError>;

    /// Read one charge.
    async fn get_charge(
        &self,
        ctx: &CallerContext,
        uid: UserId,
        id: ChargeId,
        fields: Option<&str>,
    ) -> Result<Charge, LedgerError>;

    /// List a user's charges, newest first.
    async fn list_charges(
        &self,
        ctx: &CallerContext,
        input: &UidPagination,
    ) -> Result<Page<Charge>, LedgerError>;

    /// Read the customer link for `(uid, provider)`.
    async fn get_customer(
        &self,
        ctx: &CallerContext,
        uid: UserId,
        provider: &str,
    ) -> Result<CustomerLink, LedgerError>;

    /// Create or replace a customer link.
    async fn upsert_customer(
        &self,
        ctx: &CallerContext,
        link: &CustomerLink,
    ) -> Result<CustomerLink, LedgerError>;

    /// The supported currency table.
    async fn list_currencies(&self, ctx: &CallerContext) -> Result<Vec<Currency>, LedgerError>;

    /// Read a user's wallet.
    async fn get_wallet(&self, ctx: &CallerContext, uid: UserId) -> Result<Wallet, LedgerError>;

    /// Move credits from the payer's wallet to the payee's; returns the
    /// payer's wallet.
    async fn sponsor(
        &self,
        ctx: &CallerContext,
        input: &ExpendInput,
    ) -> Result<Wallet, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_stay_conflicts() {
        let err: TopupError = LedgerError::Conflict("status changed".into()).into();
        assert_eq!(err, TopupError::Conflict("status changed".into()));
    }

    #[test]
    fn api_errors_become_upstream() {
        let err: TopupError = LedgerError::Api {
            status: 503,
            message: "unavailable".into(),
        }
        .into();
        assert!(matches!(err, TopupError::Upstream { service: "ledger", .. }));
    }

    #[test]
    fn rejected_requests_are_validation_errors() {
        let err: TopupError = LedgerError::Api {
            status: 400,
            message: "insufficient balance".into(),
        }
        .into();
        assert_eq!(err, TopupError::Validation("insufficient balance".into()));
    }
}
