//! Wallet reads and user-to-user sponsorship.

use std::sync::Arc;

use topup_core::{UserId, Wallet};

use crate::audit::{AuditLog, AuditPayload, ACTION_USER_SPONSOR, STATUS_SUCCESS};
use crate::context::CallerContext;
use crate::ledger::{ExpendInput, Ledger};

/// Wallet operations on behalf of the caller.
pub struct WalletService {
    ledger: Arc<dyn Ledger>,
    audit: Arc<dyn AuditLog>,
}

impl WalletService {
    /// Create the service.
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>, audit: Arc<dyn AuditLog>) -> Self {
        Self { ledger, audit }
    }

    /// The user's wallet with its level computed.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Upstream` if the ledger is unavailable.
    pub async fn get(&self, ctx: &CallerContext, uid: UserId) -> topup_core::Result<Wallet> {
        let wallet = self.ledger.get_wallet(ctx, uid).await?;
        Ok(wallet.with_level())
    }

    /// Move `input.amount` credits from `input.uid` to `input.payee`.
    ///
    /// Returns the payer's wallet after the transfer. The audit entry is
    /// best effort: a failed write is logged and the transfer still stands.
    ///
    /// # Errors
    ///
    /// - `TopupError::Validation` for an out-of-range amount, a self-transfer
    ///   or a balance the ledger refuses
    /// - `TopupError::Upstream` if the ledger is unavailable
    pub async fn sponsor(
        &self,
        ctx: &CallerContext,
        input: &ExpendInput,
    ) -> topup_core::Result<Wallet> {
        input.validate()?;

        let wallet = self.ledger.sponsor(ctx, input).await?.with_level();
        tracing::info!(
            user_id = %input.uid,
            payee = %input.payee,
            amount = %input.amount,
            txn = ?wallet.txn,
            "Sponsorship completed"
        );

        let payload = AuditPayload {
            kind: "transaction".to_string(),
            id: wallet.txn.map(|txn| txn.to_string()).unwrap_or_default(),
            payer: input.uid,
            payee: Some(input.payee),
            amount: input.amount,
        };
        if let Err(e) = self
            .audit
            .log(ctx, ACTION_USER_SPONSOR, STATUS_SUCCESS, input.uid, &payload)
            .await
        {
            tracing::warn!(user_id = %input.uid, error = %e, "Sponsorship audit failed");
        }

        Ok(wallet)
    }
}
