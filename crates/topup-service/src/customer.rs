//! Provider customer reuse.

use std::sync::Arc;

use topup_core::{CustomerLink, UserId};

use crate::context::CallerContext;
use crate::ledger::{Ledger, LedgerError};

/// Reads and writes the (user, provider) → customer mapping.
#[derive(Clone)]
pub struct CustomerLinkage {
    ledger: Arc<dyn Ledger>,
}

impl CustomerLinkage {
    /// Create a linkage backed by the ledger.
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Find the provider customer for `uid`.
    ///
    /// Best effort: a missing link and a failed lookup both yield `None`,
    /// in which case the provider creates a new customer.
    pub async fn lookup(
        &self,
        ctx: &CallerContext,
        uid: UserId,
        provider: &str,
    ) -> Option<CustomerLink> {
        match self.ledger.get_customer(ctx, uid, provider).await {
            Ok(link) => Some(link),
            Err(LedgerError::NotFound(_)) => None,
            Err(e) => {
                tracing::warn!(
                    user_id = %uid,
                    provider = %provider,
                    error = %e,
                    "Customer lookup failed"
                );
                None
            }
        }
    }

    /// Create or replace the link.
    ///
    /// # Errors
    ///
    /// Returns the ledger failure converted to `TopupError`.
    pub async fn upsert(
        &self,
        ctx: &CallerContext,
        link: &CustomerLink,
    ) -> topup_core::Result<CustomerLink> {
        let stored = self.ledger.upsert_customer(ctx, link).await?;
        tracing::debug!(
            user_id = %stored.uid,
            provider = %stored.provider,
            customer = %stored.customer,
            "Customer link saved"
        );
        Ok(stored)
    }
}
