//! Provider webhook processing.
//!
//! A completion event is verified, parsed, settled through the
//! [`ChargeOrchestrator`], and then handed to a set of post-commit hooks.
//! Hook failures never turn a settled event into an error response: they
//! are logged and reported in [`WebhookOutcome::Settled`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use topup_core::{Charge, ChargeId, CustomerLink, Payload, TopupError, UserId};

use crate::audit::{AuditLog, AuditPayload, ACTION_USER_TOPUP, STATUS_FAILURE, STATUS_SUCCESS};
use crate::checkout::{ChargeOrchestrator, SettleRequest, Settlement};
use crate::context::CallerContext;
use crate::customer::CustomerLinkage;
use crate::stripe::{signature, CheckoutSession, StripeError, WebhookEvent};

/// Event type that triggers settlement.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// What a webhook delivery amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Verified, but not an event this service acts on.
    Ignored {
        /// The event's type.
        event_type: String,
    },
    /// A completion was settled (or had already been).
    Settled {
        /// The settled charge.
        charge: Charge,
        /// Whether this delivery credited the wallet.
        newly_settled: bool,
        /// Post-commit hooks that failed.
        hook_errors: Vec<HookError>,
    },
}

/// A failed post-commit hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError {
    /// Hook name.
    pub hook: &'static str,
    /// What went wrong.
    pub message: String,
}

/// Context handed to post-commit hooks.
#[derive(Debug, Clone)]
pub struct Committed {
    /// Context acting as the owning user.
    pub ctx: CallerContext,
    /// Owning user.
    pub uid: UserId,
    /// Charge named by the completion.
    pub charge_id: ChargeId,
    /// Settlement result; `None` if settlement failed.
    pub settlement: Option<Settlement>,
    /// The completed provider session.
    pub session: CheckoutSession,
}

/// Side effect that follows a settlement attempt.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    /// Name used in logs and [`HookError`].
    fn name(&self) -> &'static str;

    /// Run the hook.
    async fn run(&self, committed: &Committed) -> Result<(), String>;
}

// ============================================================================
// Hooks
// ============================================================================

/// Saves the provider customer so that later checkouts reuse it.
pub struct CustomerLinkHook {
    customers: CustomerLinkage,
    provider: &'static str,
}

impl CustomerLinkHook {
    /// Create the hook for `provider`.
    #[must_use]
    pub fn new(customers: CustomerLinkage, provider: &'static str) -> Self {
        Self {
            customers,
            provider,
        }
    }
}

#[async_trait]
impl PostCommitHook for CustomerLinkHook {
    fn name(&self) -> &'static str {
        "customer_link"
    }

    async fn run(&self, committed: &Committed) -> Result<(), String> {
        let session = &committed.session;
        let (Some(customer), Some(details)) = (&session.customer, &session.customer_details)
        else {
            return Ok(());
        };

        let mut snapshot = Vec::new();
        ciborium::into_writer(details, &mut snapshot).map_err(|e| e.to_string())?;

        let link = CustomerLink::new(committed.uid, self.provider, customer.clone())
            .with_payload(Payload::new(snapshot));
        self.customers
            .upsert(&committed.ctx, &link)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Records the top-up attempt in the audit log.
///
/// A new settlement is logged as a success and a failed settlement as a
/// failure. Replayed completions wrote nothing and are not logged again.
pub struct AuditLogHook {
    audit: Arc<dyn AuditLog>,
}

impl AuditLogHook {
    /// Create the hook.
    #[must_use]
    pub fn new(audit: Arc<dyn AuditLog>) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl PostCommitHook for AuditLogHook {
    fn name(&self) -> &'static str {
        "audit_log"
    }

    async fn run(&self, committed: &Committed) -> Result<(), String> {
        let (status, amount) = match &committed.settlement {
            Some(settlement) if !settlement.newly_settled => return Ok(()),
            Some(settlement) => (STATUS_SUCCESS, i64::from(settlement.charge.quantity)),
            None => (STATUS_FAILURE, 0),
        };

        let payload = AuditPayload {
            kind: "charge".to_string(),
            id: committed.charge_id.to_string(),
            payer: committed.uid,
            payee: None,
            amount,
        };
        self.audit
            .log(
                &committed.ctx,
                ACTION_USER_TOPUP,
                status,
                committed.uid,
                &payload,
            )
            .await
            .map_err(|e| e.to_string())
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Verifies and settles provider webhooks.
pub struct WebhookProcessor {
    secret: Option<String>,
    tolerance: Duration,
    orchestrator: Arc<ChargeOrchestrator>,
    hooks: Vec<Arc<dyn PostCommitHook>>,
}

impl WebhookProcessor {
    /// Create a processor.
    ///
    /// Without a signing secret every delivery is rejected.
    #[must_use]
    pub fn new(
        secret: Option<String>,
        tolerance: Duration,
        orchestrator: Arc<ChargeOrchestrator>,
        hooks: Vec<Arc<dyn PostCommitHook>>,
    ) -> Self {
        Self {
            secret,
            tolerance,
            orchestrator,
            hooks,
        }
    }

    /// Handle one delivery.
    ///
    /// # Errors
    ///
    /// - `TopupError::Authentication` if the signature does not verify;
    ///   nothing is parsed or written in that case
    /// - `TopupError::Validation` for a malformed event or metadata
    /// - any settlement error, so that the provider redelivers
    pub async fn handle(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
        incoming: &CallerContext,
    ) -> topup_core::Result<WebhookOutcome> {
        self.verify(raw_body, signature)?;

        let event: WebhookEvent = serde_json::from_slice(raw_body)
            .map_err(|e| TopupError::Validation(format!("invalid webhook event: {e}")))?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Received Stripe webhook"
        );

        if event.event_type != CHECKOUT_SESSION_COMPLETED {
            tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let object = event.data.object.get();
        let session: CheckoutSession = serde_json::from_str(object)
            .map_err(|e| TopupError::Validation(format!("invalid checkout session: {e}")))?;
        let (uid, charge_id) = correlation(&session)?;
        let ctx = incoming.impersonate(uid);

        let request = SettleRequest {
            uid,
            charge_id,
            provider_ref: session.id.clone(),
            currency: session
                .currency
                .clone()
                .ok_or_else(|| TopupError::Validation("session has no currency".into()))?,
            amount: session
                .amount_total
                .ok_or_else(|| TopupError::Validation("session has no amount_total".into()))?,
            payload: Payload::new(object.as_bytes().to_vec()),
        };

        let result = self.orchestrator.complete(&ctx, request).await;
        if let Err(e) = &result {
            tracing::warn!(
                event_id = %event.id,
                session_id = %session.id,
                charge_id = %charge_id,
                error = %e,
                retryable = e.is_retryable(),
                "Settlement failed"
            );
        }

        let committed = Committed {
            ctx,
            uid,
            charge_id,
            settlement: result.as_ref().ok().cloned(),
            session,
        };
        let hook_errors = self.run_hooks(&committed).await;

        let settlement = result?;
        Ok(WebhookOutcome::Settled {
            charge: settlement.charge,
            newly_settled: settlement.newly_settled,
            hook_errors,
        })
    }

    fn verify(&self, raw_body: &[u8], header: Option<&str>) -> topup_core::Result<()> {
        let Some(secret) = self.secret.as_deref() else {
            tracing::warn!("Stripe webhook secret not configured - rejecting webhook");
            return Err(TopupError::Authentication(
                "webhook secret not configured".into(),
            ));
        };
        let header = header
            .ok_or_else(|| TopupError::Authentication("missing Stripe signature".into()))?;

        signature::verify(
            raw_body,
            header,
            secret,
            self.tolerance,
            chrono::Utc::now().timestamp(),
        )
        .map_err(|e: StripeError| {
            tracing::warn!(error = %e, "Invalid Stripe webhook signature");
            TopupError::from(e)
        })
    }

    async fn run_hooks(&self, committed: &Committed) -> Vec<HookError> {
        let results = join_all(self.hooks.iter().map(|hook| async move {
            hook.run(committed).await.map_err(|message| HookError {
                hook: hook.name(),
                message,
            })
        }))
        .await;

        results
            .into_iter()
            .filter_map(Result::err)
            .inspect(|err| {
                tracing::warn!(
                    hook = %err.hook,
                    user_id = %committed.uid,
                    session_id = %committed.session.id,
                    error = %err.message,
                    "Post-commit hook failed"
                );
            })
            .collect()
    }
}

/// Owning user and charge named in the session metadata.
fn correlation(session: &CheckoutSession) -> topup_core::Result<(UserId, ChargeId)> {
    let field = |key: &str| {
        session
            .metadata
            .get(key)
            .ok_or_else(|| TopupError::Validation(format!("session metadata has no {key}")))
    };

    let uid: UserId = field("uid")?.parse()?;
    let charge_id: ChargeId = field("cid")?.parse()?;
    Ok((uid, charge_id))
}
