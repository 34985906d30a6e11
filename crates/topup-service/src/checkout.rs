//! Charge orchestration.
//!
//! Drives a charge through its lifecycle against the ledger:
//!
//! 1. `create` allocates a `Pending` charge.
//! 2. `attach_session` binds the provider session and moves it to
//!    `AwaitingPayment`.
//! 3. `complete` settles it once the provider reports payment, crediting
//!    the wallet exactly once.
//!
//! Every status write names the status the charge is expected to be in, so
//! concurrent instances racing on the same charge resolve through the
//! ledger's conflict response rather than double-writing.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use topup_core::{
    validate_quantity, Charge, ChargeId, ChargeStatus, CurrencyCatalog, Payload, TopupError,
    UserId,
};

use crate::context::CallerContext;
use crate::customer::CustomerLinkage;
use crate::ledger::{
    ChargeInput, CompleteChargeInput, Ledger, LedgerError, Page, UidPagination, UpdateChargeInput,
};
use crate::provider::{PaymentProvider, SessionParams};

/// Checkout settings taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct CheckoutSettings {
    /// Provider price every unit is billed at.
    pub price_id: String,
    /// Publishable key handed to clients.
    pub publishable_key: Option<String>,
    /// Where the provider redirects after payment.
    pub success_url: String,
}

/// Binding of a provider session to a `Pending` charge.
#[derive(Debug, Clone)]
pub struct AttachSession {
    /// Owning user.
    pub uid: UserId,
    /// Charge to bind.
    pub charge_id: ChargeId,
    /// Status the charge is expected to be in.
    pub expected: ChargeStatus,
    /// Provider session reference.
    pub session_ref: String,
    /// Session currency.
    pub currency: Option<String>,
    /// Session total in minor units.
    pub amount: Option<u64>,
    /// Session snapshot.
    pub payload: Payload,
}

/// A completion reported by the provider.
#[derive(Debug, Clone)]
pub struct SettleRequest {
    /// Owning user.
    pub uid: UserId,
    /// Charge being settled.
    pub charge_id: ChargeId,
    /// Provider session reference.
    pub provider_ref: String,
    /// Currency paid.
    pub currency: String,
    /// Amount paid in minor units.
    pub amount: u64,
    /// Completion snapshot.
    pub payload: Payload,
}

/// Result of a settlement attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    /// The charge after settlement.
    pub charge: Charge,
    /// `false` when the charge had already been settled by the same
    /// provider reference and nothing was written.
    pub newly_settled: bool,
}

/// Result of starting a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOutput {
    /// The charge created for this checkout.
    pub id: ChargeId,
    /// Hosted payment page to send the user to.
    pub payment_url: String,
}

/// Client-side checkout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutConfig {
    /// Payment backend tag.
    pub provider: String,
    /// Publishable key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Price of one unit, minor units.
    pub unit_amount: i64,
    /// Currency of `unit_amount`.
    pub currency: String,
}

/// Coordinates the ledger, the payment provider and the currency table.
#[derive(Clone)]
pub struct ChargeOrchestrator {
    ledger: Arc<dyn Ledger>,
    provider: Arc<dyn PaymentProvider>,
    customers: CustomerLinkage,
    catalog: Arc<CurrencyCatalog>,
    settings: CheckoutSettings,
}

impl ChargeOrchestrator {
    /// Create a new orchestrator.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn Ledger>,
        provider: Arc<dyn PaymentProvider>,
        catalog: Arc<CurrencyCatalog>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            customers: CustomerLinkage::new(Arc::clone(&ledger)),
            ledger,
            provider,
            catalog,
            settings,
        }
    }

    /// Customer linkage sharing this orchestrator's ledger.
    #[must_use]
    pub fn customers(&self) -> &CustomerLinkage {
        &self.customers
    }

    /// Name of the configured payment provider.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    /// Allocate a `Pending` charge.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Validation` for an out-of-range quantity, before
    /// the ledger is called.
    pub async fn create(
        &self,
        ctx: &CallerContext,
        uid: UserId,
        quantity: u32,
    ) -> topup_core::Result<Charge> {
        validate_quantity(quantity)?;

        let input = ChargeInput {
            uid,
            provider: self.provider.name().to_string(),
            quantity,
        };
        let charge = self.ledger.create_charge(ctx, &input).await?;

        tracing::info!(
            user_id = %uid,
            charge_id = %charge.id,
            quantity = %quantity,
            "Charge created"
        );

        Ok(charge.with_derived_created_at())
    }

    /// Bind a provider session and move the charge to `AwaitingPayment`.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Conflict` if the charge is no longer in
    /// `attach.expected`, or if that status cannot lead to `AwaitingPayment`.
    pub async fn attach_session(
        &self,
        ctx: &CallerContext,
        attach: AttachSession,
    ) -> topup_core::Result<Charge> {
        attach
            .expected
            .ensure_transition(ChargeStatus::AwaitingPayment)?;

        let input = UpdateChargeInput {
            currency: attach.currency,
            amount: attach.amount,
            charge_id: Some(attach.session_ref.clone()),
            charge_payload: Some(attach.payload),
            ..UpdateChargeInput::transition(
                attach.uid,
                attach.charge_id,
                attach.expected,
                ChargeStatus::AwaitingPayment,
            )
        };
        let charge = self.ledger.update_charge(ctx, &input).await?;

        tracing::info!(
            user_id = %attach.uid,
            charge_id = %attach.charge_id,
            session_id = %attach.session_ref,
            "Checkout session attached"
        );

        Ok(charge.with_derived_created_at())
    }

    /// Move the charge to `Failed`.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Conflict` if the charge is no longer in
    /// `expected`, or if that status cannot fail.
    pub async fn fail(
        &self,
        ctx: &CallerContext,
        uid: UserId,
        charge_id: ChargeId,
        expected: ChargeStatus,
        code: &str,
        message: &str,
    ) -> topup_core::Result<Charge> {
        expected.ensure_transition(ChargeStatus::Failed)?;

        let input = UpdateChargeInput {
            failure_code: Some(code.to_string()),
            failure_msg: Some(message.to_string()),
            ..UpdateChargeInput::transition(uid, charge_id, expected, ChargeStatus::Failed)
        };
        let charge = self.ledger.update_charge(ctx, &input).await?;

        tracing::warn!(
            user_id = %uid,
            charge_id = %charge_id,
            failure_code = %code,
            "Charge failed"
        );

        Ok(charge.with_derived_created_at())
    }

    /// Settle a charge reported paid by the provider.
    ///
    /// Repeating a completion that already settled the charge succeeds
    /// without writing anything.
    ///
    /// # Errors
    ///
    /// - `TopupError::Conflict` if the charge is not awaiting payment (or was
    ///   settled by a different reference)
    /// - `TopupError::Mismatch` if the report disagrees with the attached
    ///   session
    pub async fn complete(
        &self,
        ctx: &CallerContext,
        request: SettleRequest,
    ) -> topup_core::Result<Settlement> {
        let charge = self
            .ledger
            .get_charge(ctx, request.uid, request.charge_id, None)
            .await?
            .with_derived_created_at();

        match charge.status {
            ChargeStatus::Completed if charge.is_settled_by(&request.provider_ref) => {
                tracing::info!(
                    charge_id = %charge.id,
                    session_id = %request.provider_ref,
                    "Charge already settled"
                );
                return Ok(Settlement {
                    charge,
                    newly_settled: false,
                });
            }
            ChargeStatus::AwaitingPayment => {}
            ChargeStatus::Pending => {
                return Err(TopupError::Conflict(format!(
                    "charge {} has no attached session yet",
                    charge.id
                )));
            }
            status => {
                return Err(TopupError::Conflict(format!(
                    "charge {} is {status:?}",
                    charge.id
                )));
            }
        }

        verify_attached(&charge, &request)?;

        let input = CompleteChargeInput {
            uid: request.uid,
            id: request.charge_id,
            current_status: ChargeStatus::AwaitingPayment,
            currency: request.currency.clone(),
            amount: request.amount,
            charge_id: request.provider_ref.clone(),
            charge_payload: request.payload,
        };

        match self.ledger.complete_charge(ctx, &input).await {
            Ok(charge) => {
                tracing::info!(
                    user_id = %request.uid,
                    charge_id = %charge.id,
                    session_id = %request.provider_ref,
                    quantity = %charge.quantity,
                    txn = ?charge.txn,
                    "Charge settled"
                );
                Ok(Settlement {
                    charge: charge.with_derived_created_at(),
                    newly_settled: true,
                })
            }
            Err(LedgerError::Conflict(msg)) => {
                let current = self
                    .ledger
                    .get_charge(ctx, request.uid, request.charge_id, None)
                    .await?
                    .with_derived_created_at();

                if current.is_settled_by(&request.provider_ref) {
                    tracing::info!(
                        charge_id = %current.id,
                        session_id = %request.provider_ref,
                        "Charge settled concurrently"
                    );
                    Ok(Settlement {
                        charge: current,
                        newly_settled: false,
                    })
                } else {
                    Err(TopupError::Conflict(msg))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Flows
    // ========================================================================

    /// Start a checkout: create a charge and open a provider session for it.
    ///
    /// # Errors
    ///
    /// - `TopupError::Validation` for an unsupported currency or bad quantity
    /// - `TopupError::Upstream` if the provider session cannot be opened; the
    ///   charge is marked failed
    pub async fn checkout(
        &self,
        ctx: &CallerContext,
        uid: UserId,
        quantity: u32,
        currency: Option<&str>,
    ) -> topup_core::Result<CheckoutOutput> {
        let currency = currency
            .map(|code| {
                self.catalog
                    .validate(code)
                    .map(|c| c.alpha.to_ascii_lowercase())
            })
            .transpose()?;

        let charge = self.create(ctx, uid, quantity).await?;

        let customer = self
            .customers
            .lookup(ctx, uid, self.provider.name())
            .await
            .map(|link| link.customer);

        let params = SessionParams {
            success_url: self.settings.success_url.clone(),
            price_id: self.settings.price_id.clone(),
            quantity,
            currency,
            customer,
            metadata: BTreeMap::from([
                ("uid".to_string(), uid.to_string()),
                ("cid".to_string(), charge.id.to_string()),
            ]),
        };

        let session = match self.provider.create_checkout_session(&params).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(
                    user_id = %uid,
                    charge_id = %charge.id,
                    error = %e,
                    "Failed to open checkout session"
                );
                if let Err(fail_err) = self
                    .fail(
                        ctx,
                        uid,
                        charge.id,
                        ChargeStatus::Pending,
                        "session_failed",
                        &e.to_string(),
                    )
                    .await
                {
                    tracing::warn!(
                        charge_id = %charge.id,
                        error = %fail_err,
                        "Could not mark charge failed"
                    );
                }
                return Err(e);
            }
        };

        self.attach_session(
            ctx,
            AttachSession {
                uid,
                charge_id: charge.id,
                expected: ChargeStatus::Pending,
                session_ref: session.id,
                currency: session.currency,
                amount: session.amount_total,
                payload: session.payload,
            },
        )
        .await?;

        Ok(CheckoutOutput {
            id: charge.id,
            payment_url: session.url,
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Read one of the user's charges.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::NotFound` if the charge does not exist or belongs
    /// to someone else.
    pub async fn get(
        &self,
        ctx: &CallerContext,
        uid: UserId,
        id: ChargeId,
        fields: Option<&str>,
    ) -> topup_core::Result<Charge> {
        let charge = self.ledger.get_charge(ctx, uid, id, fields).await?;
        Ok(charge.with_derived_created_at().without_payload())
    }

    /// List the user's charges, newest first.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Validation` for an out-of-range page size.
    pub async fn list(
        &self,
        ctx: &CallerContext,
        uid: UserId,
        mut pagination: UidPagination,
    ) -> topup_core::Result<Page<Charge>> {
        pagination.validate()?;
        pagination.uid = Some(uid);

        let page = self.ledger.list_charges(ctx, &pagination).await?;
        Ok(Page {
            items: page
                .items
                .into_iter()
                .map(|c| c.with_derived_created_at().without_payload())
                .collect(),
            next_page_token: page.next_page_token,
        })
    }

    /// Provider configuration for client-side checkout.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Upstream` if the configured price cannot be read.
    pub async fn config(&self) -> topup_core::Result<CheckoutConfig> {
        let price = self.provider.get_price(&self.settings.price_id).await?;

        Ok(CheckoutConfig {
            provider: self.provider.name().to_string(),
            public_key: self.settings.publishable_key.clone(),
            unit_amount: price.unit_amount,
            currency: price.currency,
        })
    }
}

/// Check a completion against what was attached when the session opened.
fn verify_attached(charge: &Charge, request: &SettleRequest) -> topup_core::Result<()> {
    let mismatch = if charge.charge_id.as_deref() != Some(request.provider_ref.as_str()) {
        Some(TopupError::Mismatch {
            field: "charge_id",
            attached: charge.charge_id.clone().unwrap_or_default(),
            reported: request.provider_ref.clone(),
        })
    } else if let Some(attached) = charge
        .currency
        .as_deref()
        .filter(|c| !c.eq_ignore_ascii_case(&request.currency))
    {
        Some(TopupError::Mismatch {
            field: "currency",
            attached: attached.to_string(),
            reported: request.currency.clone(),
        })
    } else if let Some(attached) = charge.amount.filter(|a| *a != request.amount) {
        Some(TopupError::Mismatch {
            field: "amount",
            attached: attached.to_string(),
            reported: request.amount.to_string(),
        })
    } else {
        None
    };

    match mismatch {
        Some(err) => {
            tracing::error!(
                user_id = %request.uid,
                charge_id = %charge.id,
                session_id = %request.provider_ref,
                error = %err,
                "Settlement does not match attached session"
            );
            Err(err)
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use topup_core::{Currency, CustomerLink};

    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::provider::{Price, ProviderSession};

    #[derive(Default)]
    struct FakeProvider {
        fail: AtomicBool,
        seen: Mutex<Vec<SessionParams>>,
    }

    #[async_trait]
    impl PaymentProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "stripe"
        }

        async fn create_checkout_session(
            &self,
            params: &SessionParams,
        ) -> topup_core::Result<ProviderSession> {
            self.seen.lock().unwrap().push(params.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(TopupError::upstream("stripe", "card network down"));
            }
            Ok(ProviderSession {
                id: format!("cs_{}", params.metadata["cid"]),
                url: "https://pay.example/cs".into(),
                currency: params.currency.clone().or_else(|| Some("hkd".into())),
                amount_total: Some(u64::from(params.quantity) * 100),
                payload: Payload::new(b"session".to_vec()),
            })
        }

        async fn get_price(&self, _price_id: &str) -> topup_core::Result<Price> {
            Ok(Price {
                unit_amount: 100,
                currency: "hkd".into(),
            })
        }
    }

    fn currencies() -> Vec<Currency> {
        vec![Currency {
            name: "Hong Kong Dollar".into(),
            alpha: "HKD".into(),
            decimals: 2,
            code: 344,
            exchange_rate: 0.0,
        }]
    }

    fn setup() -> (Arc<MemoryLedger>, Arc<FakeProvider>, ChargeOrchestrator) {
        let ledger = Arc::new(MemoryLedger::with_currencies(currencies()));
        let provider = Arc::new(FakeProvider::default());
        let orchestrator = ChargeOrchestrator::new(
            ledger.clone(),
            provider.clone(),
            Arc::new(CurrencyCatalog::new(currencies())),
            CheckoutSettings {
                price_id: "price_1".into(),
                publishable_key: Some("pk_test".into()),
                success_url: "https://example.com/done".into(),
            },
        );
        (ledger, provider, orchestrator)
    }

    fn settle(uid: UserId, charge_id: ChargeId, quantity: u64) -> SettleRequest {
        SettleRequest {
            uid,
            charge_id,
            provider_ref: format!("cs_{charge_id}"),
            currency: "HKD".into(),
            amount: quantity * 100,
            payload: Payload::new(b"event".to_vec()),
        }
    }

    #[tokio::test]
    async fn out_of_range_quantity_never_reaches_ledger() {
        let (ledger, _, orchestrator) = setup();
        let ctx = CallerContext::default();

        let err = orchestrator
            .create(&ctx, UserId::generate(), 49)
            .await
            .unwrap_err();
        assert!(matches!(err, TopupError::Validation(_)));
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn checkout_attaches_session() {
        let (ledger, provider, orchestrator) = setup();
        let uid = UserId::generate();
        let ctx = CallerContext::default();

        let out = orchestrator
            .checkout(&ctx, uid, 200, Some("hkd"))
            .await
            .unwrap();
        assert_eq!(out.payment_url, "https://pay.example/cs");

        let charge = ledger.charge(out.id).await.unwrap();
        assert_eq!(charge.status, ChargeStatus::AwaitingPayment);
        assert_eq!(charge.charge_id, Some(format!("cs_{}", out.id)));
        assert_eq!(charge.amount, Some(20_000));

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].currency.as_deref(), Some("hkd"));
        assert_eq!(seen[0].customer, None);
        assert_eq!(seen[0].metadata["uid"], uid.to_string());
    }

    #[tokio::test]
    async fn checkout_reuses_known_customer() {
        let (ledger, provider, orchestrator) = setup();
        let uid = UserId::generate();
        ledger
            .insert_customer(CustomerLink::new(uid, "stripe", "cus_9"))
            .await;

        orchestrator
            .checkout(&CallerContext::default(), uid, 100, None)
            .await
            .unwrap();

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].customer.as_deref(), Some("cus_9"));
        assert_eq!(seen[0].currency, None);
    }

    #[tokio::test]
    async fn unsupported_currency_is_rejected_first() {
        let (ledger, _, orchestrator) = setup();

        let err = orchestrator
            .checkout(&CallerContext::default(), UserId::generate(), 100, Some("zzz"))
            .await
            .unwrap_err();
        assert_eq!(err, TopupError::Validation("currency ZZZ not supported".into()));
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_marks_charge_failed() {
        let (ledger, provider, orchestrator) = setup();
        provider.fail.store(true, Ordering::SeqCst);
        let uid = UserId::generate();
        let ctx = CallerContext::default();

        let err = orchestrator.checkout(&ctx, uid, 100, None).await.unwrap_err();
        assert!(matches!(err, TopupError::Upstream { service: "stripe", .. }));

        let page = orchestrator
            .list(&ctx, uid, UidPagination::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].status, ChargeStatus::Failed);
        assert_eq!(page.items[0].failure_code.as_deref(), Some("session_failed"));
        assert_eq!(ledger.settlements(), 0);
    }

    #[tokio::test]
    async fn repeated_completion_settles_once() {
        let (ledger, _, orchestrator) = setup();
        let uid = UserId::generate();
        let ctx = CallerContext::default();
        let out = orchestrator.checkout(&ctx, uid, 100, None).await.unwrap();

        let first = orchestrator
            .complete(&ctx, settle(uid, out.id, 100))
            .await
            .unwrap();
        assert!(first.newly_settled);
        assert!(first.charge.txn.is_some());

        let second = orchestrator
            .complete(&ctx, settle(uid, out.id, 100))
            .await
            .unwrap();
        assert!(!second.newly_settled);
        assert_eq!(second.charge.txn, first.charge.txn);
        assert_eq!(ledger.settlements(), 1);

        let wallet = ledger.get_wallet(&ctx, uid).await.unwrap().with_level();
        assert_eq!(wallet.credits, 100);
        assert_eq!(wallet.level, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_completions_settle_once() {
        let (ledger, _, orchestrator) = setup();
        let orchestrator = Arc::new(orchestrator);
        let uid = UserId::generate();
        let ctx = CallerContext::default();
        let id = orchestrator.checkout(&ctx, uid, 100, None).await.unwrap().id;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    orchestrator
                        .complete(&CallerContext::default(), settle(uid, id, 100))
                        .await
                })
            })
            .collect();

        let mut newly = 0;
        for task in tasks {
            let settlement = task.await.unwrap().unwrap();
            assert_eq!(settlement.charge.status, ChargeStatus::Completed);
            if settlement.newly_settled {
                newly += 1;
            }
        }

        assert_eq!(newly, 1);
        assert_eq!(ledger.settlements(), 1);
    }

    #[tokio::test]
    async fn stale_attach_after_completion_conflicts() {
        let (ledger, _, orchestrator) = setup();
        let uid = UserId::generate();
        let ctx = CallerContext::default();
        let out = orchestrator.checkout(&ctx, uid, 100, None).await.unwrap();
        orchestrator
            .complete(&ctx, settle(uid, out.id, 100))
            .await
            .unwrap();

        let err = orchestrator
            .attach_session(
                &ctx,
                AttachSession {
                    uid,
                    charge_id: out.id,
                    expected: ChargeStatus::Pending,
                    session_ref: format!("cs_{}", out.id),
                    currency: None,
                    amount: None,
                    payload: Payload::default(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TopupError::Conflict(_)));
        assert_eq!(
            ledger.charge(out.id).await.unwrap().status,
            ChargeStatus::Completed
        );
    }

    #[tokio::test]
    async fn pending_charge_cannot_complete() {
        let (_, _, orchestrator) = setup();
        let uid = UserId::generate();
        let ctx = CallerContext::default();
        let charge = orchestrator.create(&ctx, uid, 100).await.unwrap();

        let err = orchestrator
            .complete(&ctx, settle(uid, charge.id, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, TopupError::Conflict(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn amount_mismatch_is_reported() {
        let (ledger, _, orchestrator) = setup();
        let uid = UserId::generate();
        let ctx = CallerContext::default();
        let out = orchestrator.checkout(&ctx, uid, 100, None).await.unwrap();

        let mut request = settle(uid, out.id, 100);
        request.amount = 1;
        let err = orchestrator.complete(&ctx, request).await.unwrap_err();

        assert_eq!(
            err,
            TopupError::Mismatch {
                field: "amount",
                attached: "10000".into(),
                reported: "1".into(),
            }
        );
        assert_eq!(ledger.settlements(), 0);
    }

    #[tokio::test]
    async fn currency_comparison_ignores_case() {
        let (_, _, orchestrator) = setup();
        let uid = UserId::generate();
        let ctx = CallerContext::default();
        let out = orchestrator
            .checkout(&ctx, uid, 100, Some("HKD"))
            .await
            .unwrap();

        let mut request = settle(uid, out.id, 100);
        request.currency = "Hkd".into();
        assert!(orchestrator.complete(&ctx, request).await.is_ok());
    }

    #[tokio::test]
    async fn different_reference_on_completed_charge_conflicts() {
        let (_, _, orchestrator) = setup();
        let uid = UserId::generate();
        let ctx = CallerContext::default();
        let out = orchestrator.checkout(&ctx, uid, 100, None).await.unwrap();
        orchestrator
            .complete(&ctx, settle(uid, out.id, 100))
            .await
            .unwrap();

        let mut request = settle(uid, out.id, 100);
        request.provider_ref = "cs_other".into();
        let err = orchestrator.complete(&ctx, request).await.unwrap_err();
        assert!(matches!(err, TopupError::Conflict(_)));
    }

    #[tokio::test]
    async fn reads_strip_payload_and_validate_page_size() {
        let (_, _, orchestrator) = setup();
        let uid = UserId::generate();
        let ctx = CallerContext::default();
        let out = orchestrator.checkout(&ctx, uid, 100, None).await.unwrap();

        let charge = orchestrator.get(&ctx, uid, out.id, None).await.unwrap();
        assert!(charge.charge_payload.is_none());
        assert_eq!(charge.created_at, out.id.created_at_ms());

        let err = orchestrator
            .list(
                &ctx,
                uid,
                UidPagination {
                    page_size: Some(4),
                    ..UidPagination::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TopupError::Validation(_)));
    }

    #[tokio::test]
    async fn config_reports_price() {
        let (_, _, orchestrator) = setup();
        let config = orchestrator.config().await.unwrap();
        assert_eq!(config.provider, "stripe");
        assert_eq!(config.public_key.as_deref(), Some("pk_test"));
        assert_eq!(config.unit_amount, 100);
    }
}
