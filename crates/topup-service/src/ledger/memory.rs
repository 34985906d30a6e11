//! In-process ledger.
//!
//! Implements the same conditional-write rules as the ledger service so
//! the orchestration logic can be exercised without a network. Used by the
//! test harness and for local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use topup_core::{
    Charge, ChargeId, ChargeStatus, Currency, CustomerLink, Payload, TxnId, UserId, Wallet,
};

use super::types::{
    ChargeInput, CompleteChargeInput, ExpendInput, Page, UidPagination, UpdateChargeInput,
};
use super::{Ledger, LedgerError};
use crate::context::CallerContext;

const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Default)]
struct Inner {
    charges: HashMap<ChargeId, Charge>,
    customers: HashMap<(UserId, String), CustomerLink>,
    wallets: HashMap<UserId, Wallet>,
    currencies: Vec<Currency>,
}

/// `HashMap`-backed implementation of [`Ledger`].
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: RwLock<Inner>,
    calls: AtomicUsize,
    settlements: AtomicUsize,
    fail_customer_upserts: AtomicBool,
}

impl MemoryLedger {
    /// An empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty ledger that knows `currencies`.
    #[must_use]
    pub fn with_currencies(currencies: Vec<Currency>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                currencies,
                ..Inner::default()
            }),
            ..Self::default()
        }
    }

    /// Number of ledger operations served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of settlements, i.e. wallet credits, applied so far.
    pub fn settlements(&self) -> usize {
        self.settlements.load(Ordering::SeqCst)
    }

    /// Make every subsequent `upsert_customer` fail.
    pub fn fail_customer_upserts(&self, fail: bool) {
        self.fail_customer_upserts.store(fail, Ordering::SeqCst);
    }

    /// Read a charge without going through the trait.
    pub async fn charge(&self, id: ChargeId) -> Option<Charge> {
        self.inner.read().await.charges.get(&id).cloned()
    }

    /// Read a stored customer link.
    pub async fn customer(&self, uid: UserId, provider: &str) -> Option<CustomerLink> {
        self.inner
            .read()
            .await
            .customers
            .get(&(uid, provider.to_string()))
            .cloned()
    }

    /// Store a customer link directly.
    pub async fn insert_customer(&self, link: CustomerLink) {
        self.inner
            .write()
            .await
            .customers
            .insert((link.uid, link.provider.clone()), link);
    }

    /// Grant `amount` award credits to `uid`.
    pub async fn fund(&self, uid: UserId, amount: i64) {
        let mut inner = self.inner.write().await;
        let wallet = inner.wallets.entry(uid).or_default();
        wallet.sequence += 1;
        wallet.award += amount;
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn owned_charge<'a>(
    charges: &'a mut HashMap<ChargeId, Charge>,
    uid: UserId,
    id: ChargeId,
) -> Result<&'a mut Charge, LedgerError> {
    charges
        .get_mut(&id)
        .filter(|c| c.uid == Some(uid))
        .ok_or_else(|| LedgerError::NotFound(format!("charge {id}")))
}

fn expect_status(charge: &Charge, expected: ChargeStatus) -> Result<(), LedgerError> {
    if charge.status == expected {
        Ok(())
    } else {
        Err(LedgerError::Conflict(format!(
            "charge {} is {:?}, expected {expected:?}",
            charge.id, charge.status
        )))
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn create_charge(
        &self,
        _ctx: &CallerContext,
        input: &ChargeInput,
    ) -> Result<Charge, LedgerError> {
        self.record_call();
        let charge = Charge::pending(
            ChargeId::generate(),
            input.uid,
            input.provider.clone(),
            input.quantity,
        );
        self.inner
            .write()
            .await
            .charges
            .insert(charge.id, charge.clone());
        Ok(charge)
    }

    async fn update_charge(
        &self,
        _ctx: &CallerContext,
        input: &UpdateChargeInput,
    ) -> Result<Charge, LedgerError> {
        self.record_call();
        let mut inner = self.inner.write().await;
        let charge = owned_charge(&mut inner.charges, input.uid, input.id)?;

        expect_status(charge, input.current_status)?;
        if !input.current_status.can_transition_to(input.status) {
            return Err(LedgerError::Conflict(format!(
                "charge {} cannot move from {:?} to {:?}",
                charge.id, input.current_status, input.status
            )));
        }
        if let (Some(existing), Some(new)) = (&charge.charge_id, &input.charge_id) {
            if existing != new {
                return Err(LedgerError::Conflict(format!(
                    "charge {} already bound to {existing}",
                    charge.id
                )));
            }
        }

        charge.status = input.status;
        if input.currency.is_some() {
            charge.currency.clone_from(&input.currency);
        }
        if input.amount.is_some() {
            charge.amount = input.amount;
        }
        if input.charge_id.is_some() {
            charge.charge_id.clone_from(&input.charge_id);
        }
        if input.charge_payload.is_some() {
            charge.charge_payload.clone_from(&input.charge_payload);
        }
        if input.status == ChargeStatus::Failed {
            charge.failure_code.clone_from(&input.failure_code);
            charge.failure_msg.clone_from(&input.failure_msg);
        }
        charge.updated_at = Some(now_ms());

        Ok(charge.clone())
    }

    async fn complete_charge(
        &self,
        _ctx: &CallerContext,
        input: &CompleteChargeInput,
    ) -> Result<Charge, LedgerError> {
        self.record_call();
        let mut inner = self.inner.write().await;
        let charge = owned_charge(&mut inner.charges, input.uid, input.id)?;

        expect_status(charge, input.current_status)?;
        if charge.charge_id.as_deref() != Some(input.charge_id.as_str()) {
            return Err(LedgerError::Conflict(format!(
                "charge {} is not bound to {}",
                charge.id, input.charge_id
            )));
        }

        let txn = TxnId::generate();
        charge.status = ChargeStatus::Completed;
        charge.txn = Some(txn);
        charge.charge_payload = Some(input.charge_payload.clone());
        charge.updated_at = Some(now_ms());
        let charge = charge.clone();

        let wallet = inner.wallets.entry(input.uid).or_default();
        wallet.sequence += 1;
        wallet.topup += i64::from(charge.quantity);
        wallet.credits += u64::from(charge.quantity);
        wallet.txn = Some(txn);

        self.settlements.fetch_add(1, Ordering::SeqCst);
        Ok(charge)
    }

    async fn get_charge(
        &self,
        _ctx: &CallerContext,
        uid: UserId,
        id: ChargeId,
        _fields: Option<&str>,
    ) -> Result<Charge, LedgerError> {
        self.record_call();
        let mut inner = self.inner.write().await;
        owned_charge(&mut inner.charges, uid, id).map(|c| c.clone())
    }

    async fn list_charges(
        &self,
        _ctx: &CallerContext,
        input: &UidPagination,
    ) -> Result<Page<Charge>, LedgerError> {
        self.record_call();
        let uid = input
            .uid
            .ok_or_else(|| LedgerError::Api {
                status: 400,
                message: "uid is required".into(),
            })?;
        let before: Option<ChargeId> = match &input.page_token {
            Some(token) => Some(
                std::str::from_utf8(token.as_bytes())
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| LedgerError::Api {
                        status: 400,
                        message: "invalid page_token".into(),
                    })?,
            ),
            None => None,
        };
        let size = input.page_size.map_or(DEFAULT_PAGE_SIZE, usize::from);

        let inner = self.inner.read().await;
        let mut charges: Vec<Charge> = inner
            .charges
            .values()
            .filter(|c| c.uid == Some(uid))
            .filter(|c| input.status.map_or(true, |s| c.status == s))
            .filter(|c| before.map_or(true, |b| c.id < b))
            .cloned()
            .collect();
        charges.sort_by(|a, b| b.id.cmp(&a.id));

        let next_page_token = if charges.len() > size {
            charges.truncate(size);
            charges
                .last()
                .map(|c| Payload::new(c.id.to_string().into_bytes()))
        } else {
            None
        };

        Ok(Page {
            items: charges,
            next_page_token,
        })
    }

    async fn get_customer(
        &self,
        _ctx: &CallerContext,
        uid: UserId,
        provider: &str,
    ) -> Result<CustomerLink, LedgerError> {
        self.record_call();
        self.customer(uid, provider)
            .await
            .ok_or_else(|| LedgerError::NotFound(format!("customer for {uid}/{provider}")))
    }

    async fn upsert_customer(
        &self,
        _ctx: &CallerContext,
        link: &CustomerLink,
    ) -> Result<CustomerLink, LedgerError> {
        self.record_call();
        if self.fail_customer_upserts.load(Ordering::SeqCst) {
            return Err(LedgerError::Api {
                status: 500,
                message: "customer store unavailable".into(),
            });
        }

        let now = now_ms();
        let mut inner = self.inner.write().await;
        let key = (link.uid, link.provider.clone());
        let created_at = inner
            .customers
            .get(&key)
            .and_then(|c| c.created_at)
            .unwrap_or(now);
        let stored = CustomerLink {
            created_at: Some(created_at),
            updated_at: Some(now),
            ..link.clone()
        };
        inner.customers.insert(key, stored.clone());
        Ok(stored)
    }

    async fn list_currencies(&self, _ctx: &CallerContext) -> Result<Vec<Currency>, LedgerError> {
        self.record_call();
        Ok(self.inner.read().await.currencies.clone())
    }

    async fn get_wallet(&self, _ctx: &CallerContext, uid: UserId) -> Result<Wallet, LedgerError> {
        self.record_call();
        let inner = self.inner.read().await;
        Ok(inner.wallets.get(&uid).cloned().unwrap_or_default())
    }

    async fn sponsor(
        &self,
        _ctx: &CallerContext,
        input: &ExpendInput,
    ) -> Result<Wallet, LedgerError> {
        self.record_call();
        let mut inner = self.inner.write().await;

        let payer = inner.wallets.entry(input.uid).or_default();
        if payer.award + payer.topup + payer.income < input.amount {
            return Err(LedgerError::Api {
                status: 400,
                message: "insufficient balance".into(),
            });
        }

        // Spend award credits first, then bought ones, then income.
        let txn = TxnId::generate();
        let mut due = input.amount;
        for balance in [&mut payer.award, &mut payer.topup, &mut payer.income] {
            let spent = due.min(*balance);
            *balance -= spent;
            due -= spent;
        }
        payer.sequence += 1;
        payer.txn = Some(txn);
        let paid = payer.clone();

        let payee = inner.wallets.entry(input.payee).or_default();
        payee.sequence += 1;
        payee.income += input.amount;
        payee.credits += input.amount.unsigned_abs();
        payee.txn = Some(txn);

        Ok(paid)
    }
}
