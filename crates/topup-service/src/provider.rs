//! Payment provider seam.

use std::collections::BTreeMap;

use async_trait::async_trait;

use topup_core::{Payload, Result};

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Where the provider sends the user after paying.
    pub success_url: String,
    /// Provider price the quantity is multiplied by.
    pub price_id: String,
    /// Units to buy.
    pub quantity: u32,
    /// Lower-case currency to charge in; provider default when `None`.
    pub currency: Option<String>,
    /// Existing provider customer to reuse. When `None` the provider is
    /// asked to always create one.
    pub customer: Option<String>,
    /// Correlation metadata echoed back on the completion event.
    pub metadata: BTreeMap<String, String>,
}

/// A session opened by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSession {
    /// Provider reference, stored as the charge's `charge_id`.
    pub id: String,
    /// Hosted payment page.
    pub url: String,
    /// Currency the session charges in.
    pub currency: Option<String>,
    /// Total in minor units.
    pub amount_total: Option<u64>,
    /// Provider snapshot of the session.
    pub payload: Payload,
}

/// Price of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    /// Minor units per unit.
    pub unit_amount: i64,
    /// Lower-case currency.
    pub currency: String,
}

/// A payment backend that can host checkout.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Tag stored on charges, e.g. `"stripe"`.
    fn name(&self) -> &'static str;

    /// Open a hosted checkout session.
    async fn create_checkout_session(&self, params: &SessionParams) -> Result<ProviderSession>;

    /// Look up a price.
    async fn get_price(&self, price_id: &str) -> Result<Price>;
}
