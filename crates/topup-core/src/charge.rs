//! Charge records and the charge state machine.
//!
//! A charge is one top-up attempt. The ledger service owns its storage; this
//! module defines its shape and which status transitions are legal.
//!
//! ```text
//! Pending(0) ──> AwaitingPayment(1) ──> Completed(2) ──> Refunded(4)
//!     │                  │
//!     └──────────────────┴──> Failed(3)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, TopupError};
use crate::ids::{ChargeId, TxnId, UserId};
use crate::payload::Payload;

/// Smallest purchasable quantity.
pub const MIN_QUANTITY: u32 = 50;

/// Largest purchasable quantity.
pub const MAX_QUANTITY: u32 = 1_000_000;

/// Check a requested quantity against the purchasable range.
///
/// # Errors
///
/// Returns `TopupError::Validation` if `quantity` is outside
/// `MIN_QUANTITY..=MAX_QUANTITY`.
pub fn validate_quantity(quantity: u32) -> Result<()> {
    if (MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(TopupError::Validation(format!(
            "quantity must be between {MIN_QUANTITY} and {MAX_QUANTITY}, got {quantity}"
        )))
    }
}

/// Status of a charge, serialized as a small integer.
///
/// Defaults to `Pending`, the zero value, which is also what a reply
/// projected without `status` decodes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum ChargeStatus {
    /// Charge record allocated, no provider session yet.
    #[default]
    Pending,
    /// Provider session attached, waiting for the completion event.
    AwaitingPayment,
    /// Settled against the ledger.
    Completed,
    /// Terminal failure.
    Failed,
    /// Settled, then refunded.
    Refunded,
}

impl ChargeStatus {
    /// Wire value of this status.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Pending => 0,
            Self::AwaitingPayment => 1,
            Self::Completed => 2,
            Self::Failed => 3,
            Self::Refunded => 4,
        }
    }

    /// Whether `next` is a legal successor of this status.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::AwaitingPayment | Self::Failed)
                | (Self::AwaitingPayment, Self::Completed | Self::Failed)
                | (Self::Completed, Self::Refunded)
        )
    }

    /// Whether no further transition is expected from this status.
    ///
    /// `Completed` still admits a refund but no longer awaits the provider.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Refunded)
    }

    /// Fail with `TopupError::Conflict` unless `self -> next` is legal.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Conflict` describing the rejected transition.
    pub fn ensure_transition(self, next: Self) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TopupError::Conflict(format!(
                "charge cannot move from {self:?} to {next:?}"
            )))
        }
    }
}

impl TryFrom<i8> for ChargeStatus {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::AwaitingPayment),
            2 => Ok(Self::Completed),
            3 => Ok(Self::Failed),
            4 => Ok(Self::Refunded),
            other => Err(format!("unknown charge status {other}")),
        }
    }
}

impl From<ChargeStatus> for i8 {
    fn from(status: ChargeStatus) -> Self {
        status.code()
    }
}

/// One top-up attempt as recorded by the ledger.
///
/// Only `id` is guaranteed on the wire: the ledger honours a `fields`
/// projection, and omitted fields decode to their zero values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    /// Charge identifier; embeds the creation time.
    pub id: ChargeId,

    /// Owning user. Never returned to clients by the ledger's list views,
    /// hence optional on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<UserId>,

    /// Payment backend tag, e.g. `"stripe"`.
    #[serde(default)]
    pub provider: String,

    /// Current status.
    #[serde(default)]
    pub status: ChargeStatus,

    /// Requested unit count.
    #[serde(default)]
    pub quantity: u32,

    /// Creation time in unix milliseconds, derived from `id`.
    #[serde(default)]
    pub created_at: i64,

    /// Last update time in unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,

    /// Session expiry in unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<i64>,

    /// Currency reported by the provider session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Amount in the provider's minor unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,

    /// Amount refunded in the provider's minor unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_refunded: Option<u64>,

    /// Provider reference (checkout session id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_id: Option<String>,

    /// Provider snapshot (session or completion event).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_payload: Option<Payload>,

    /// Ledger transaction created by settlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn: Option<TxnId>,

    /// Ledger transaction created by a refund.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn_refunded: Option<TxnId>,

    /// Failure code, set only on terminal failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<String>,

    /// Failure message, set only on terminal failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_msg: Option<String>,
}

impl Charge {
    /// A freshly allocated charge in `Pending`.
    #[must_use]
    pub fn pending(id: ChargeId, uid: UserId, provider: impl Into<String>, quantity: u32) -> Self {
        Self {
            id,
            uid: Some(uid),
            provider: provider.into(),
            status: ChargeStatus::Pending,
            quantity,
            created_at: id.created_at_ms(),
            updated_at: None,
            expire_at: None,
            currency: None,
            amount: None,
            amount_refunded: None,
            charge_id: None,
            charge_payload: None,
            txn: None,
            txn_refunded: None,
            failure_code: None,
            failure_msg: None,
        }
    }

    /// Fill `created_at` from the identifier.
    #[must_use]
    pub fn with_derived_created_at(mut self) -> Self {
        self.created_at = self.id.created_at_ms();
        self
    }

    /// Client projection: the opaque provider payload is stripped.
    #[must_use]
    pub fn without_payload(mut self) -> Self {
        self.charge_payload = None;
        self
    }

    /// Whether this charge was settled by the given provider reference.
    #[must_use]
    pub fn is_settled_by(&self, provider_ref: &str) -> bool {
        self.status == ChargeStatus::Completed && self.charge_id.as_deref() == Some(provider_ref)
    }
}
