//! Ledger request and response types.

use serde::{Deserialize, Serialize};

use topup_core::{ChargeId, ChargeStatus, Payload, TopupError, UserId};

/// Request to create a charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeInput {
    /// Owning user.
    pub uid: UserId,
    /// Payment backend tag.
    pub provider: String,
    /// Requested unit count.
    pub quantity: u32,
}

/// Conditional charge update.
///
/// The ledger applies it only if the stored status equals
/// `current_status`, and reports a conflict otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateChargeInput {
    /// Owning user.
    pub uid: UserId,
    /// Charge to update.
    pub id: ChargeId,
    /// Status the caller expects the charge to be in.
    pub current_status: ChargeStatus,
    /// Status to move to.
    pub status: ChargeStatus,
    /// Session currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Session amount in minor units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    /// Provider reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_id: Option<String>,
    /// Provider snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_payload: Option<Payload>,
    /// Failure code, when moving to `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<String>,
    /// Failure message, when moving to `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_msg: Option<String>,
}

impl UpdateChargeInput {
    /// A bare transition with no field changes.
    #[must_use]
    pub fn transition(uid: UserId, id: ChargeId, from: ChargeStatus, to: ChargeStatus) -> Self {
        Self {
            uid,
            id,
            current_status: from,
            status: to,
            currency: None,
            amount: None,
            charge_id: None,
            charge_payload: None,
            failure_code: None,
            failure_msg: None,
        }
    }
}

/// Conditional settlement: credits the wallet and completes the charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteChargeInput {
    /// Owning user.
    pub uid: UserId,
    /// Charge to settle.
    pub id: ChargeId,
    /// Status the caller expects the charge to be in.
    pub current_status: ChargeStatus,
    /// Currency reported by the provider.
    pub currency: String,
    /// Amount reported by the provider, minor units.
    pub amount: u64,
    /// Provider reference.
    pub charge_id: String,
    /// Completion event snapshot.
    pub charge_payload: Payload,
}

/// Smallest accepted page size.
pub const MIN_PAGE_SIZE: u16 = 5;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u16 = 100;

/// Smallest amount a user can sponsor.
pub const MIN_SPONSOR_AMOUNT: i64 = 1;

/// Largest amount a user can sponsor in one transfer.
pub const MAX_SPONSOR_AMOUNT: i64 = 1_000_000;

/// Transfer of credits from one wallet to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpendInput {
    /// Paying user; always set by the service, never by the client.
    pub uid: UserId,
    /// Receiving user.
    pub payee: UserId,
    /// Credits transferred.
    pub amount: i64,
    /// Free-form note shown on the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Opaque client data attached to the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl ExpendInput {
    /// Check the amount and the parties.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Validation` if `amount` is out of range or the
    /// payer pays themselves.
    pub fn validate(&self) -> Result<(), TopupError> {
        if !(MIN_SPONSOR_AMOUNT..=MAX_SPONSOR_AMOUNT).contains(&self.amount) {
            return Err(TopupError::Validation(format!(
                "amount must be between {MIN_SPONSOR_AMOUNT} and {MAX_SPONSOR_AMOUNT}, got {}",
                self.amount
            )));
        }
        if self.uid == self.payee {
            return Err(TopupError::Validation("cannot sponsor yourself".into()));
        }
        Ok(())
    }
}

/// Page request scoped to one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UidPagination {
    /// Owning user; always set by the service, never by the client.
    #[serde(default)]
    pub uid: Option<UserId>,
    /// Cursor from a previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<Payload>,
    /// Page size, 5..=100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u16>,
    /// Filter by status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChargeStatus>,
    /// Projection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl UidPagination {
    /// Check the client-controlled fields.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Validation` if `page_size` is out of range.
    pub fn validate(&self) -> Result<(), TopupError> {
        match self.page_size {
            Some(size) if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&size) => {
                Err(TopupError::Validation(format!(
                    "page_size must be between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}, got {size}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Cursor for the next page, if any.
    pub next_page_token: Option<Payload>,
}

/// The ledger's response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub result: T,
    #[serde(default)]
    pub next_page_token: Option<Payload>,
}
