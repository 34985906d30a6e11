//! Provider customer links.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::payload::Payload;

/// Mapping from (user, provider) to the provider's customer identifier.
///
/// Lets repeat purchases reuse the same provider customer instead of
/// creating a new one per checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerLink {
    /// Owning user.
    pub uid: UserId,
    /// Payment backend tag, e.g. `"stripe"`.
    pub provider: String,
    /// Provider customer id, e.g. `cus_...`.
    pub customer: String,
    /// CBOR snapshot of the provider's customer details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// Creation time in unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Last update time in unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl CustomerLink {
    /// A new link, not yet persisted.
    #[must_use]
    pub fn new(uid: UserId, provider: impl Into<String>, customer: impl Into<String>) -> Self {
        Self {
            uid,
            provider: provider.into(),
            customer: customer.into(),
            payload: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Attach a details snapshot.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }
}
