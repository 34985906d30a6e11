//! Wallet balances as reported by the ledger.

use serde::{Deserialize, Serialize};

use crate::ids::TxnId;

/// A user's wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Ledger sequence number of the last applied transaction.
    pub sequence: u64,
    /// Credits granted for free.
    pub award: i64,
    /// Credits bought through top-ups.
    pub topup: i64,
    /// Credits earned from other users.
    pub income: i64,
    /// Lifetime credits, used for the level.
    pub credits: u64,
    /// Derived level, see [`level_for`].
    #[serde(default)]
    pub level: u8,
    /// Last applied transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn: Option<TxnId>,
}

impl Wallet {
    /// Recompute `level` from `credits`.
    #[must_use]
    pub fn with_level(mut self) -> Self {
        self.level = level_for(self.credits);
        self
    }
}

/// `floor(log10(credits))`, or 0 for no credits.
#[must_use]
pub fn level_for(credits: u64) -> u8 {
    match credits.checked_ilog10() {
        #[allow(clippy::cast_possible_truncation)]
        Some(level) => level as u8,
        None => 0,
    }
}
