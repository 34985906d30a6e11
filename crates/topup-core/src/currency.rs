//! Supported currencies.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TopupError};
use crate::rates::RateSnapshot;

/// A currency the ledger accepts for top-ups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    /// Display name.
    pub name: String,
    /// ISO 4217 alpha code, upper case.
    pub alpha: String,
    /// Minor-unit digits.
    pub decimals: u8,
    /// ISO 4217 numeric code.
    pub code: u16,
    /// Rate against the snapshot base; zero until merged.
    #[serde(default)]
    pub exchange_rate: f32,
}

/// The static currency table, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct CurrencyCatalog {
    currencies: Vec<Currency>,
}

impl CurrencyCatalog {
    /// Build a catalog from the ledger's currency list.
    #[must_use]
    pub fn new(currencies: Vec<Currency>) -> Self {
        Self { currencies }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }

    /// Look up a currency by alpha code, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Validation` naming the upper-cased code when it
    /// is not in the catalog.
    pub fn validate(&self, code: &str) -> Result<&Currency> {
        let upper = code.trim().to_ascii_uppercase();
        self.currencies
            .iter()
            .find(|c| c.alpha == upper)
            .ok_or_else(|| TopupError::Validation(format!("currency {upper} not supported")))
    }

    /// Currencies that appear in `snapshot`, with their rate filled in.
    #[must_use]
    pub fn list_for_display(&self, snapshot: &RateSnapshot) -> Vec<Currency> {
        self.currencies
            .iter()
            .filter_map(|c| {
                snapshot.rate(&c.alpha).map(|rate| Currency {
                    exchange_rate: rate,
                    ..c.clone()
                })
            })
            .collect()
    }
}
