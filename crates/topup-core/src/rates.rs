//! Exchange-rate snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A point-in-time exchange-rate table.
///
/// Snapshots are never mutated; a refresh replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Base currency every rate is quoted against, e.g. `"HKD"`.
    pub base: String,
    /// Units of each currency per one unit of `base`, keyed by alpha code.
    pub rates: BTreeMap<String, f32>,
    /// When the source last updated the table, unix seconds.
    pub last_update: u64,
    /// When the source expects to update it next, unix seconds.
    pub next_update: u64,
}

impl RateSnapshot {
    /// Whether the snapshot can be served without asking the source.
    ///
    /// `jitter` shortens the freshness window by a per-call random amount so
    /// that instances sharing a snapshot do not all refresh at once.
    #[must_use]
    pub fn is_fresh(&self, now: u64, jitter: u64) -> bool {
        now.saturating_sub(jitter) < self.last_update
    }

    /// Rate for an alpha code, if listed.
    #[must_use]
    pub fn rate(&self, alpha: &str) -> Option<f32> {
        self.rates.get(alpha).copied()
    }
}
