//! Key naming for the shared cache.

/// Key of the exchange-rate snapshot.
pub const EXCHANGE_RATES: &str = "exchange_rates";

/// Prefix a key with a namespace, if one is configured.
///
/// Several deployments may share one Redis; the namespace keeps their
/// snapshots apart.
#[must_use]
pub fn namespaced(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}:{key}")
    }
}
