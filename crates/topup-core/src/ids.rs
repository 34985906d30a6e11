//! Identifier types for the top-up service.
//!
//! Every identifier is a ULID: 128 bits, lexicographically sortable, with the
//! creation time in milliseconds embedded in the high 48 bits. Charge records
//! rely on this to expose `created_at` without storing it.
//!
//! # Macro-based ID Types
//!
//! The `ulid_id_type!` macro reduces boilerplate for ULID-based identifier
//! types, ensuring consistent serialization, parsing and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Macro to define a ULID-based identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `ulid::Ulid` with implementations for:
/// - `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (as string)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`
macro_rules! ulid_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Ulid);

        impl $name {
            /// Create a new identifier from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Generate a new identifier stamped with the current time.
            #[must_use]
            pub fn generate() -> Self {
                Self(Ulid::new())
            }

            /// Return the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> &Ulid {
                &self.0
            }

            /// Return the bytes of the ULID (16 bytes).
            #[must_use]
            pub fn to_bytes(&self) -> [u8; 16] {
                self.0.to_bytes()
            }

            /// Creation time embedded in the identifier, in unix milliseconds.
            #[must_use]
            #[allow(clippy::cast_possible_wrap)]
            pub fn created_at_ms(&self) -> i64 {
                self.0.timestamp_ms() as i64
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid {
                    kind: stringify!($name),
                    value: s.to_string(),
                })?;
                Ok(Self(ulid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

ulid_id_type!(UserId, "A user identifier.\n\nIssued by the user directory and forwarded by the gateway in `x-auth-user`.");
ulid_id_type!(ChargeId, "A charge (top-up attempt) identifier.\n\nAllocated by the ledger when the charge is created.");
ulid_id_type!(TxnId, "A ledger transaction identifier.\n\nStamped on a charge when settlement debits the ledger.");

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid ULID.
    #[error("invalid {kind}: {value:?}")]
    InvalidUlid {
        /// Which identifier type was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_roundtrip() {
        let id = UserId::generate();
        let parsed = UserId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn charge_id_serde_json() {
        let id = ChargeId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ChargeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn charge_id_embeds_creation_time() {
        let ulid = Ulid::from_parts(1_700_000_000_123, 42);
        let id = ChargeId::from_ulid(ulid);
        assert_eq!(id.created_at_ms(), 1_700_000_000_123);
    }

    #[test]
    fn ids_sort_by_creation_time() {
        let older = TxnId::from_ulid(Ulid::from_parts(1_000, u128::MAX >> 48));
        let newer = TxnId::from_ulid(Ulid::from_parts(2_000, 0));
        assert!(older < newer);
        assert!(older.to_string() < newer.to_string());
    }

    #[test]
    fn invalid_id_names_the_input() {
        let err = ChargeId::from_str("not-a-ulid").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid ChargeId: \"not-a-ulid\""
        );
    }

    #[test]
    fn empty_string_is_rejected() {
        assert!(UserId::from_str("").is_err());
    }
}
