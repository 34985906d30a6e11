//! Core domain types for the top-up settlement service.
//!
//! This crate contains the data model shared by the service and its storage
//! layer:
//!
//! - Identifiers (`UserId`, `ChargeId`, `TxnId`)
//! - Charges and the charge status state machine
//! - Currencies, exchange-rate snapshots and wallets
//! - The `TopupError` taxonomy

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod charge;
pub mod currency;
pub mod customer;
pub mod error;
pub mod ids;
pub mod payload;
pub mod rates;
pub mod wallet;

pub use charge::{validate_quantity, Charge, ChargeStatus, MAX_QUANTITY, MIN_QUANTITY};
pub use currency::{Currency, CurrencyCatalog};
pub use customer::CustomerLink;
pub use error::{Result, TopupError};
pub use ids::{ChargeId, IdError, TxnId, UserId};
pub use payload::Payload;
pub use rates::RateSnapshot;
pub use wallet::{level_for, Wallet};
