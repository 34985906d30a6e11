//! Top-up settlement service.
//!
//! Sells wallet credits through a hosted payment provider:
//!
//! - Checkout: creates a charge in the ledger and opens a provider session
//! - Webhooks: verifies provider completions and settles charges exactly once
//! - Currencies: serves the supported currency table with cached exchange rates
//! - Wallets: reads balances and lets users sponsor each other
//!
//! Charges, customers and wallets live in the ledger service; this service
//! holds no authoritative state of its own.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::unused_async)]

pub mod audit;
pub mod auth;
pub mod checkout;
pub mod codec;
pub mod config;
pub mod context;
pub mod crypto;
pub mod customer;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod provider;
pub mod rates;
pub mod routes;
pub mod state;
pub mod stripe;
pub mod wallet;
pub mod webhook;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, Dependencies, StartupError};
