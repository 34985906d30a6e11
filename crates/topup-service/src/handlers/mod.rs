//! API handlers.

pub mod checkout;
pub mod currencies;
pub mod health;
pub mod wallet;
pub mod webhooks;
