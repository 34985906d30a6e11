//! Stripe integration: hosted Checkout and webhook signatures.

pub mod client;
pub mod signature;
pub mod types;

pub use client::{StripeClient, StripeError};
pub use types::*;
