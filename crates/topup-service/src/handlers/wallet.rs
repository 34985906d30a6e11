//! Wallet handlers.

use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;

use topup_core::{Payload, UserId, Wallet};

use crate::auth::AuthUser;
use crate::codec::{Accepts, Negotiated, Reply};
use crate::error::ApiError;
use crate::ledger::ExpendInput;
use crate::state::AppState;

/// Sponsorship request. The payer is always the caller.
#[derive(Debug, Deserialize)]
pub struct SponsorInput {
    /// Receiving user.
    pub payee: UserId,
    /// Credits to give.
    pub amount: i64,
    /// Note shown on the transaction.
    #[serde(default)]
    pub description: Option<String>,
    /// Opaque client data.
    #[serde(default)]
    pub payload: Option<Payload>,
}

/// The caller's wallet, with its level.
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Accepts(encoding): Accepts,
) -> Result<Reply<Wallet>, ApiError> {
    let wallet = state.wallets.get(&auth.context, auth.user_id).await?;
    Ok(Reply::new(encoding, wallet))
}

/// Give credits to another user; replies with the caller's wallet.
pub async fn sponsor(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Accepts(encoding): Accepts,
    Negotiated(input): Negotiated<SponsorInput>,
) -> Result<Reply<Wallet>, ApiError> {
    tracing::info!(
        user_id = %auth.user_id,
        payee = %input.payee,
        amount = %input.amount,
        "Sponsorship requested"
    );

    let transfer = ExpendInput {
        uid: auth.user_id,
        payee: input.payee,
        amount: input.amount,
        description: input.description,
        payload: input.payload,
    };
    let wallet = state.wallets.sponsor(&auth.context, &transfer).await?;
    Ok(Reply::new(encoding, wallet))
}
