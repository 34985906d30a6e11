//! Checkout and charge handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use serde::Deserialize;

use topup_core::{Charge, ChargeId};

use crate::auth::AuthUser;
use crate::checkout::{CheckoutConfig, CheckoutOutput};
use crate::codec::{Accepts, Negotiated, Reply};
use crate::error::ApiError;
use crate::ledger::UidPagination;
use crate::state::AppState;

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct CheckoutInput {
    /// Units to buy.
    pub quantity: u32,
    /// Currency to pay in; provider default when absent.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Charge lookup query parameters.
#[derive(Debug, Deserialize)]
pub struct ChargeQuery {
    /// Charge ID.
    pub id: ChargeId,
    /// Comma-separated projection.
    #[serde(default)]
    pub fields: Option<String>,
}

/// Provider configuration for client-side checkout.
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Accepts(encoding): Accepts,
) -> Result<Reply<CheckoutConfig>, ApiError> {
    let config = state.orchestrator.config().await?;
    Ok(Reply::new(encoding, config))
}

/// Start a checkout.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Accepts(encoding): Accepts,
    Negotiated(input): Negotiated<CheckoutInput>,
) -> Result<Reply<CheckoutOutput>, ApiError> {
    tracing::info!(
        user_id = %auth.user_id,
        quantity = %input.quantity,
        currency = ?input.currency,
        "Checkout requested"
    );

    let output = state
        .orchestrator
        .checkout(
            &auth.context,
            auth.user_id,
            input.quantity,
            input.currency.as_deref(),
        )
        .await?;

    Ok(Reply::new(encoding, output))
}

/// Read one of the caller's charges.
pub async fn get_charge(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Accepts(encoding): Accepts,
    Query(query): Query<ChargeQuery>,
) -> Result<Reply<Charge>, ApiError> {
    let charge = state
        .orchestrator
        .get(
            &auth.context,
            auth.user_id,
            query.id,
            query.fields.as_deref(),
        )
        .await?;
    Ok(Reply::new(encoding, charge))
}

/// List the caller's charges, newest first.
pub async fn list_charges(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Accepts(encoding): Accepts,
    Negotiated(pagination): Negotiated<UidPagination>,
) -> Result<Reply<Vec<Charge>>, ApiError> {
    let page = state
        .orchestrator
        .list(&auth.context, auth.user_id, pagination)
        .await?;
    Ok(Reply::new(encoding, page.items).with_page_token(page.next_page_token))
}
