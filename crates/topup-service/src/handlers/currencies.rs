//! Currency listing.

use std::sync::Arc;

use axum::extract::State;

use topup_core::Currency;

use crate::codec::{Accepts, Reply};
use crate::error::ApiError;
use crate::state::AppState;

/// Supported currencies with their current exchange rate.
///
/// Currencies the rate snapshot does not quote are left out.
pub async fn list_currencies(
    State(state): State<Arc<AppState>>,
    Accepts(encoding): Accepts,
) -> Result<Reply<Vec<Currency>>, ApiError> {
    let snapshot = state.rates.get_rates().await?;
    Ok(Reply::new(
        encoding,
        state.catalog.list_for_display(&snapshot),
    ))
}
