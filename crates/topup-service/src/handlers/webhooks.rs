//! Payment provider webhook handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;

use crate::auth::RequestContext;
use crate::codec::{Accepts, Reply};
use crate::error::ApiError;
use crate::state::AppState;
use crate::webhook::WebhookOutcome;

/// Header carrying the Stripe signature.
const STRIPE_SIGNATURE: &str = "stripe-signature";

/// Handle a provider webhook.
///
/// Answers `{"result": true}` once the event is verified and, for
/// completions, settled. Any error response makes the provider redeliver.
pub async fn provider_webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    RequestContext(ctx): RequestContext,
    Accepts(encoding): Accepts,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Reply<bool>, ApiError> {
    if provider != state.orchestrator.provider_name() {
        return Err(ApiError::NotFound(format!("unknown provider {provider}")));
    }

    let signature = headers
        .get(STRIPE_SIGNATURE)
        .and_then(|v| v.to_str().ok());

    match state.webhooks.handle(&body, signature, &ctx).await? {
        WebhookOutcome::Ignored { event_type } => {
            tracing::debug!(event_type = %event_type, "Webhook ignored");
        }
        WebhookOutcome::Settled {
            charge,
            newly_settled,
            hook_errors,
        } => {
            tracing::info!(
                charge_id = %charge.id,
                newly_settled = %newly_settled,
                hook_errors = %hook_errors.len(),
                "Webhook processed"
            );
        }
    }

    Ok(Reply::new(encoding, true))
}
