//! Request identity extractors.
//!
//! End users are authenticated by the gateway in front of this service,
//! which forwards the result in `x-auth-user`. This module only reads that
//! header; it performs no token validation of its own.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use topup_core::UserId;

use crate::context::CallerContext;
use crate::error::ApiError;

/// An authenticated end user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
    /// Identity headers to forward downstream.
    pub context: CallerContext,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = CallerContext::from_headers(&parts.headers);
        let user_id = context.user_id.ok_or(ApiError::Unauthorized)?;

        Ok(Self { user_id, context })
    }
}

/// Correlation headers of a request that carries no user identity.
#[derive(Debug, Clone)]
pub struct RequestContext(pub CallerContext);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(CallerContext::from_headers(&parts.headers)))
    }
}
