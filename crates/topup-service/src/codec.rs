//! JSON/CBOR content negotiation.
//!
//! Request bodies are decoded as CBOR when `Content-Type` starts with
//! `application/cbor`, as JSON otherwise. Responses (errors included) are
//! encoded as CBOR when `Accept` or `Content-Type` asks for it. Both
//! encodings carry the same fields.

use std::convert::Infallible;

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use topup_core::Payload;

use crate::error::{ApiError, ErrorResponse};

/// CBOR media type.
pub const CBOR: &str = "application/cbor";

/// JSON media type.
pub const JSON: &str = "application/json";

/// Wire encoding of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// `application/json`
    #[default]
    Json,
    /// `application/cbor`
    Cbor,
}

impl Encoding {
    /// Encoding of an incoming request body.
    #[must_use]
    pub fn of_body(headers: &HeaderMap) -> Self {
        if header_is_cbor(headers, &CONTENT_TYPE) {
            Self::Cbor
        } else {
            Self::Json
        }
    }

    /// Encoding the client wants for the response.
    #[must_use]
    pub fn of_response(headers: &HeaderMap) -> Self {
        if header_is_cbor(headers, &ACCEPT) || header_is_cbor(headers, &CONTENT_TYPE) {
            Self::Cbor
        } else {
            Self::Json
        }
    }

    /// Media type for the `Content-Type` header.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => JSON,
            Self::Cbor => CBOR,
        }
    }

    /// Decode a body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` if the bytes do not decode into `T`.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, ApiError> {
        match self {
            Self::Json => serde_json::from_slice(bytes)
                .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}"))),
            Self::Cbor => ciborium::from_reader(bytes)
                .map_err(|e| ApiError::BadRequest(format!("invalid CBOR body: {e}"))),
        }
    }

    /// Encode a body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Internal` if the value cannot be serialized.
    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, ApiError> {
        match self {
            Self::Json => serde_json::to_vec(value).map_err(|e| ApiError::Internal(e.to_string())),
            Self::Cbor => {
                let mut buf = Vec::new();
                ciborium::into_writer(value, &mut buf)
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
                Ok(buf)
            }
        }
    }
}

fn header_is_cbor(headers: &HeaderMap, name: &HeaderName) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with(CBOR))
}

// ============================================================================
// Extractors
// ============================================================================

/// The response encoding requested by the client.
#[derive(Debug, Clone, Copy)]
pub struct Accepts(pub Encoding);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Accepts {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Encoding::of_response(&parts.headers)))
    }
}

/// A request body decoded according to its `Content-Type`.
#[derive(Debug, Clone)]
pub struct Negotiated<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Negotiated<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let encoding = Encoding::of_body(req.headers());
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        encoding
            .decode(&bytes)
            .map(Self)
            .map_err(IntoResponse::into_response)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Success envelope: `{"result": ..., "next_page_token"?: ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse<T> {
    /// The payload.
    pub result: T,
    /// Opaque cursor for the next page of a list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<Payload>,
}

/// A success response rendered in the negotiated encoding.
#[derive(Debug)]
pub struct Reply<T> {
    encoding: Encoding,
    body: SuccessResponse<T>,
}

impl<T> Reply<T> {
    /// Wrap `result` in the success envelope.
    pub fn new(encoding: Encoding, result: T) -> Self {
        Self {
            encoding,
            body: SuccessResponse {
                result,
                next_page_token: None,
            },
        }
    }

    /// Attach a page cursor.
    #[must_use]
    pub fn with_page_token(mut self, token: Option<Payload>) -> Self {
        self.body.next_page_token = token;
        self
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        match self.encoding.encode(&self.body) {
            Ok(bytes) => (
                [(CONTENT_TYPE, HeaderValue::from_static(self.encoding.content_type()))],
                bytes,
            )
                .into_response(),
            Err(err) => err.into_response(),
        }
    }
}

/// Re-encode error bodies as CBOR for clients that asked for CBOR.
pub async fn negotiate_errors(request: Request, next: Next) -> Response {
    let encoding = Encoding::of_response(request.headers());
    let response = next.run(request).await;

    if encoding != Encoding::Cbor {
        return response;
    }
    let Some(body) = response.extensions().get::<ErrorResponse>().cloned() else {
        return response;
    };

    match encoding.encode(&body) {
        Ok(bytes) => (
            response.status(),
            [(CONTENT_TYPE, HeaderValue::from_static(CBOR))],
            bytes,
        )
            .into_response(),
        Err(_) => response,
    }
}
