//! Caller identity propagated to downstream services.
//!
//! The gateway authenticates end users and forwards their identity in a
//! handful of `x-*` headers. The service passes the same headers on to the
//! ledger so that every ledger write is attributed to the user (or to the
//! system app acting on the user's behalf).

use axum::http::HeaderMap;

use topup_core::UserId;

/// Header carrying the authenticated user id.
pub const AUTH_USER: &str = "x-auth-user";
/// Header carrying the calling application id.
pub const AUTH_APP: &str = "x-auth-app";
/// Header carrying the request correlation id.
pub const REQUEST_ID: &str = "x-request-id";
/// Header carrying the client address as seen by the gateway.
pub const REAL_IP: &str = "x-real-ip";

/// Application id the service presents when acting for a user without a
/// user request, e.g. while settling a provider webhook.
pub const SYSTEM_APP_ID: &str = "topup-system";

/// Identity headers for a downstream call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    /// The user the call is made for.
    pub user_id: Option<UserId>,
    /// The application making the call.
    pub app_id: Option<String>,
    /// Correlation id of the originating request.
    pub request_id: Option<String>,
    /// Client address of the originating request.
    pub real_ip: Option<String>,
}

impl CallerContext {
    /// Read the gateway headers of an incoming request.
    ///
    /// An unparseable `x-auth-user` is treated as absent.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        Self {
            user_id: text(AUTH_USER).and_then(|v| v.parse().ok()),
            app_id: text(AUTH_APP),
            request_id: text(REQUEST_ID),
            real_ip: text(REAL_IP),
        }
    }

    /// A context acting as `user_id` through the system app, keeping the
    /// correlation headers of `self`.
    #[must_use]
    pub fn impersonate(&self, user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            app_id: Some(SYSTEM_APP_ID.to_string()),
            request_id: self.request_id.clone(),
            real_ip: self.real_ip.clone(),
        }
    }

    /// Header pairs to attach to an outgoing request.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(4);
        if let Some(uid) = &self.user_id {
            headers.push((AUTH_USER, uid.to_string()));
        }
        if let Some(app) = &self.app_id {
            headers.push((AUTH_APP, app.clone()));
        }
        if let Some(id) = &self.request_id {
            headers.push((REQUEST_ID, id.clone()));
        }
        if let Some(ip) = &self.real_ip {
            headers.push((REAL_IP, ip.clone()));
        }
        headers
    }
}
