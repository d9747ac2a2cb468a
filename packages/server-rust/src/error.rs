//! Typed request failures and their classification.
//!
//! Handlers and middleware return [`ApiError`] values. Turning one into a
//! response only sets the status code and parks the error in the response
//! extensions as a [`Failure`]; the problem boundary is the single place that
//! renders a body and logs it.

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use quickdemo_core::{DomainError, LogicError};

use crate::auth::AuthError;

/// Every way a request can fail.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Caller sent something the domain rejects. The message is returned.
    #[error(transparent)]
    Client(#[from] DomainError),

    /// Missing or invalid credentials.
    #[error(transparent)]
    Unauthenticated(#[from] AuthError),

    /// Valid credentials without the required grant.
    #[error("access denied: {reason}")]
    Forbidden { reason: String },

    /// Anything unclassified. Never shown to callers.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<LogicError> for ApiError {
    fn from(err: LogicError) -> Self {
        match err {
            LogicError::Domain(e) => Self::Client(e),
            LogicError::Internal(e) => Self::Internal(e),
        }
    }
}

/// Outcome of [`classify`]: what the caller is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: StatusCode,
    pub title: &'static str,
    pub detail: Option<String>,
}

/// Canonical title for a status, used for every problem payload.
#[must_use]
pub fn canonical_title(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Error")
}

/// Maps a failure to its status and caller-visible detail.
///
/// Only client faults expose their message. Authentication, authorization
/// and internal failures carry a title and nothing else.
#[must_use]
pub fn classify(err: &ApiError) -> Classification {
    let (status, detail) = match err {
        ApiError::Client(e) => (StatusCode::BAD_REQUEST, Some(e.to_string())),
        ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, None),
        ApiError::Forbidden { .. } => (StatusCode::FORBIDDEN, None),
        ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
    };
    Classification {
        status,
        title: canonical_title(status),
        detail,
    }
}

/// Response extension marking a response as produced by a typed failure.
#[derive(Debug, Clone)]
pub struct Failure(Arc<ApiError>);

impl Failure {
    #[must_use]
    pub fn new(err: ApiError) -> Self {
        Self(Arc::new(err))
    }

    #[must_use]
    pub fn error(&self) -> &ApiError {
        &self.0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = classify(&self).status;
        let mut response = status.into_response();
        if matches!(self, Self::Unauthenticated(_)) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }
        response.extensions_mut().insert(Failure::new(self));
        response
    }
}
