//! Route-scoped gates attached to protected routes with `route_layer`.
//!
//! `authenticate` rejects the request with 401 unless it carries a valid
//! bearer token; `authorize` then applies the configured
//! [`AuthorizationPolicy`] and rejects with 403. Neither runs for unmatched
//! paths or public routes.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use quickdemo_core::{Principal, RequestContext};

use super::AuthError;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::network::AppState;

/// Extracts the token from `Authorization: Bearer <token>`.
///
/// # Errors
///
/// [`AuthError::MissingToken`] when the header is absent,
/// [`AuthError::MalformedHeader`] when it is not a non-empty bearer credential.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

/// Verifies the bearer token and attaches the principal to the request.
///
/// The principal is also placed on the response so outer stages can log the
/// subject.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?.to_string();
    let principal = state.tokens.validate(&token).await?;

    if let Some(ctx) = req.extensions_mut().get_mut::<RequestContext>() {
        ctx.principal = Some(principal.clone());
    }
    req.extensions_mut().insert(principal.clone());

    let mut response = next.run(req).await;
    response.extensions_mut().insert(principal);
    Ok(response)
}

/// Access rule applied to every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationPolicy {
    /// Any authenticated principal.
    Authenticated,
    /// The principal must hold this scope.
    RequireScope(String),
}

impl AuthorizationPolicy {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        match config.required_scope.as_deref().map(str::trim) {
            Some(scope) if !scope.is_empty() => Self::RequireScope(scope.to_string()),
            _ => Self::Authenticated,
        }
    }

    /// # Errors
    ///
    /// [`ApiError::Unauthenticated`] without a principal, [`ApiError::Forbidden`]
    /// when the principal lacks the required scope.
    pub fn evaluate(&self, principal: Option<&Principal>) -> Result<(), ApiError> {
        let principal = principal.ok_or(AuthError::MissingToken)?;
        match self {
            Self::Authenticated => Ok(()),
            Self::RequireScope(scope) if principal.has_scope(scope) => Ok(()),
            Self::RequireScope(scope) => Err(ApiError::Forbidden {
                reason: format!("subject '{}' lacks scope '{scope}'", principal.subject),
            }),
        }
    }
}

/// Applies the configured [`AuthorizationPolicy`].
pub async fn authorize(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.policy.evaluate(req.extensions().get::<Principal>())?;
    Ok(next.run(req).await)
}
