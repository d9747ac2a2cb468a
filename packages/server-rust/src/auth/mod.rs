//! Bearer token authentication against an external identity authority.
//!
//! - [`jwks`]: where signing keys come from (remote discovery or static set)
//! - [`validator`]: JWT verification producing a [`Principal`](quickdemo_core::Principal)
//! - [`middleware`]: the route-scoped authentication and authorization gates

pub mod jwks;
pub mod middleware;
pub mod validator;

pub use jwks::{RemoteAuthority, SigningKeySource, SigningKeys, StaticKeySource};
pub use middleware::{authenticate, authorize, bearer_token, AuthorizationPolicy};
pub use validator::{JwtValidator, TokenValidator};

use jsonwebtoken::Algorithm;

/// Why a request could not be authenticated. Never shown to callers.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no bearer token supplied")]
    MissingToken,

    #[error("authorization header is not a bearer credential")]
    MalformedHeader,

    #[error("token algorithm {0:?} is not accepted")]
    DisallowedAlgorithm(Algorithm),

    #[error("no signing key matches kid {kid:?}")]
    UnknownKey { kid: Option<String> },

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("signing keys unavailable: {0}")]
    KeySource(String),
}
