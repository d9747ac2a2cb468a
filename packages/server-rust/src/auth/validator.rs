use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use quickdemo_core::Principal;
use serde_json::{Map, Value};

use super::{AuthError, SigningKeySource};

/// Accepted clock skew on `exp` and `nbf`, in seconds.
const LEEWAY_SECS: u64 = 60;

/// Algorithms accepted unless overridden. Symmetric algorithms are excluded
/// because the authority's secret is never shared with this service.
pub const DEFAULT_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

/// Turns a raw bearer token into a verified principal.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<Principal, AuthError>;
}

/// Verifies signature, issuer, audience and expiry of a JWT.
///
/// Claims are returned untouched.
pub struct JwtValidator {
    keys: Arc<dyn SigningKeySource>,
    audience: String,
    algorithms: Vec<Algorithm>,
}

impl JwtValidator {
    #[must_use]
    pub fn new(keys: Arc<dyn SigningKeySource>, audience: impl Into<String>) -> Self {
        Self {
            keys,
            audience: audience.into(),
            algorithms: DEFAULT_ALGORITHMS.to_vec(),
        }
    }

    #[must_use]
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }
}

#[async_trait]
impl TokenValidator for JwtValidator {
    async fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        let header = decode_header(token)?;
        if !self.algorithms.contains(&header.alg) {
            return Err(AuthError::DisallowedAlgorithm(header.alg));
        }

        let mut published = self.keys.signing_keys().await?;
        if let Some(kid) = header.kid.as_deref() {
            if published.keys.find(kid).is_none() {
                published = self.keys.refresh().await?;
            }
        }
        let jwk = match header.kid.as_deref() {
            Some(kid) => published.keys.find(kid),
            // Without a kid only an unambiguous single-key set is usable.
            None if published.keys.keys.len() == 1 => published.keys.keys.first(),
            None => None,
        }
        .ok_or_else(|| AuthError::UnknownKey {
            kid: header.kid.clone(),
        })?;
        let key = DecodingKey::from_jwk(jwk)?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = LEEWAY_SECS;
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "aud"]);
        if let Some(issuer) = &published.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<Map<String, Value>>(token, &key, &validation)?;
        Ok(Principal::from_claims(data.claims))
    }
}
