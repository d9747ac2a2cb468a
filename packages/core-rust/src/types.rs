use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DomainError;

/// Authenticated caller, built from a verified bearer token.
///
/// Claims are kept exactly as the issuing authority wrote them. Nothing is
/// renamed to local conventions, so `sub` stays `sub` and custom claims keep
/// their namespaced keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Value of the `sub` claim.
    pub subject: String,
    /// Full claim set as issued.
    pub claims: Map<String, Value>,
}

impl Principal {
    /// Builds a principal from a raw claim set. `subject` is empty when the
    /// token carries no `sub` claim.
    #[must_use]
    pub fn from_claims(claims: Map<String, Value>) -> Self {
        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self { subject, claims }
    }

    /// Returns the raw value of a claim.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Whether the principal was granted `scope`.
    ///
    /// Looks at `scope` (space separated), `scp` (string or array) and
    /// `permissions` (array), the three shapes common authorities emit.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        ["scope", "scp", "permissions"]
            .iter()
            .filter_map(|name| self.claims.get(*name))
            .any(|value| match value {
                Value::String(s) => s.split_whitespace().any(|granted| granted == scope),
                Value::Array(items) => items.iter().any(|item| item.as_str() == Some(scope)),
                _ => false,
            })
    }
}

fn postal_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9]{5}(-[0-9]{4})?$").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
    })
}

/// A syntactically valid US postal code (`12345` or `12345-6789`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Parses and validates a postal code. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidCode`] when the input is not a five digit
    /// code with an optional four digit extension.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if postal_code_pattern().is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(DomainError::InvalidCode {
                code: raw.to_string(),
            })
        }
    }

    /// The five digit zone, without any extension. Valid codes are ASCII.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.0[..5]
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PostalCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(code: PostalCode) -> Self {
        code.0
    }
}

/// Result of a postal code lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostalCodeInfo {
    pub code: String,
    pub city: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
}
