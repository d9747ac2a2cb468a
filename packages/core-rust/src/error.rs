//! Failures raised by business logic.

/// Client-fault failures. Their messages are written for the caller and are
/// safe to return in a response body.
///
/// `InvalidCode` and `CodeNotFound` are the typed kinds this service knows
/// about. `Validation` carries any other application-level rejection whose
/// message is meant for the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("'{code}' is not a valid postal code")]
    InvalidCode { code: String },

    #[error("Code not found")]
    CodeNotFound,

    #[error("{0}")]
    Validation(String),
}

/// Error returned by a [`PostalCodeLogic`](crate::PostalCodeLogic) provider.
#[derive(Debug, thiserror::Error)]
pub enum LogicError {
    /// The request was understood but rejected by the domain.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Anything else: storage, upstream calls, bugs. Never shown to callers.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
