use async_trait::async_trait;

use crate::error::LogicError;
use crate::log::{FailureRecord, RequestRecord};
use crate::types::{PostalCode, PostalCodeInfo};

/// Business logic behind the postal code routes.
///
/// Implementations own their data access. Returning `Ok(None)` means the code
/// is well formed but unknown; the caller decides how to surface that.
#[async_trait]
pub trait PostalCodeLogic: Send + Sync {
    async fn lookup(&self, code: &PostalCode) -> Result<Option<PostalCodeInfo>, LogicError>;
}

/// Destination for structured request and failure records.
///
/// Called from the request path, so implementations must not block for long.
/// A returned error is reported by the caller and otherwise ignored.
pub trait LogSink: Send + Sync {
    /// Called once per completed request.
    fn record_request(&self, record: &RequestRecord) -> anyhow::Result<()>;

    /// Called once per normalized failure, before the response is sent.
    fn record_failure(&self, record: &FailureRecord) -> anyhow::Result<()>;
}
