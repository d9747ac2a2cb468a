use crate::types::Principal;

/// Per-request context carrying identity and correlation information.
/// Created when a request enters the pipeline and dropped with the response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation identifier, assigned once and echoed in logs, problem
    /// payloads and the `x-request-id` response header.
    pub correlation_id: String,
    /// HTTP method of the inbound request.
    pub method: String,
    /// Request path, without the query string.
    pub path: String,
    /// Authenticated principal. `None` until the authentication gate runs.
    pub principal: Option<Principal>,
}

impl RequestContext {
    #[must_use]
    pub fn new(
        correlation_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            method: method.into(),
            path: path.into(),
            principal: None,
        }
    }

    /// Subject of the authenticated principal, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.subject.as_str())
    }
}
