//! Outermost failure boundary.
//!
//! Assigns the request context on the way in and, on the way out, turns
//! every error-status response into a [`Problem`]. Responses carrying a
//! [`Failure`] are classified from the typed error; bare error responses from
//! the framework (405, 408, rejections) keep their status and get the
//! canonical title. Each failure is handed to the log sink exactly once,
//! here, before the response leaves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use quickdemo_core::{FailureRecord, LogSink, RequestContext};
use tower::{Layer, Service};
use tracing::warn;
use uuid::Uuid;

use crate::error::{canonical_title, classify, Classification, Failure};
use crate::network::middleware::REQUEST_ID_HEADER;
use crate::problem::Problem;

#[derive(Clone)]
pub struct ProblemBoundaryLayer {
    sink: Arc<dyn LogSink>,
}

impl ProblemBoundaryLayer {
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for ProblemBoundaryLayer {
    type Service = ProblemBoundaryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ProblemBoundaryService {
            inner,
            sink: Arc::clone(&self.sink),
        }
    }
}

#[derive(Clone)]
pub struct ProblemBoundaryService<S> {
    inner: S,
    sink: Arc<dyn LogSink>,
}

impl<S> Service<Request> for ProblemBoundaryService<S>
where
    S: Service<Request, Response = Response> + Send,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        let ctx = RequestContext::new(correlation_id, req.method().as_str(), req.uri().path());
        req.extensions_mut().insert(ctx.clone());

        let sink = Arc::clone(&self.sink);
        let fut = self.inner.call(req);

        Box::pin(async move {
            let response = fut.await?;
            Ok(normalize(response, &ctx, sink.as_ref()))
        })
    }
}

/// Rewrites error responses into problem responses. Anything below 400
/// passes through untouched.
pub fn normalize(response: Response, ctx: &RequestContext, sink: &dyn LogSink) -> Response {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (classification, cause) = match response.extensions().get::<Failure>() {
        Some(failure) => (
            classify(failure.error()),
            Some(format!("{:#}", failure.error())),
        ),
        None => (
            Classification {
                status,
                title: canonical_title(status),
                detail: None,
            },
            None,
        ),
    };

    let problem = Problem::new(classification, &ctx.path, &ctx.correlation_id);
    let record = FailureRecord {
        correlation_id: ctx.correlation_id.clone(),
        method: ctx.method.clone(),
        path: ctx.path.clone(),
        status: problem.status,
        title: problem.title.clone(),
        detail: problem.detail.clone(),
        cause,
    };
    if let Err(error) = sink.record_failure(&record) {
        warn!(%error, correlation_id = %ctx.correlation_id, "failed to record failure");
    }

    let (parts, _body) = response.into_parts();
    let mut rendered = problem.into_response();
    for (name, value) in &parts.headers {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            rendered.headers_mut().append(name.clone(), value.clone());
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use quickdemo_core::{DomainError, MemoryLogSink};

    fn ctx() -> RequestContext {
        RequestContext::new("corr-1", "GET", "/api/v1/postal-codes/00000")
    }

    async fn body(response: Response) -> Problem {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_passes_through_without_logging() {
        let sink = MemoryLogSink::new();
        let response = normalize("ok".into_response(), &ctx(), &sink);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(sink.failures().is_empty());
    }

    #[tokio::test]
    async fn typed_client_failure_keeps_detail() {
        let sink = MemoryLogSink::new();
        let response = normalize(
            ApiError::Client(DomainError::CodeNotFound).into_response(),
            &ctx(),
            &sink,
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            crate::problem::PROBLEM_CONTENT_TYPE
        );
        let problem = body(response).await;
        assert_eq!(problem.status, 400);
        assert_eq!(problem.detail.as_deref(), Some("Code not found"));
        assert_eq!(problem.correlation_id, "corr-1");
        assert_eq!(problem.instance, "/api/v1/postal-codes/00000");

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].detail.as_deref(), Some("Code not found"));
    }

    #[tokio::test]
    async fn internal_failure_hides_cause_from_caller_only() {
        let sink = MemoryLogSink::new();
        let response = normalize(
            ApiError::Internal(anyhow::anyhow!("connection refused")).into_response(),
            &ctx(),
            &sink,
        );
        let problem = body(response).await;
        assert_eq!(problem.status, 500);
        assert!(problem.detail.is_none());

        let failures = sink.failures();
        assert!(failures[0].detail.is_none());
        assert!(failures[0]
            .cause
            .as_deref()
            .is_some_and(|c| c.contains("connection refused")));
    }

    #[tokio::test]
    async fn bare_error_status_is_rewritten_with_status_preserved() {
        let sink = MemoryLogSink::new();
        let response = normalize(StatusCode::METHOD_NOT_ALLOWED.into_response(), &ctx(), &sink);
        let problem = body(response).await;
        assert_eq!(problem.status, 405);
        assert_eq!(problem.title, "Method Not Allowed");
        assert!(problem.detail.is_none());
        assert_eq!(sink.failures().len(), 1);
    }

    #[tokio::test]
    async fn original_headers_survive() {
        let sink = MemoryLogSink::new();
        let mut response = StatusCode::UNAUTHORIZED.into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, "Bearer".parse().unwrap());
        let response = normalize(response, &ctx(), &sink);
        assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    }
}
