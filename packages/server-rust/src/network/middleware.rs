//! Transport-level building blocks used by the pipeline stages.
//!
//! Everything here is plain tower-http configuration: request ids, the
//! per-request trace span, CORS, and the guard that bounds handler execution.

use std::time::Duration;

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use quickdemo_core::APPLICATION;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, info_span, warn, Span};

use crate::error::ApiError;

type PanicPayload = Box<dyn std::any::Any + Send + 'static>;

/// Header carrying the correlation id in both directions.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Drops a caller-supplied request id that is empty or not visible ASCII, so
/// `SetRequestIdLayer` mints one and every stage reads the same value.
pub async fn discard_unreadable_request_id(mut req: Request<Body>) -> Request<Body> {
    let unreadable = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .is_some_and(|v| v.to_str().map_or(true, |s| s.trim().is_empty()));
    if unreadable {
        debug!("discarding unreadable request id");
        req.headers_mut().remove(&REQUEST_ID_HEADER);
    }
    req
}

/// Span opened by `TraceLayer` for every request.
pub fn request_span(req: &Request<Body>) -> Span {
    let correlation_id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    info_span!(
        "request",
        application = APPLICATION,
        method = %req.method(),
        uri = %req.uri(),
        correlation_id = %correlation_id,
    )
}

/// Builds the CORS layer from the configured allow-list.
///
/// Returns `None` when no origin is configured: no layer is installed and
/// browsers get no cross-origin access. Wildcards and unparsable entries are
/// dropped with a warning. Allowed origins may use any header and method,
/// never credentials.
#[must_use]
pub fn build_cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            if origin.contains('*') {
                warn!(%origin, "ignoring wildcard CORS origin");
                return None;
            }
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!(%origin, "ignoring unparsable CORS origin"))
                .ok()
        })
        .collect();

    if parsed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// 408 on expiry. The empty response is turned into a problem by the
/// boundary.
#[must_use]
pub fn build_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Converts handler panics into internal failures.
#[must_use]
pub fn build_catch_panic_layer() -> CatchPanicLayer<fn(PanicPayload) -> Response> {
    CatchPanicLayer::custom(panic_response as fn(PanicPayload) -> Response)
}

fn panic_response(payload: PanicPayload) -> Response {
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    ApiError::Internal(anyhow::anyhow!("handler panicked: {message}")).into_response()
}
