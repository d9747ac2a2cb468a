//! Per-request log record.
//!
//! Times the downstream pipeline and hands one [`RequestRecord`] to the log
//! sink when the response is ready. Correlation id and client address come
//! from the extensions set by the outer stages; the subject comes from the
//! principal the authentication gate leaves on the response.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::Request;
use axum::response::Response;
use quickdemo_core::{LogSink, Principal, RequestContext, RequestRecord};
use tower::{Layer, Service};
use tracing::warn;

use crate::network::ResolvedTransport;

#[derive(Clone)]
pub struct RequestLogLayer {
    sink: Arc<dyn LogSink>,
}

impl RequestLogLayer {
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            sink: Arc::clone(&self.sink),
        }
    }
}

#[derive(Clone)]
pub struct RequestLogService<S> {
    inner: S,
    sink: Arc<dyn LogSink>,
}

impl<S> Service<Request> for RequestLogService<S>
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

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let correlation_id = req
            .extensions()
            .get::<RequestContext>()
            .map(|ctx| ctx.correlation_id.clone())
            .unwrap_or_default();
        let client_ip = req
            .extensions()
            .get::<ResolvedTransport>()
            .and_then(|t| t.client_ip);

        let sink = Arc::clone(&self.sink);
        let fut = self.inner.call(req);

        Box::pin(async move {
            let start = Instant::now();
            let response = fut.await?;
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let record = RequestRecord {
                correlation_id,
                method,
                path,
                status: response.status().as_u16(),
                duration_ms,
                client_ip,
                subject: response
                    .extensions()
                    .get::<Principal>()
                    .map(|p| p.subject.clone()),
            };
            if let Err(error) = sink.record_request(&record) {
                warn!(%error, correlation_id = %record.correlation_id, "failed to record request");
            }
            Ok(response)
        })
    }
}
