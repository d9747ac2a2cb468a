//! Structured log records and the sinks shipped with the crate.

use std::net::IpAddr;

use parking_lot::Mutex;
use serde::Serialize;

use crate::traits::LogSink;

/// One completed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub correlation_id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u64,
    pub client_ip: Option<IpAddr>,
    pub subject: Option<String>,
}

/// One normalized failure.
///
/// `detail` mirrors what the caller sees and is `None` for every failure kind
/// that must not leak its message. `cause` is the full internal description
/// and stays on the server side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub correlation_id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub title: String,
    pub detail: Option<String>,
    pub cause: Option<String>,
}

/// Application name attached to every record emitted by [`TracingLogSink`].
pub const APPLICATION: &str = "QuickDemo.Api";

/// Forwards records to `tracing` as structured events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn record_request(&self, record: &RequestRecord) -> anyhow::Result<()> {
        tracing::info!(
            target: "quickdemo::request",
            application = APPLICATION,
            correlation_id = %record.correlation_id,
            method = %record.method,
            path = %record.path,
            status = record.status,
            duration_ms = record.duration_ms,
            client_ip = ?record.client_ip,
            subject = record.subject.as_deref(),
            "request completed"
        );
        Ok(())
    }

    fn record_failure(&self, record: &FailureRecord) -> anyhow::Result<()> {
        if record.status >= 500 {
            tracing::error!(
                target: "quickdemo::failure",
                application = APPLICATION,
            correlation_id = %record.correlation_id,
                method = %record.method,
                path = %record.path,
                status = record.status,
                cause = record.cause.as_deref(),
                "{}",
                record.title
            );
        } else {
            tracing::warn!(
                target: "quickdemo::failure",
                application = APPLICATION,
            correlation_id = %record.correlation_id,
                method = %record.method,
                path = %record.path,
                status = record.status,
                detail = record.detail.as_deref(),
                cause = record.cause.as_deref(),
                "{}",
                record.title
            );
        }
        Ok(())
    }
}

/// Keeps every record in memory. Used by tests and local debugging.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    requests: Mutex<Vec<RequestRecord>>,
    failures: Mutex<Vec<FailureRecord>>,
}

impl MemoryLogSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.requests.lock().clone()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures.lock().clone()
    }
}

impl LogSink for MemoryLogSink {
    fn record_request(&self, record: &RequestRecord) -> anyhow::Result<()> {
        self.requests.lock().push(record.clone());
        Ok(())
    }

    fn record_failure(&self, record: &FailureRecord) -> anyhow::Result<()> {
        self.failures.lock().push(record.clone());
        Ok(())
    }
}
