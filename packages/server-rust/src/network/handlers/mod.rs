//! HTTP handlers that live outside the versioned API.
//!
//! This module also defines `AppState`, the shared state carried through
//! axum extractors by every route and route-scoped middleware.

pub mod fallback;
pub mod health;

pub use fallback::fallback_handler;
pub use health::health_handler;

use std::sync::Arc;

use quickdemo_core::{LogSink, PostalCodeLogic};

use super::ForwardedHeadersPolicy;
use crate::auth::{AuthorizationPolicy, TokenValidator};
use crate::config::AppConfig;

/// Shared application state passed to handlers via `State` extraction.
///
/// Everything is behind `Arc` and read-only after startup, so cloning is
/// cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Business logic invoked by the versioned routes.
    pub logic: Arc<dyn PostalCodeLogic>,
    /// Bearer token verification used by the authentication gate.
    pub tokens: Arc<dyn TokenValidator>,
    /// Receives request and failure records.
    pub sink: Arc<dyn LogSink>,
    pub transport: Arc<ForwardedHeadersPolicy>,
    pub policy: Arc<AuthorizationPolicy>,
}

impl AppState {
    /// Derives the trust and authorization policies from `config`.
    #[must_use]
    pub fn new(
        config: AppConfig,
        logic: Arc<dyn PostalCodeLogic>,
        tokens: Arc<dyn TokenValidator>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            transport: Arc::new(ForwardedHeadersPolicy::from_config(&config)),
            policy: Arc::new(AuthorizationPolicy::from_config(&config)),
            config: Arc::new(config),
            logic,
            tokens,
            sink,
        }
    }
}
