//! Request pipeline assembly.
//!
//! The pipeline is an explicit, ordered list of [`Stage`]s. Global stages
//! wrap every route and the fallback; protected stages are attached with
//! `route_layer` to the versioned API only, so they never run for `/health`,
//! the explorer, or unmatched paths. [`build_pipeline`] is the one place
//! that composes them.
//!
//! Order, outermost first:
//!
//! 1. `ProblemBoundary`: request id (unreadable caller ids are replaced),
//!    trace span, request context, problem rendering
//! 2. `ForwardedHeaders`: resolves scheme and client address
//! 3. `Cors`: only when origins are configured
//! 4. `RequestLog`: one record per request
//! 5. `HandlerGuard`: request timeout and panic capture
//! 6. `Authentication` (protected routes)
//! 7. `Authorization` (protected routes)

pub mod boundary;
pub mod request_log;

pub use boundary::{normalize, ProblemBoundaryLayer};
pub use request_log::RequestLogLayer;

use std::sync::Arc;

use axum::middleware::{from_fn_with_state, map_request};
use axum::routing::get;
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::auth::{authenticate, authorize};
use crate::docs::{self, ApiCatalog};
use crate::network::handlers::{fallback_handler, health_handler};
use crate::network::middleware::{
    build_catch_panic_layer, build_cors_layer, build_timeout_layer,
    discard_unreadable_request_id, request_span, REQUEST_ID_HEADER,
};
use crate::network::{AppState, ForwardedHeadersLayer};
use crate::routes;

/// Where a stage is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageScope {
    /// Every request, matched or not.
    Global,
    /// Matched protected routes only.
    Protected,
}

/// What a stage may do to the request flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageContract {
    pub scope: StageScope,
    /// May answer without calling downstream.
    pub short_circuits: bool,
    /// Turns downstream failures into a response instead of propagating them.
    pub failure_boundary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ProblemBoundary,
    ForwardedHeaders,
    Cors,
    RequestLog,
    HandlerGuard,
    Authentication,
    Authorization,
}

impl Stage {
    /// Global stages, outermost first.
    pub const GLOBAL: [Stage; 5] = [
        Stage::ProblemBoundary,
        Stage::ForwardedHeaders,
        Stage::Cors,
        Stage::RequestLog,
        Stage::HandlerGuard,
    ];

    /// Protected-route stages, outermost first.
    pub const PROTECTED: [Stage; 2] = [Stage::Authentication, Stage::Authorization];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ProblemBoundary => "problem-boundary",
            Self::ForwardedHeaders => "forwarded-headers",
            Self::Cors => "cors",
            Self::RequestLog => "request-log",
            Self::HandlerGuard => "handler-guard",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
        }
    }

    #[must_use]
    pub fn contract(self) -> StageContract {
        let (scope, short_circuits, failure_boundary) = match self {
            Self::ProblemBoundary => (StageScope::Global, false, true),
            Self::ForwardedHeaders | Self::RequestLog => (StageScope::Global, false, false),
            // Preflight requests are answered by the CORS layer itself.
            Self::Cors => (StageScope::Global, true, false),
            // Timeout answers 408; a panic becomes a 500 response.
            Self::HandlerGuard => (StageScope::Global, true, true),
            Self::Authentication | Self::Authorization => (StageScope::Protected, true, false),
        };
        StageContract {
            scope,
            short_circuits,
            failure_boundary,
        }
    }

    /// Wraps `router` in this stage.
    fn apply(self, router: Router<AppState>, state: &AppState) -> Router<AppState> {
        match self {
            Self::ProblemBoundary => router
                .layer(ProblemBoundaryLayer::new(Arc::clone(&state.sink)))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
                .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
                .layer(map_request(discard_unreadable_request_id)),
            Self::ForwardedHeaders => {
                router.layer(ForwardedHeadersLayer::new(Arc::clone(&state.transport)))
            }
            Self::Cors => match build_cors_layer(&state.config.cors_origins()) {
                Some(cors) => router.layer(cors),
                None => router,
            },
            Self::RequestLog => router.layer(RequestLogLayer::new(Arc::clone(&state.sink))),
            Self::HandlerGuard => router
                .layer(build_catch_panic_layer())
                .layer(build_timeout_layer(state.config.request_timeout())),
            Self::Authentication => {
                router.route_layer(from_fn_with_state(state.clone(), authenticate))
            }
            Self::Authorization => {
                router.route_layer(from_fn_with_state(state.clone(), authorize))
            }
        }
    }
}

/// Folds `stages` (outermost first) onto `router`.
fn wrap(router: Router<AppState>, stages: &[Stage], state: &AppState) -> Router<AppState> {
    stages
        .iter()
        .rev()
        .fold(router, |router, stage| {
            let contract = stage.contract();
            debug!(
                stage = stage.name(),
                scope = ?contract.scope,
                short_circuits = contract.short_circuits,
                failure_boundary = contract.failure_boundary,
                "attaching pipeline stage"
            );
            stage.apply(router, state)
        })
}

/// Assembles the complete service: routes, explorer, fallback and every
/// pipeline stage.
///
/// API descriptors are generated here from the route registrations, once.
pub fn build_pipeline(state: AppState) -> Router {
    info!(
        transport = ?state.transport.mode(),
        docs = state.config.docs_enabled(),
        policy = ?state.policy,
        "building request pipeline"
    );
    let (api, descriptors) = routes::versioned_routes();
    let api = wrap(api, &Stage::PROTECTED, &state);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .merge(api);

    if state.config.docs_enabled() {
        let catalog = Arc::new(ApiCatalog::new(descriptors, &state.config));
        router = router.merge(docs::router(catalog, &state.config));
    }

    let router = wrap(router.fallback(fallback_handler), &Stage::GLOBAL, &state);
    router.with_state(state)
}
