//! `QuickDemo` Server: axum service edge with bearer authentication, problem
//! responses and versioned OpenAPI documentation.

pub mod auth;
pub mod config;
pub mod docs;
pub mod error;
pub mod network;
pub mod pipeline;
pub mod problem;
pub mod routes;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AppConfig, Environment, LogFormat};
pub use error::{classify, ApiError, Classification, Failure};
pub use network::{AppState, NetworkConfig, NetworkModule};
pub use pipeline::{build_pipeline, Stage};
pub use problem::Problem;
