//! `QuickDemo` Core: request context, principal, domain failures, and the
//! business-logic and log-sink interfaces the service edge is built around.

pub mod context;
pub mod error;
pub mod log;
pub mod logic;
pub mod traits;
pub mod types;

pub use context::RequestContext;
pub use error::{DomainError, LogicError};
pub use log::{FailureRecord, MemoryLogSink, RequestRecord, TracingLogSink, APPLICATION};
pub use logic::InMemoryPostalCodeLogic;
pub use traits::{LogSink, PostalCodeLogic};
pub use types::{PostalCode, PostalCodeInfo, Principal};
