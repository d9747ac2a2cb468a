//! Networking: listener lifecycle, forwarded-header trust, transport
//! middleware, and the handlers outside the versioned API.

pub mod config;
pub mod forwarded;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::NetworkConfig;
pub use forwarded::{ForwardedHeadersLayer, ForwardedHeadersPolicy, ResolvedTransport, TransportMode};
pub use handlers::AppState;
pub use module::NetworkModule;
pub use shutdown::shutdown_signal;
