//! Liveness endpoint for orchestrators and load balancers.

/// Always `200 Healthy`. Touches no dependency and sits outside the
/// authentication gate.
pub async fn health_handler() -> &'static str {
    "Healthy"
}
