use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use super::AppState;

/// Landing page for unmatched requests.
pub const EXPLORER_PATH: &str = "/swagger";

/// Redirects every unmatched request to the API explorer with `302 Found`.
///
/// When the explorer is not served, requests for it get a 404 instead of a
/// redirect back to themselves.
pub async fn fallback_handler(State(state): State<AppState>, uri: Uri) -> Response {
    if !state.config.docs_enabled() && is_explorer_path(uri.path()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    (StatusCode::FOUND, [(header::LOCATION, EXPLORER_PATH)]).into_response()
}

fn is_explorer_path(path: &str) -> bool {
    path == EXPLORER_PATH
        || path
            .strip_prefix(EXPLORER_PATH)
            .is_some_and(|rest| rest.starts_with('/'))
}
