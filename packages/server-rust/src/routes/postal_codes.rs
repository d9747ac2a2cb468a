use axum::extract::{Path, State};
use axum::{Extension, Json};
use quickdemo_core::{DomainError, PostalCode, PostalCodeInfo, RequestContext};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::error::ApiError;
use crate::network::AppState;
use crate::problem::Problem;

/// Location data for one postal code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PostalCodeResponse {
    #[schema(example = "10001")]
    pub code: String,
    #[schema(example = "New York")]
    pub city: String,
    #[schema(example = "NY")]
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<PostalCodeInfo> for PostalCodeResponse {
    fn from(info: PostalCodeInfo) -> Self {
        Self {
            code: info.code,
            city: info.city,
            state: info.state,
            latitude: info.latitude,
            longitude: info.longitude,
        }
    }
}

/// Look up a postal code.
#[utoipa::path(
    get,
    path = "/api/v1/postal-codes/{code}",
    tag = "postal-codes",
    params(("code" = String, Path, description = "Five digit code, optionally with a four digit extension")),
    responses(
        (status = 200, description = "Code found", body = PostalCodeResponse),
        (status = 400, description = "Malformed or unknown code", body = Problem, content_type = "application/problem+json"),
        (status = 401, description = "Missing or invalid bearer token", body = Problem, content_type = "application/problem+json"),
        (status = 403, description = "Token lacks the required scope", body = Problem, content_type = "application/problem+json"),
        (status = 500, description = "Unexpected failure", body = Problem, content_type = "application/problem+json"),
    ),
    security(("oauth2" = []))
)]
pub async fn get_postal_code(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(code): Path<String>,
) -> Result<Json<PostalCodeResponse>, ApiError> {
    let code = PostalCode::parse(&code)?;
    debug!(
        correlation_id = %ctx.correlation_id,
        subject = ctx.subject(),
        %code,
        "looking up postal code"
    );

    let info = state
        .logic
        .lookup(&code)
        .await?
        .ok_or(DomainError::CodeNotFound)?;
    Ok(Json(info.into()))
}

pub(super) fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(get_postal_code))
}
