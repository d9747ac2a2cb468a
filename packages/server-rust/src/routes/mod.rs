//! Versioned API routes and their OpenAPI registrations.
//!
//! Every route registered here is protected: the pipeline attaches the
//! authentication and authorization gates to this router as a whole.

pub mod postal_codes;

use axum::Router;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::docs::ApiVersionDescriptor;
use crate::network::AppState;
use crate::problem::Problem;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "QuickDemo Documentation",
        version = "v1",
        description = "Postal code lookups for QuickDemo clients."
    ),
    components(schemas(Problem)),
    tags((name = "postal-codes", description = "Postal code lookups"))
)]
struct ApiV1;

/// Router for every API version plus one descriptor per version.
pub fn versioned_routes() -> (Router<AppState>, Vec<ApiVersionDescriptor>) {
    let (v1, v1_doc) = OpenApiRouter::with_openapi(ApiV1::openapi())
        .merge(postal_codes::router())
        .split_for_parts();

    let descriptors = vec![ApiVersionDescriptor::new(
        "v1",
        "QuickDemo API V1",
        "/swagger/v1/swagger.json",
        v1_doc,
    )];
    (v1, descriptors)
}
