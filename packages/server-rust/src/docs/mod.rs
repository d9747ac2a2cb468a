//! API descriptors and the interactive explorer.
//!
//! One [`ApiVersionDescriptor`] per API version is generated from the route
//! registrations at startup. The [`ApiCatalog`] adds the OAuth2 security
//! scheme and serves:
//!
//! - `GET /swagger/{version}/swagger.json`: the descriptor, with a `servers`
//!   entry built from the request's resolved transport
//! - `GET /swagger/`: the Swagger UI explorer, configured for the
//!   authorization-code flow with PKCE against the same authority
//!
//! Only mounted in the development environment.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use utoipa::openapi::security::{AuthorizationCode, Flow, OAuth2, Scopes, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::openapi::{Components, OpenApi};
use utoipa::{PartialSchema, ToSchema};
use utoipa_swagger_ui::{oauth, Config, Url};

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::network::{AppState, ResolvedTransport};
use crate::problem::Problem;

/// Name of the security scheme protected operations refer to.
pub const SECURITY_SCHEME: &str = "oauth2";

/// `OAuth` application name shown by the explorer.
const EXPLORER_APP_NAME: &str = "QuickDemo";

/// OpenAPI document of one API version.
#[derive(Debug, Clone)]
pub struct ApiVersionDescriptor {
    version: &'static str,
    display_name: &'static str,
    document_path: &'static str,
    openapi: OpenApi,
}

impl ApiVersionDescriptor {
    #[must_use]
    pub fn new(
        version: &'static str,
        display_name: &'static str,
        document_path: &'static str,
        openapi: OpenApi,
    ) -> Self {
        Self {
            version,
            display_name,
            document_path,
            openapi,
        }
    }

    #[must_use]
    pub fn version(&self) -> &'static str {
        self.version
    }

    #[must_use]
    pub fn display_name(&self) -> &'static str {
        self.display_name
    }

    #[must_use]
    pub fn document_path(&self) -> &'static str {
        self.document_path
    }

    #[must_use]
    pub fn openapi(&self) -> &OpenApi {
        &self.openapi
    }

    /// The document as served to one caller, pointing at the origin the
    /// caller actually used.
    #[must_use]
    pub fn document_for(&self, transport: &ResolvedTransport) -> OpenApi {
        let mut doc = self.openapi.clone();
        if let Some(host) = &transport.host {
            doc.servers = Some(vec![Server::new(format!("{}://{host}", transport.scheme))]);
        }
        doc
    }
}

/// All published versions, immutable after startup.
#[derive(Debug)]
pub struct ApiCatalog {
    versions: Vec<ApiVersionDescriptor>,
}

impl ApiCatalog {
    /// Adds the OAuth2 scheme and the problem schema to every descriptor.
    #[must_use]
    pub fn new(mut versions: Vec<ApiVersionDescriptor>, config: &AppConfig) -> Self {
        for descriptor in &mut versions {
            let components = descriptor
                .openapi
                .components
                .get_or_insert_with(Components::new);
            components.add_security_scheme(SECURITY_SCHEME, security_scheme(config));
            components
                .schemas
                .entry(Problem::name().into_owned())
                .or_insert_with(Problem::schema);
        }
        Self { versions }
    }

    #[must_use]
    pub fn versions(&self) -> &[ApiVersionDescriptor] {
        &self.versions
    }

    #[must_use]
    pub fn get(&self, version: &str) -> Option<&ApiVersionDescriptor> {
        self.versions.iter().find(|d| d.version == version)
    }
}

fn security_scheme(config: &AppConfig) -> SecurityScheme {
    let scopes = match config.required_scope.as_deref() {
        Some(scope) => Scopes::one(scope, "Required by every protected operation"),
        None => Scopes::new(),
    };
    SecurityScheme::OAuth2(OAuth2::new([Flow::AuthorizationCode(
        AuthorizationCode::new(config.authorization_url(), config.token_url(), scopes),
    )]))
}

/// Swagger UI settings: one entry per version, authorization code + PKCE
/// with no client secret, and the API audience passed to the authority.
fn explorer_config(catalog: &ApiCatalog, config: &AppConfig) -> Config<'static> {
    let urls: Vec<Url<'static>> = catalog
        .versions()
        .iter()
        .map(|d| Url::new(d.display_name(), d.document_path()))
        .collect();

    let mut oauth = oauth::Config::new()
        .app_name(EXPLORER_APP_NAME)
        .use_pkce_with_authorization_code_grant(true)
        .additional_query_string_params(HashMap::from([(
            "audience".to_string(),
            config.audience.clone(),
        )]));
    if let Some(client_id) = &config.swagger_client_id {
        oauth = oauth.client_id(client_id);
    }
    if let Some(scope) = &config.required_scope {
        oauth = oauth.scopes(vec![scope.clone()]);
    }

    Config::with_oauth_config(urls, oauth)
}

#[derive(Clone)]
struct DocsState {
    catalog: Arc<ApiCatalog>,
    explorer: Arc<Config<'static>>,
}

/// Explorer and descriptor routes.
pub fn router(catalog: Arc<ApiCatalog>, config: &AppConfig) -> Router<AppState> {
    let explorer = Arc::new(explorer_config(&catalog, config));
    Router::new()
        .route("/swagger", get(|| async { Redirect::to("/swagger/") }))
        .route("/swagger/", get(explorer_index))
        .route("/swagger/{*rest}", get(explorer_path))
        .with_state(DocsState { catalog, explorer })
}

async fn explorer_index(
    State(docs): State<DocsState>,
    Extension(transport): Extension<ResolvedTransport>,
) -> Response {
    serve(&docs, "", &transport)
}

async fn explorer_path(
    State(docs): State<DocsState>,
    Extension(transport): Extension<ResolvedTransport>,
    Path(rest): Path<String>,
) -> Response {
    serve(&docs, &rest, &transport)
}

fn serve(docs: &DocsState, rest: &str, transport: &ResolvedTransport) -> Response {
    let rest = rest.trim_start_matches('/');

    if let Some(version) = rest
        .strip_suffix("/swagger.json")
        .filter(|v| !v.contains('/'))
    {
        return match docs.catalog.get(version) {
            Some(descriptor) => Json(descriptor.document_for(transport)).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        };
    }

    match utoipa_swagger_ui::serve(rest, Arc::clone(&docs.explorer)) {
        Ok(Some(file)) => (
            [(header::CONTENT_TYPE, file.content_type)],
            file.bytes.into_owned(),
        )
            .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => ApiError::Internal(anyhow::anyhow!("explorer asset {rest}: {e}")).into_response(),
    }
}
