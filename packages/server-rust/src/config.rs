//! Process configuration, parsed once at startup from flags and environment.

use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use ipnet::IpNet;
use reqwest::Url;

/// Deployment environment. Only `Development` exposes the API explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Immutable service configuration.
///
/// Every field is settable through a flag or its environment variable.
/// Shared as `Arc<AppConfig>` after parsing.
#[derive(Debug, Clone, Parser)]
#[command(name = "quickdemo-server", version, about = "QuickDemo postal code API")]
pub struct AppConfig {
    /// Bind address.
    #[arg(long, env = "QUICKDEMO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port. 0 means OS-assigned.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "QUICKDEMO_ENVIRONMENT", value_enum, default_value_t = Environment::Production)]
    pub environment: Environment,

    /// Base URL of the identity authority that issues bearer tokens.
    #[arg(long, env = "AUTHENTICATION_AUTHORITY")]
    pub authority: Url,

    /// Audience every accepted token must carry.
    #[arg(long, env = "AUTHENTICATION_API_NAME")]
    pub audience: String,

    /// OAuth client id used by the API explorer.
    #[arg(long, env = "AUTHENTICATION_SWAGGER_CLIENT_ID")]
    pub swagger_client_id: Option<String>,

    /// Explorer authorization endpoint. Defaults to `{authority}/authorize`.
    #[arg(long, env = "AUTHENTICATION_AUTHORIZATION_URL")]
    pub authorization_url: Option<String>,

    /// Explorer token endpoint. Defaults to `{authority}/oauth/token`.
    #[arg(long, env = "AUTHENTICATION_TOKEN_URL")]
    pub token_url: Option<String>,

    /// Scope every protected route requires. Unset means any valid token.
    #[arg(long, env = "AUTHORIZATION_REQUIRED_SCOPE")]
    pub required_scope: Option<String>,

    /// Comma separated list of origins allowed to make cross-origin calls.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Honor forwarded headers from trusted proxies.
    #[arg(long, env = "RUNNING_IN_CONTAINER", action = ArgAction::Set, default_value_t = false)]
    pub running_in_container: bool,

    /// Comma separated CIDRs of proxies whose forwarded headers are trusted.
    #[arg(long, env = "FORWARDED_KNOWN_NETWORKS", value_delimiter = ',')]
    pub known_networks: Vec<IpNet>,

    #[arg(long, env = "AUTHENTICATION_JWKS_CACHE_TTL_SECS", default_value_t = 600)]
    pub jwks_cache_ttl_secs: u64,

    #[arg(long, env = "QUICKDEMO_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "QUICKDEMO_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Authority URL without a trailing slash.
    #[must_use]
    pub fn authority_base(&self) -> &str {
        self.authority.as_str().trim_end_matches('/')
    }

    /// Location of the authority's OpenID discovery document.
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.authority_base())
    }

    #[must_use]
    pub fn authorization_url(&self) -> String {
        self.authorization_url
            .clone()
            .unwrap_or_else(|| format!("{}/authorize", self.authority_base()))
    }

    #[must_use]
    pub fn token_url(&self) -> String {
        self.token_url
            .clone()
            .unwrap_or_else(|| format!("{}/oauth/token", self.authority_base()))
    }

    /// Whether the API explorer and descriptors are served.
    #[must_use]
    pub fn docs_enabled(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Configured CORS origins with blanks removed.
    #[must_use]
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_secs)
    }
}
