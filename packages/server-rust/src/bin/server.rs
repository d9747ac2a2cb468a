//! `QuickDemo` server binary.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use quickdemo_core::{InMemoryPostalCodeLogic, TracingLogSink, APPLICATION};
use quickdemo_server::auth::{JwtValidator, RemoteAuthority};
use quickdemo_server::network::shutdown_signal;
use quickdemo_server::telemetry::init_tracing;
use quickdemo_server::{build_pipeline, AppConfig, AppState, NetworkConfig, NetworkModule};
use tracing::{error, info, info_span, Instrument};

#[tokio::main]
async fn main() -> ExitCode {
    let config = AppConfig::parse();
    if let Err(e) = init_tracing(config.log_format) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    info!(application = APPLICATION, "Starting up");
    let code = match run(config)
        .instrument(info_span!("service", application = APPLICATION))
        .await
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(
                application = APPLICATION,
                error = %format!("{e:#}"),
                "Unhandled exception"
            );
            ExitCode::FAILURE
        }
    };
    info!(application = APPLICATION, "Shut down complete");
    code
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let keys = RemoteAuthority::new(config.discovery_url(), config.jwks_cache_ttl())?;
    let tokens = JwtValidator::new(Arc::new(keys), config.audience.clone());

    let network = NetworkConfig::from(&config);
    info!(
        environment = ?config.environment,
        authority = %config.authority,
        docs = config.docs_enabled(),
        "configuration loaded"
    );

    let state = AppState::new(
        config,
        Arc::new(InMemoryPostalCodeLogic::with_fixtures()),
        Arc::new(tokens),
        Arc::new(TracingLogSink),
    );
    let router = build_pipeline(state);

    let mut module = NetworkModule::new(network);
    module.start().await?;
    module.serve(router, shutdown_signal()).await
}
