//! # Form Trigger Service
//!
//! Binary entry point for the form trigger HTTP service.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes logging
//! - Registers every configured form
//! - Starts the HTTP server from form-trigger-api
//!
//! Exit codes: 1 bind failure, 2 server failure, 3 configuration error.

use form_trigger_api::{
    start_server, FormRegistry, InMemoryDispatcher, LoggingConfig, ServiceConfig, ServiceError,
    CONFIG_FILE_ENV,
};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/form-trigger/service.yaml
    //  2. ./config/service.yaml
    //  3. Path given by FT_CONFIG_FILE
    //  4. Environment variables prefixed FT__ (double-underscore separator)
    //     e.g. FT__SERVER__PORT=9090 sets server.port = 9090
    //
    // Loading happens before logging is initialized so the logging section
    // applies; a failed load falls back to default logging to report it.
    // -------------------------------------------------------------------------
    let explicit_path = std::env::var(CONFIG_FILE_ENV)
        .ok()
        .filter(|path| !path.is_empty())
        .map(PathBuf::from);

    let loaded = ServiceConfig::load(explicit_path.as_deref());

    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_logging(&logging);

    info!("Starting Form Trigger Service");

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(
                error = %e,
                "Could not load service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(ServiceError::from(e).exit_code());
        }
    };

    if let Err(e) = config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(ServiceError::from(e).exit_code());
    }

    let registry = FormRegistry::from_config(&config);

    // No workflow engine is attached to the standalone service; runs are
    // completed in memory and logged, with a bounded history.
    let dispatcher =
        Arc::new(InMemoryDispatcher::new().with_run_history(config.workflow.run_history));

    info!(
        host = %config.server.host,
        port = config.server.port,
        forms = registry.len(),
        "Starting HTTP server"
    );

    if let Err(e) = start_server(config, registry, dispatcher).await {
        error!(error = %e, "Failed to start server");
        std::process::exit(e.exit_code());
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "form_trigger_service={level},form_trigger_api={level},form_trigger_core={level},tower_http=debug",
            level = logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
