//! pg-introspect-api - version 0.1.0
//!
//! PostgreSQL introspection API with Prometheus metrics and tracing logging.
//! This is the composition root: it resolves configuration, builds the metrics
//! registry and pool, starts the sampler and serves the router.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};

use pg_introspect_api::cli::{Args, Commands, LogLevel};
use pg_introspect_api::commands::{command_check, command_config};
use pg_introspect_api::config::{
    listen_addr, resolve_config, show_config, validate_effective_config, Config,
    DEFAULT_SAMPLE_INTERVAL_MS,
};
use pg_introspect_api::sampler::spawn_pool_sampler;
use pg_introspect_api::server::{build_router, serve, shutdown_signal};
use pg_introspect_api::{ApiMetrics, AppState, DbPool};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => return,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    if let Some(command) = &args.command {
        return match command {
            Commands::Check => {
                setup_logging(&args);
                let config = resolve_config(&args)?;
                command_check(&config).await
            }
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),
        };
    }

    let config = load_validated_config(&args)?;
    setup_logging(&args);

    info!("Starting pg-introspect-api");

    let addr: SocketAddr = listen_addr(&config)?;

    let metrics = Arc::new(ApiMetrics::new()?);
    metrics.register_default_process_metrics()?;
    info!("Prometheus registry initialized");

    let db = DbPool::connect_lazy(&config.database);

    let sample_every = Duration::from_millis(
        config
            .sample_interval_ms
            .unwrap_or(DEFAULT_SAMPLE_INTERVAL_MS),
    );
    let sampler = spawn_pool_sampler(db.clone(), metrics.clone(), sample_every);

    let tls = if config.enable_tls.unwrap_or(false) {
        // Both paths are guaranteed by validate_effective_config().
        config.tls_cert_path.clone().zip(config.tls_key_path.clone())
    } else {
        None
    };

    let state = AppState::new(db.clone(), metrics, config);
    let app = build_router(state);

    let result = serve(app, addr, tls, shutdown_signal()).await;

    sampler.abort();
    db.close().await;

    if let Err(e) = &result {
        error!("pg-introspect-api stopped with error: {}", e);
    } else {
        info!("pg-introspect-api stopped gracefully");
    }
    result
}
