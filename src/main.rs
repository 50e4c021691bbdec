//! # Reverse Audio Backend - Main Application Entry Point
//!
//! An Actix-web HTTP service that takes base64 audio (mp3, wav or aac), checks
//! it against the configured limits, reverses it in time and returns it in the
//! same format.
//!
//! ## Application Architecture:
//! - **config**: Handles application configuration (TOML files + environment variables)
//! - **state**: Shared runtime config, metrics and the codec handle
//! - **audio**: Format allow-list, codec backends and the reversal pipeline
//! - **handlers**: HTTP request handlers for API endpoints
//! - **health**: Health and metrics endpoints
//! - **middleware**: Request logging and metrics collection
//! - **error**: Error types and their HTTP responses

mod audio;
mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod state;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use crate::audio::{CodecRouter, FfmpegCodec};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set by the signal task once SIGTERM or SIGINT arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from `.env`, config.toml and environment variables
/// 2. **Sets up logging**
/// 3. **Probes ffmpeg** so a missing binary is reported at startup, not per request
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** when receiving system signals
#[actix_web::main]
async fn main() -> Result<()> {
    // It's fine if there's no .env file
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting reverse-audio-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    info!(
        max_file_size_bytes = config.limits.max_file_size_bytes,
        max_duration_ms = config.limits.max_duration_ms,
        max_request_body_bytes = config.limits.max_request_body_bytes,
        "Reversal limits"
    );

    let ffmpeg = FfmpegCodec::from_config(&config.codec);
    let ffmpeg_version = ffmpeg.version();
    match &ffmpeg_version {
        Some(version) => info!(ffmpeg = %config.codec.ffmpeg_path, "Using {}", version),
        None => warn!(
            ffmpeg = %config.codec.ffmpeg_path,
            "ffmpeg is not available; mp3 and aac requests will fail until it is installed"
        ),
    }

    let app_state = AppState::new(config.clone(), Arc::new(CodecRouter::new(ffmpeg)), ffmpeg_version);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let body_limit = config.limits.max_request_body_bytes;

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Middleware executes in reverse order of registration for requests
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(|cfg| handlers::configure_reverse_routes(cfg, body_limit))
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config)),
            )
            .route("/health", web::get().to(health::health_check))
            .default_service(web::to(not_found))
    });

    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    let server = server.bind(&bind_addr)?.run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Whichever finishes first wins: the server (usually an error) or a shutdown signal
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

async fn not_found(req: actix_web::HttpRequest) -> Result<actix_web::HttpResponse, AppError> {
    Err(AppError::NotFound(format!("No route for {} {}", req.method(), req.path())))
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "reverse_audio_backend=debug")
/// - If not set, defaults to "reverse_audio_backend=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reverse_audio_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Listen for SIGTERM and SIGINT and set the global shutdown flag.
///
/// If a handler cannot be installed the failure is logged and the other signal
/// still works; the server's own signal handling remains as a fallback.
fn setup_signal_handlers() {
    tokio::spawn(async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => Some(sigterm),
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    None
                }
            };

            tokio::select! {
                _ = async {
                    match sigterm.as_mut() {
                        Some(sigterm) => { sigterm.recv().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    info!("Received SIGTERM");
                }
                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => info!("Received SIGINT"),
                        Err(e) => {
                            error!("Failed to listen for SIGINT: {}", e);
                            return;
                        }
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Received Ctrl+C");
        }

        // SeqCst ensures this change is visible to all threads
        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown signal to be set, polling every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
