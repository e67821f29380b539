//! # Formgate - Contact Form Gateway
//!
//! Accepts contact-form submissions from a static site, screens them, and
//! appends the survivors to a spreadsheet.
//!
//! ## Architecture
//! ```text
//! Browser → Formgate → reCAPTCHA siteverify
//!              ↓
//!        Google Sheets (rows)
//!              ↓
//!   Redis (optional, shared rate limits)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod form;
mod gate;
mod persist;
mod ratelimit;
mod routes;
mod state;
mod verify;

use config::AppConfig;
use ratelimit::sweeper_worker;
use state::AppState;

/// Formgate - contact-form gateway
#[derive(Parser, Debug)]
#[command(name = "formgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/formgate.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Origin allowed to submit (overrides config)
    #[arg(long, env = "ALLOWED_ORIGIN")]
    allowed_origin: Option<String>,

    /// Redis URL; switches rate limiting to the shared Redis store
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// reCAPTCHA secret key
    #[arg(long, env = "RECAPTCHA_SECRET", hide_env_values = true)]
    recaptcha_secret: Option<String>,

    /// Service-account email used for Sheets access
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_EMAIL")]
    google_service_account_email: Option<String>,

    /// Service-account private key (PEM, `\n` escapes allowed)
    #[arg(long, env = "GOOGLE_PRIVATE_KEY", hide_env_values = true)]
    google_private_key: Option<String>,

    /// Target spreadsheet id
    #[arg(long, env = "GOOGLE_SHEET_ID")]
    google_sheet_id: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real env vars win
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("📮 Starting Formgate v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!(
        allowed_origin = %config.allowed_origin,
        submit_path = %config.submit_path,
        "📋 Configuration loaded"
    );
    warn_on_missing_secrets(&config);

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    if let Some(store) = state.memory_limiter.clone() {
        let sweeper_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            sweeper_worker(store, sweeper_shutdown).await;
        });
    }
    info!(
        backend = state.rate_limiter.backend_name(),
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "✅ Rate limiter ready"
    );

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🚀 Formgate listening on {}", config.listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }
        info!("🛑 Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("👋 Formgate shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}

/// Missing secrets fail individual requests, not startup
fn warn_on_missing_secrets(config: &AppConfig) {
    if config
        .verification
        .secret
        .as_deref()
        .is_none_or(|s| s.trim().is_empty())
    {
        tracing::warn!("RECAPTCHA_SECRET not configured; submissions will fail");
    }
    if !config.sheets.has_credentials() {
        tracing::warn!("Google Sheets credentials not configured; submissions will fail");
    }
}
