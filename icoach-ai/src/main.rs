//! icoach-ai - Interview Coaching AI microservice
//!
//! **Module Identity:**
//! - Name: icoach-ai
//! - Default bind: 127.0.0.1:5740
//!
//! Mediates every call to the generative AI provider for the interview
//! practice UI: transcription, evidence extraction, session evaluation and
//! resource search, behind one shared rate-limited queue.

use anyhow::{Context, Result};
use clap::Parser;
use icoach_common::config::{load_toml_config, resolve_config_path, LoggingConfig, TomlConfig};
use icoach_common::events::EventBus;
use icoach_ai::services::GeminiClient;
use icoach_ai::AppState;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Capacity of the evaluation event broadcast buffer
const EVENT_BUS_CAPACITY: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "icoach-ai", version, about = "Interview coaching AI orchestration service")]
struct Args {
    /// Path to the TOML config file (overrides ICOACH_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Listen address (overrides `bind_address` in the config file)
    #[arg(long, env = "ICOACH_BIND", value_name = "ADDR")]
    bind: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid logging level")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;
        }
        None => {
            builder
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), "icoach-ai");
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path)?,
        None => TomlConfig::with_defaults(),
    };

    init_tracing(&toml_config.logging)?;

    info!("Starting icoach-ai (Interview Coaching AI) microservice");
    info!(
        "Version: {} (git {}, {} build)",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: built-in defaults"),
    }

    let api_key = icoach_ai::config::resolve_gemini_api_key(&toml_config)?;
    let client = GeminiClient::new(
        api_key,
        toml_config.provider.base_url.clone(),
        Some(Duration::from_secs(toml_config.provider.request_timeout_secs)),
    )?;
    info!(
        base_url = %toml_config.provider.base_url,
        primary = %toml_config.models.evaluation_primary,
        fallback = %toml_config.models.evaluation_fallback,
        "Provider client initialized"
    );

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let state = AppState::from_config(&toml_config, Arc::new(client), event_bus);
    info!(
        max_concurrent = state.queue.config().max_concurrent,
        min_spacing_ms = state.queue.config().min_spacing.as_millis() as u64,
        "Shared request queue initialized"
    );

    let app = icoach_ai::build_router(state);

    let bind = args
        .bind
        .unwrap_or_else(|| toml_config.bind_address().to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
