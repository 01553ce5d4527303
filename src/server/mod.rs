pub mod health;
pub mod routes;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::generator::HttpGenerator;
use crate::models::ServerConfig;
use crate::runner::Dispatcher;
use crate::storage::jobs::JsonJobStore;
use crate::storage::JobStore;

/// Shared application state for the Axum server.
pub struct AppState {
    pub job_store: Arc<dyn JobStore>,
    pub dispatcher: Dispatcher,
    pub config: Arc<ServerConfig>,
    pub start_time: Instant,
}

/// Create the Axum router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors(&state.config.allowed_origins);
    Router::new()
        .route("/health", get(health::health_check))
        .route("/analyze", post(routes::analyze))
        .route("/convert", post(routes::convert))
        .route("/jobs", get(routes::list_jobs))
        .route("/jobs/{id}", get(routes::get_job))
        .with_state(state)
        .layer(cors)
}

/// Build the CORS layer from the configured origin allow-list.
/// A single "*" entry allows any origin (without credentials).
fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the ServerConfig. Resolution order:
///   1. --config CLI flag (passed as config_path)
///   2. REPOTHREAD_CONFIG_DIR environment variable
///   3. Platform config dir (dirs::config_dir()/repothread/config.json)
///   4. Fall back to {data_dir}/config.json
///   5. If no config file exists, use ServerConfig::default()
pub fn load_config(config_path: Option<&Path>) -> Result<ServerConfig> {
    if let Some(path) = config_path {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            let config: ServerConfig =
                serde_json::from_str(&content).context("Failed to parse config file")?;
            tracing::info!("Loaded config from: {}", path.display());
            return Ok(config);
        }
        return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
    }

    if let Ok(config_dir) = std::env::var("REPOTHREAD_CONFIG_DIR") {
        let path = PathBuf::from(&config_dir).join("config.json");
        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .context("Failed to read config from REPOTHREAD_CONFIG_DIR")?;
            let config: ServerConfig = serde_json::from_str(&content)
                .context("Failed to parse config from REPOTHREAD_CONFIG_DIR")?;
            tracing::info!("Loaded config from REPOTHREAD_CONFIG_DIR: {}", path.display());
            return Ok(config);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("repothread").join("config.json");
        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .context("Failed to read config from platform config dir")?;
            let config: ServerConfig = serde_json::from_str(&content)
                .context("Failed to parse config from platform config dir")?;
            tracing::info!("Loaded config from: {}", path.display());
            return Ok(config);
        }
    }

    let data_dir = resolve_data_dir(None);
    let path = data_dir.join("config.json");
    if path.exists() {
        let content =
            std::fs::read_to_string(&path).context("Failed to read config from data dir")?;
        let config: ServerConfig =
            serde_json::from_str(&content).context("Failed to parse config from data dir")?;
        tracing::info!("Loaded config from: {}", path.display());
        return Ok(config);
    }

    tracing::info!("No config file found, using defaults");
    Ok(ServerConfig::default())
}

/// Resolve the data directory. If `override_dir` is Some, use it. Otherwise
/// honor REPOTHREAD_DATA_DIR, then the platform data dir.
pub fn resolve_data_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }

    if let Ok(dir) = std::env::var("REPOTHREAD_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::data_dir()
        .map(|d| d.join("repothread"))
        .unwrap_or_else(|| PathBuf::from(".repothread"))
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Construct the store, generator and dispatcher, then serve until shutdown.
pub async fn run(config: ServerConfig) -> Result<()> {
    let data_dir = resolve_data_dir(config.data_dir.as_deref());
    tracing::info!("Using data directory: {}", data_dir.display());

    let store = Arc::new(JsonJobStore::new(data_dir).await?);
    let generator = Arc::new(HttpGenerator::new(config.generator.clone()));
    let dispatcher = Dispatcher::start(
        Arc::clone(&store) as Arc<dyn JobStore>,
        generator,
        &config,
    );

    let state = Arc::new(AppState {
        job_store: store,
        dispatcher,
        config: Arc::new(config.clone()),
        start_time: Instant::now(),
    });

    let router = create_router(state);
    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context(format!("Failed to bind to {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C signal");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received Ctrl+C signal");
    }
}
