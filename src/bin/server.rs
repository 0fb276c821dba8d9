//! Mind map server: HTTP API over the shared concept graph.
//!
//! Usage:
//!   MINDGRAPH_DB=/path/to/graph.db MINDGRAPH_BIND=0.0.0.0:8000 mindgraph-server
//!
//! Or with args:
//!   mindgraph-server --db /path/to/graph.db --bind 127.0.0.1:8000

use clap::Parser;
use mindgraph_lib::ai_client::OpenAiClient;
use mindgraph_lib::db::Database;
use mindgraph_lib::http_api::{self, AppState};
use mindgraph_lib::mindmap::MindMapService;
use mindgraph_lib::settings::{self, Settings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "mindgraph-server", version, about = "Mind map knowledge graph HTTP API")]
struct Args {
    /// Database path (overrides MINDGRAPH_DB and settings.json)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Bind address (overrides MINDGRAPH_BIND and settings.json)
    #[arg(long)]
    bind: Option<String>,

    /// Settings file (default: <data dir>/mindgraph/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Write a default settings file on first start so there is something to edit
fn ensure_config_file(path: &Path) {
    if path.exists() {
        return;
    }
    match Settings::default().save(path) {
        Ok(()) => tracing::info!("Wrote default settings to {}", path.display()),
        Err(e) => tracing::warn!("Could not write default settings: {}", e),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config_path = args.config
        .unwrap_or_else(|| settings::default_data_dir().join("settings.json"));
    ensure_config_file(&config_path);
    settings::init_from_file(config_path);

    let db_path = args.db.unwrap_or_else(settings::get_db_path);
    let bind_addr = args.bind.unwrap_or_else(settings::get_bind_addr);

    tracing::info!("Binding to: {}", bind_addr);

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::error!("Failed to create database directory {}: {}", parent.display(), e);
            std::process::exit(1);
        }
    }

    let db = match Database::new(&db_path) {
        Ok(db) => {
            tracing::info!("Opened database at {}", db.get_path());
            Arc::new(db)
        }
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    match settings::get_masked_openai_api_key() {
        Some(masked) => tracing::info!("Using model {} (key {})", settings::get_model_name(), masked),
        None => tracing::warn!("OPENAI_API_KEY not set; /api/add will fail until it is configured"),
    }

    let client = Arc::new(OpenAiClient::from_settings());
    let service = MindMapService::new(db, client.clone(), client);

    match service.root() {
        Ok(root) => tracing::info!("ObjectRoot ready: {}", root.id),
        Err(e) => {
            tracing::error!("Failed to initialize ObjectRoot: {}", e);
            std::process::exit(1);
        }
    }

    let app = http_api::router(AppState::new(service), &settings::get_cors_origins());

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on {}", bind_addr);
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
