//! HTTP surface over the mind map engine.
//!
//! Thin axum layer: request guards live here, everything else is delegated
//! to `MindMapService`.
//!
//!   POST   /api/add                 generate + attach a mind map
//!   GET    /api/export/{node_id}    nested tree under a node
//!   GET    /api/graph               flat nodes/links projection
//!   DELETE /api/nodes/{node_id}     remove a node and its descendants

use crate::ai_client::MindMapDraft;
use crate::error::MindMapError;
use crate::mindmap::{ExportedNode, GraphView, MindMapService, ROOT_TITLE};
use crate::utils::short_id;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

const MAX_BODY_BYTES: usize = 64 * 1024;

// ============================================================================
// AppState
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub service: MindMapService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: MindMapService) -> Self {
        Self { service, start_time: Instant::now() }
    }
}

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug)]
pub struct AppError(pub StatusCode, pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({"error": self.1}))).into_response()
    }
}

impl From<MindMapError> for AppError {
    fn from(e: MindMapError) -> Self {
        match e {
            MindMapError::NotFound(_) => not_found("Node not found."),
            MindMapError::Rejected(msg) => bad_request(msg),
            MindMapError::Generation(msg) => {
                tracing::warn!("Generation failed: {}", msg);
                AppError(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate mind map from AI service.".to_string())
            }
            // Store and task failures stay in the server log
            other => {
                tracing::error!("Request failed: {}", other);
                AppError(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.".to_string())
            }
        }
    }
}

fn not_found(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::NOT_FOUND, msg.into())
}

fn bad_request(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::BAD_REQUEST, msg.into())
}

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AddMindMapRequest {
    pub keyword: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub nodes: usize,
    pub edges: usize,
    pub uptime_secs: u64,
}

// ============================================================================
// Guards
// ============================================================================

/// The root's name may never be used as a keyword, in any casing
pub fn is_reserved_keyword(keyword: &str) -> bool {
    keyword.trim().eq_ignore_ascii_case(ROOT_TITLE)
}

fn check_keyword(keyword: &str) -> Result<(), MindMapError> {
    if keyword.trim().is_empty() {
        return Err(MindMapError::Rejected("Keyword must not be empty.".to_string()));
    }
    if is_reserved_keyword(keyword) {
        return Err(MindMapError::Rejected(format!("'{}' is a reserved keyword.", ROOT_TITLE)));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

// GET /
async fn welcome_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"message": "Welcome to the Super Mind Map System API"}))
}

// POST /api/add
async fn add_mind_map_handler(
    State(state): State<AppState>,
    Json(req): Json<AddMindMapRequest>,
) -> Result<Json<MindMapDraft>, AppError> {
    check_keyword(&req.keyword)?;

    let draft = state.service.add_mind_map(req.keyword.trim()).await?;
    Ok(Json(draft))
}

// GET /api/export/{node_id}
async fn export_handler(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<ExportedNode>, AppError> {
    Ok(Json(state.service.export(&node_id)?))
}

// GET /api/graph
async fn graph_handler(
    State(state): State<AppState>,
) -> Result<Json<GraphView>, AppError> {
    Ok(Json(state.service.get_graph()?))
}

// DELETE /api/nodes/{node_id}
async fn delete_node_handler(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let root = state.service.db().get_root().map_err(MindMapError::from)?;
    if root.is_some_and(|r| r.id == node_id) {
        return Err(bad_request("Cannot delete the root node."));
    }

    let deleted = state.service.delete_subtree(&node_id)?;
    tracing::info!("[DELETE /api/nodes/{}] {} nodes removed", short_id(&node_id), deleted);

    Ok(StatusCode::NO_CONTENT)
}

// GET /health
async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, AppError> {
    let (nodes, edges) = state.service.db().get_stats().map_err(MindMapError::from)?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        nodes,
        edges,
        uptime_secs: state.start_time.elapsed().as_secs(),
    }))
}

// ============================================================================
// Router
// ============================================================================

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let mut parsed = Vec::new();
    for origin in origins {
        match HeaderValue::from_str(origin) {
            Ok(value) => parsed.push(value),
            Err(e) => tracing::warn!("Ignoring invalid CORS origin '{}': {}", origin, e),
        }
    }

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(parsed)
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(welcome_handler))
        .route("/api/add", post(add_mind_map_handler))
        .route("/api/export/{node_id}", get(export_handler))
        .route("/api/graph", get(graph_handler))
        .route("/api/nodes/{node_id}", delete(delete_node_handler))
        .route("/health", get(health_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}
