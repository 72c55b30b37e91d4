//! HTTP surface: health, tool manifest, tool description and tool invocation.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::get,
    Json, Router,
};
use genorisk_common::{ApiError, ApiResult};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::tools::{ToolError, ToolRegistry};

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry: Arc::new(registry) }
    }
}

impl From<ToolError> for ApiError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::UnknownTool(name) => ApiError::NotFound(format!("tool '{name}'")),
            ToolError::InvalidParams(msg) => ApiError::BadRequest(msg),
            ToolError::Failed(err) => ApiError::Unprocessable(format!("{err:#}")),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health",           get(health))
        .route("/api/tools",        get(list_tools))
        .route("/api/tools/{name}", get(describe_tool).post(invoke_tool))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let status = if state.registry.is_empty() { "degraded" } else { "ok" };
    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "tools": state.registry.len(),
    }))
}

async fn list_tools(State(state): State<AppState>) -> Json<Value> {
    Json(state.registry.manifest())
}

async fn describe_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .registry
        .describe(&name)
        .map(Json)
        .ok_or_else(|| ToolError::UnknownTool(name).into())
}

async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(params) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if !params.is_object() {
        return Err(ApiError::BadRequest("tool parameters must be a JSON object".into()));
    }
    let output = state.registry.invoke(&name, params).await?;
    Ok(Json(output))
}
