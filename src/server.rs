//! HTTP tool server.
//!
//! Serves the [`ToolRegistry`] over a plain JSON API and over MCP
//! (streamable HTTP) from the same process.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `*`    | `/mcp` | MCP JSON-RPC endpoint |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `timeout` (408),
//! `backend_disabled` (503), `tool_error` (500).
//!
//! Query failures reported by the backend are not HTTP errors: `search_logs`
//! answers 200 with an outcome carrying `success: false`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::backend::QueryBackend;
use crate::config::Config;
use crate::mcp::McpBridge;
use crate::traits::{validate_params, ToolContext, ToolInfo, ToolRegistry};

/// Shared state handed to every route handler.
#[derive(Clone)]
struct AppState {
    ctx: ToolContext,
    tools: Arc<ToolRegistry>,
}

/// Build the router without binding. Used by [`run_server`] and by tests
/// that serve on an ephemeral port.
pub fn build_router(
    config: Arc<Config>,
    backend: Option<Arc<dyn QueryBackend>>,
    tools: Arc<ToolRegistry>,
) -> Router {
    let ctx = ToolContext::new(config, backend);

    let bridge = McpBridge::new(ctx.clone(), tools.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(AppState { ctx, tools })
}

/// Bind to `[server].bind` and serve until the process exits.
pub async fn run_server(
    config: &Config,
    backend: Option<Arc<dyn QueryBackend>>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let tools = Arc::new(ToolRegistry::with_builtins());

    for t in tools.tools() {
        tracing::info!(tool = t.name(), "registered tool");
    }
    if backend.is_none() {
        tracing::warn!("no query backend configured; search_logs will fail");
    }

    let app = build_router(Arc::new(config.clone()), backend, tools);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("tool server listening on http://{} (MCP at /mcp)", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

/// Map a tool error to an HTTP status by its message.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = format!("{}: {}", tool_name, err);
    let raw = err.to_string();

    if raw.contains("backend is disabled") {
        app_error(StatusCode::SERVICE_UNAVAILABLE, "backend_disabled", msg)
    } else if raw.contains("must not be empty")
        || raw.contains("must be")
        || raw.contains("invalid")
        || raw.contains("Unknown query type")
        || raw.contains("required")
    {
        app_error(StatusCode::BAD_REQUEST, "bad_request", msg)
    } else if raw.contains("timed out") {
        app_error(StatusCode::REQUEST_TIMEOUT, "timeout", msg)
    } else {
        app_error(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", msg)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::from_tool(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

/// 404 for an unknown tool, 400 for parameter errors, otherwise whatever
/// [`classify_tool_error`] decides.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state.tools.find(&name).ok_or_else(|| {
        app_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no tool registered with name: {}", name),
        )
    })?;

    let validated = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| app_error(StatusCode::BAD_REQUEST, "bad_request", e.to_string()))?;

    tracing::debug!(tool = %name, "tool call");
    let result = tool
        .execute(validated, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
