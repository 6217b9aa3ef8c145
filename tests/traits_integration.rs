//! Integration tests for the tool surface.
//!
//! Built-in and custom tools are driven through the registry and through the
//! real HTTP server, with an in-memory backend standing in for the
//! log-analytics API.

use anyhow::Result;
use async_trait::async_trait;
use logan_harness::backend::{QueryBackend, QueryRequest, QueryResponse};
use logan_harness::config::Config;
use logan_harness::error::BackendError;
use logan_harness::server::build_router;
use logan_harness::traits::{Tool, ToolContext, ToolRegistry};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

// ─── Test Backend ───────────────────────────────────────────────────

/// Rejects any query containing `sort`, answers everything else with one
/// row echoing the query. Records every request.
#[derive(Default)]
struct SortRejectingBackend {
    requests: Mutex<Vec<QueryRequest>>,
}

impl SortRejectingBackend {
    fn sent(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.query_string.clone())
            .collect()
    }
}

#[async_trait]
impl QueryBackend for SortRejectingBackend {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        if request.query_string.contains("sort") {
            return Err(BackendError::Rejected {
                status: 400,
                code: "InvalidParameter".to_string(),
                message: "Cannot sort on aggregate".to_string(),
            });
        }
        Ok(QueryResponse {
            items: vec![json!({ "query": request.query_string })],
            total_count: 1,
            execution_time_ms: 7,
            are_partial_results: false,
        })
    }
}

// ─── Test Tool ──────────────────────────────────────────────────────

/// A custom tool that reports how a query would be rewritten.
struct RuleCountTool;

#[async_trait]
impl Tool for RuleCountTool {
    fn name(&self) -> &str {
        "rule_count"
    }

    fn description(&self) -> &str {
        "Count rewrite rules applied to a query"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("");
        let out = logan_harness::rewrite::normalize_syntax(query);
        Ok(json!({ "count": out.applied.len() }))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config() -> Config {
    toml::from_str(
        r#"[backend]
namespace = "testns"
compartment_id = "ocid1.compartment.oc1..test"

[query]
default_time_period_minutes = 60
"#,
    )
    .unwrap()
}

fn context(backend: Arc<SortRejectingBackend>) -> ToolContext {
    let backend: Arc<dyn QueryBackend> = backend;
    ToolContext::new(Arc::new(test_config()), Some(backend))
}

async fn spawn_server(
    backend: Option<Arc<dyn QueryBackend>>,
    tools: ToolRegistry,
) -> (String, tokio::task::JoinHandle<()>) {
    let app = build_router(Arc::new(test_config()), backend, Arc::new(tools));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (format!("http://{}", addr), handle)
}

// ─── Registry dispatch ──────────────────────────────────────────────

#[tokio::test]
async fn test_search_logs_falls_back_once() {
    let backend = Arc::new(SortRejectingBackend::default());
    let ctx = context(backend.clone());

    let out = ToolRegistry::with_builtins()
        .call(
            "search_logs",
            &json!({
                "query": "'Log Source' = 'OCI Audit Logs' | stats count by Action | sort -count",
                "time_period_minutes": 120
            }),
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(out["success"], true);
    assert_eq!(out["fallback_used"], true);
    assert_eq!(out["path"], "fallback");
    assert_eq!(
        out["query_used"],
        "'Log Source' = 'OCI Audit Logs' | stats count by Action"
    );

    let sent = backend.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].contains("Time > dateRelative(2h)"));
    assert!(!sent[1].contains("dateRelative"));
}

#[tokio::test]
async fn test_search_logs_rejected_twice_reports_backend_error() {
    let backend = Arc::new(SortRejectingBackend::default());
    let ctx = context(backend.clone());

    // No stats stage, so the fallback keeps the sort and is rejected too.
    let out = ToolRegistry::with_builtins()
        .call("search_logs", &json!({ "query": "* | sort -Time" }), &ctx)
        .await
        .unwrap();

    assert_eq!(out["success"], false);
    assert_eq!(out["fallback_used"], true);
    assert_eq!(out["error"]["code"], "InvalidParameter");
    assert_eq!(out["error"]["message"], "Cannot sort on aggregate");
    assert!(out["error"]["hint"].is_string());
    assert_eq!(backend.sent().len(), 2);
}

#[tokio::test]
async fn test_search_logs_console_mode() {
    let backend = Arc::new(SortRejectingBackend::default());
    let ctx = context(backend.clone());

    let out = ToolRegistry::with_builtins()
        .call(
            "search_logs",
            &json!({ "query": "* | where x != null | head 3", "console_mode": true }),
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(out["success"], true);
    assert_eq!(out["console_mode"], true);
    assert_eq!(out["compartment_id_in_subtree"], true);
    assert_eq!(backend.sent(), vec![r#"* | where x != "" | head 3"#.to_string()]);

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests[0].max_rows, 2000);
}

#[tokio::test]
async fn test_search_logs_clamps_rows() {
    let backend = Arc::new(SortRejectingBackend::default());
    let ctx = context(backend.clone());

    ToolRegistry::with_builtins()
        .call(
            "search_logs",
            &json!({ "query": "* | head 3", "max_rows": 999_999 }),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(backend.requests.lock().unwrap()[0].max_rows, 10_000);
}

#[tokio::test]
async fn test_security_query_and_dashboard_tools() {
    let ctx = context(Arc::new(SortRejectingBackend::default()));
    let registry = ToolRegistry::with_builtins();

    let family = registry
        .call("security_query", &json!({ "query_type": "audit_changes" }), &ctx)
        .await
        .unwrap();
    assert_eq!(family["type"], "audit_changes");
    assert!(family["queries"][0]
        .as_str()
        .unwrap()
        .starts_with("timefilter(1h) | where"));

    let dash = registry
        .call("dashboard_queries", &json!({}), &ctx)
        .await
        .unwrap();
    assert_eq!(dash["time_period_minutes"], 60);

    let examples = registry
        .call("query_examples", &json!({}), &ctx)
        .await
        .unwrap();
    assert!(examples["stats_queries"].as_array().unwrap().len() >= 3);
}

// ─── HTTP server ────────────────────────────────────────────────────

#[tokio::test]
async fn test_tool_list_includes_builtins_and_custom() {
    let mut tools = ToolRegistry::with_builtins();
    tools.register(Box::new(RuleCountTool));
    let (base, handle) = spawn_server(None, tools).await;

    let client = reqwest::Client::new();
    let body: Value = client
        .get(format!("{}/tools/list", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let tools = body["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 7);
    let custom = tools.iter().find(|t| t["name"] == "rule_count").unwrap();
    assert_eq!(custom["builtin"], false);
    let search = tools.iter().find(|t| t["name"] == "search_logs").unwrap();
    assert_eq!(search["builtin"], true);
    assert_eq!(search["parameters"]["required"], json!(["query"]));

    handle.abort();
}

#[tokio::test]
async fn test_http_tool_calls_and_errors() {
    let mut tools = ToolRegistry::with_builtins();
    tools.register(Box::new(RuleCountTool));
    let (base, handle) = spawn_server(None, tools).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let health: Value = resp.json().await.unwrap();
    assert_eq!(health["status"], "ok");

    // Custom tool
    let resp = client
        .post(format!("{}/tools/rule_count", base))
        .json(&json!({ "query": "* | stats count(*) | top 5 count" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"]["count"], 2);

    // validate_query works without a backend
    let resp = client
        .post(format!("{}/tools/validate_query", base))
        .json(&json!({ "query": "fieldX != someLiteral" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"]["final_query"], r#"fieldX != """#);

    // Missing required param → 400
    let resp = client
        .post(format!("{}/tools/validate_query", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    // Out-of-range minutes → 400
    let resp = client
        .post(format!("{}/tools/security_query", base))
        .json(&json!({ "query_type": "cloud_guard", "time_period_minutes": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // No backend → 503
    let resp = client
        .post(format!("{}/tools/search_logs", base))
        .json(&json!({ "query": "* | head 1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "backend_disabled");

    // Unknown tool → 404
    let resp = client
        .post(format!("{}/tools/nonexistent", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    handle.abort();
}

#[tokio::test]
async fn test_http_search_logs_with_backend() {
    let backend: Arc<dyn QueryBackend> = Arc::new(SortRejectingBackend::default());
    let (base, handle) = spawn_server(Some(backend), ToolRegistry::with_builtins()).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/tools/search_logs", base))
        .json(&json!({ "query": "* | stats count(*)", "time_period_minutes": 60 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let result = &body["result"];
    assert_eq!(result["success"], true);
    assert_eq!(result["path"], "primary");
    assert_eq!(
        result["query_used"],
        "* | where Time > dateRelative(1h) | stats count"
    );
    assert_eq!(result["results"][0]["query"], result["query_used"]);

    handle.abort();
}
