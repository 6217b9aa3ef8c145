//! Tool trait, execution context, and the built-in tool set.
//!
//! Every capability the harness exposes over HTTP and MCP is a [`Tool`]
//! registered in a [`ToolRegistry`]. Both transports dispatch through the
//! same path: look the tool up, run [`validate_params`] against its schema,
//! then call [`Tool::execute`] with a [`ToolContext`].
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                     ToolRegistry                       │
//! │  search_logs  validate_query  query_examples           │
//! │  security_query  build_query  dashboard_queries        │
//! └──────────────┬──────────────────────────┬──────────────┘
//!                ▼                          ▼
//!        POST /tools/{name}              /mcp call_tool
//! ```
//!
//! # Usage
//!
//! ```rust
//! use logan_harness::traits::ToolRegistry;
//!
//! let mut tools = ToolRegistry::with_builtins();
//! // tools.register(Box::new(MyTool::new()));
//! assert_eq!(tools.len(), 6);
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::backend::QueryBackend;
use crate::catalog::{build_custom_query, dashboard_queries, family_names, security_query};
use crate::config::Config;
use crate::execute::{execute_console, execute_query, ExecutionSettings};
use crate::models::RawQuery;
use crate::normalize::{normalize, NormalizeOptions};
use crate::validate::working_examples;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that agents can discover and call.
///
/// # Lifecycle
///
/// 1. The tool is registered via [`ToolRegistry::register`].
/// 2. [`name`](Tool::name), [`description`](Tool::description), and
///    [`parameters_schema`](Tool::parameters_schema) are read for
///    `GET /tools/list` and MCP `tools/list`.
/// 3. [`execute`](Tool::execute) runs on each invocation, after the
///    parameters were checked against the schema.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`). Lowercase with underscores.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Built-in tools are flagged `"builtin": true` in the tool list.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema with `type: "object"`, `properties` and optionally
    /// `required`.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. The returned value is wrapped in `{ "result": … }`.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Tool descriptor as listed by `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Check `params` against a tool's JSON Schema.
///
/// Enforces required fields, primitive types and `enum` membership, and
/// injects `default` values for absent properties. Returns the params
/// object with defaults filled in.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be a JSON object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if !params_obj.contains_key(*field) {
            bail!("missing required parameter: {}", field);
        }
    }

    let mut result = params_obj.clone();

    for (prop_name, prop_schema) in &properties {
        let Some(value) = params_obj.get(prop_name) else {
            if let Some(default) = prop_schema.get("default") {
                result.insert(prop_name.clone(), default.clone());
            }
            continue;
        };

        if let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "parameter '{}' must be of type '{}', got {}",
                    prop_name,
                    expected,
                    json_type_name(value)
                );
            }
        }

        if let Some(allowed) = prop_schema.get("enum").and_then(|e| e.as_array()) {
            if !allowed.contains(value) {
                let allowed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                bail!(
                    "parameter '{}' must be one of [{}], got {}",
                    prop_name,
                    allowed.join(", "),
                    value
                );
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// What a tool may touch while executing: configuration and, when one is
/// configured, the query backend.
#[derive(Clone)]
pub struct ToolContext {
    config: Arc<Config>,
    backend: Option<Arc<dyn QueryBackend>>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, backend: Option<Arc<dyn QueryBackend>>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> Result<&dyn QueryBackend> {
        match &self.backend {
            Some(b) => Ok(b.as_ref()),
            None => bail!("query backend is disabled: set backend.namespace and backend.compartment_id"),
        }
    }

    /// `time_period_minutes` from `params`, or the configured default,
    /// checked against the configured bounds.
    pub fn minutes(&self, params: &Value) -> Result<u32> {
        let query = &self.config.query;
        match params.get("time_period_minutes").and_then(|v| v.as_u64()) {
            Some(m) => query.check_minutes(u32::try_from(m).unwrap_or(u32::MAX)),
            None => {
                if params.get("time_period_minutes").is_some_and(|v| !v.is_null()) {
                    bail!("time_period_minutes is invalid: expected a positive integer");
                }
                Ok(query.default_time_period_minutes)
            }
        }
    }
}

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    let value = params[key].as_str().unwrap_or("");
    if value.trim().is_empty() {
        bail!("{} must not be empty", key);
    }
    Ok(value)
}

fn string_list(params: &Value, key: &str) -> Vec<String> {
    match &params[key] {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

/// Normalize and run a query, with one fallback attempt on rejection.
pub struct SearchLogsTool;

#[async_trait]
impl Tool for SearchLogsTool {
    fn name(&self) -> &str {
        "search_logs"
    }

    fn description(&self) -> &str {
        "Run a log query, normalizing it first and retrying once with a simplified form if the backend rejects it"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Query in the log-analytics query language" },
                "time_period_minutes": { "type": "integer", "description": "Look-back window in minutes" },
                "max_rows": { "type": "integer", "description": "Maximum rows to return" },
                "console_mode": { "type": "boolean", "description": "Send as the web console would: explicit time range, minimal rewriting, no fallback", "default": false },
                "bypass_all_processing": { "type": "boolean", "description": "Console mode only: skip optional processing", "default": false }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let minutes = ctx.minutes(&params)?;
        let console = params["console_mode"].as_bool().unwrap_or(false);
        let bypass = params["bypass_all_processing"].as_bool().unwrap_or(false);

        let limits = &ctx.config.query;
        let default_rows = if console {
            limits.console_max_rows
        } else {
            limits.default_max_rows
        };
        let max_rows = params["max_rows"]
            .as_u64()
            .map(|r| limits.clamp_rows(u32::try_from(r).unwrap_or(u32::MAX)))
            .unwrap_or(default_rows);

        let backend = ctx.backend()?;
        let settings = ExecutionSettings::from_config(&ctx.config);
        let raw = RawQuery::new(query, minutes, max_rows);

        let outcome = if console {
            execute_console(backend, &settings, &raw, bypass).await
        } else {
            execute_query(backend, &settings, &raw).await
        };
        Ok(serde_json::to_value(&outcome)?)
    }
}

/// Normalize without executing.
pub struct ValidateQueryTool;

#[async_trait]
impl Tool for ValidateQueryTool {
    fn name(&self) -> &str {
        "validate_query"
    }

    fn description(&self) -> &str {
        "Show how a query would be normalized before execution, with warnings"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Query to check" },
                "time_period_minutes": { "type": "integer", "description": "Inject a relative time filter for this window" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let minutes = match params.get("time_period_minutes") {
            Some(v) if !v.is_null() => Some(ctx.minutes(&params)?),
            _ => None,
        };
        let result = normalize(
            query,
            &NormalizeOptions {
                time_period_minutes: minutes,
                available_sources: &ctx.config.query.available_sources,
            },
        );
        Ok(serde_json::to_value(&result)?)
    }
}

pub struct QueryExamplesTool;

#[async_trait]
impl Tool for QueryExamplesTool {
    fn name(&self) -> &str {
        "query_examples"
    }

    fn description(&self) -> &str {
        "List queries known to execute cleanly"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> Result<Value> {
        Ok(serde_json::to_value(working_examples())?)
    }
}

/// Render a named family from the security catalog.
pub struct SecurityQueryTool;

#[async_trait]
impl Tool for SecurityQueryTool {
    fn name(&self) -> &str {
        "security_query"
    }

    fn description(&self) -> &str {
        "Get prebuilt security queries for a threat category"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query_type": { "type": "string", "enum": family_names() },
                "time_period_minutes": { "type": "integer", "description": "Look-back window in minutes" }
            },
            "required": ["query_type"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query_type = required_str(&params, "query_type")?;
        let minutes = ctx.minutes(&params)?;
        Ok(serde_json::to_value(security_query(query_type, minutes)?)?)
    }
}

pub struct BuildQueryTool;

#[async_trait]
impl Tool for BuildQueryTool {
    fn name(&self) -> &str {
        "build_query"
    }

    fn description(&self) -> &str {
        "Build a full-text query from search terms, optional log sources and severity"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "search_terms": { "type": "array", "items": { "type": "string" } },
                "log_sources": { "type": "array", "items": { "type": "string" } },
                "severity": { "type": "string", "description": "Severity to match, or \"all\"" },
                "time_period_minutes": { "type": "integer", "description": "Look-back window in minutes" }
            },
            "required": ["search_terms"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let terms = string_list(&params, "search_terms");
        if terms.is_empty() {
            bail!("search_terms must not be empty");
        }
        let sources = string_list(&params, "log_sources");
        let minutes = ctx.minutes(&params)?;
        let built = build_custom_query(&terms, &sources, params["severity"].as_str(), minutes)?;
        Ok(serde_json::to_value(&built)?)
    }
}

pub struct DashboardQueriesTool;

#[async_trait]
impl Tool for DashboardQueriesTool {
    fn name(&self) -> &str {
        "dashboard_queries"
    }

    fn description(&self) -> &str {
        "Summary queries for a security dashboard"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "time_period_minutes": { "type": "integer", "description": "Look-back window in minutes" }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let minutes = ctx.minutes(&params)?;
        Ok(serde_json::to_value(dashboard_queries(minutes))?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding the six built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchLogsTool));
        registry.register(Box::new(ValidateQueryTool));
        registry.register(Box::new(QueryExamplesTool));
        registry.register(Box::new(SecurityQueryTool));
        registry.register(Box::new(BuildQueryTool));
        registry.register(Box::new(DashboardQueriesTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Validate `params` against the named tool's schema and run it.
    pub async fn call(&self, name: &str, params: &Value, ctx: &ToolContext) -> Result<Value> {
        let Some(tool) = self.find(name) else {
            bail!("no tool registered with name: {} (not found)", name);
        };
        let validated = validate_params(&tool.parameters_schema(), params)?;
        tool.execute(validated, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
