//! Query-execution backend.
//!
//! [`QueryBackend`] is the seam between the execution controller and the
//! log-analytics API. [`HttpBackend`] talks to the real service; tests plug
//! in scripted implementations.
//!
//! # Request shape
//!
//! `POST {base}/20200601/namespaces/{ns}/search/actions/query?limit={max_rows}`
//! with the same body the web console sends:
//!
//! ```json
//! {
//!   "subSystem": "LOG",
//!   "queryString": "* | head 10",
//!   "shouldRunAsync": false,
//!   "shouldIncludeTotalCount": true,
//!   "compartmentId": "ocid1.compartment…",
//!   "compartmentIdInSubtree": true,
//!   "timeFilter": { "timeStart": "…", "timeEnd": "…", "timeZone": "UTC" },
//!   "maxTotalCount": 50
//! }
//! ```
//!
//! # Status mapping
//!
//! | Status | Result |
//! |--------|--------|
//! | 200, 201 | [`QueryResponse`] |
//! | 400, 404, 409, 422 | [`BackendError::Rejected`] |
//! | anything else, transport errors | [`BackendError::Unavailable`] |

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::models::TimeScope;

const API_VERSION: &str = "20200601";

/// One query submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub query_string: String,
    pub compartment_id: String,
    pub compartment_id_in_subtree: bool,
    pub time_scope: TimeScope,
    pub max_rows: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub items: Vec<Value>,
    pub total_count: u64,
    pub execution_time_ms: u64,
    pub are_partial_results: bool,
}

#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, BackendError>;
}

/// Backend speaking the log-analytics REST API over HTTPS.
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        if config.namespace.trim().is_empty() {
            anyhow::bail!("backend.namespace must be set (or provide LOGAN_NAMESPACE)");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let bearer_token = config
            .auth_token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|t| !t.is_empty());

        Ok(Self {
            client,
            url: format!(
                "{}/{}/namespaces/{}/search/actions/query",
                config.base_url(),
                API_VERSION,
                config.namespace
            ),
            bearer_token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, BackendError> {
        let body = request_body(request, Utc::now());
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(%request_id, query = %request.query_string, "submitting query");

        let mut builder = self
            .client
            .post(&self.url)
            .query(&[("limit", request.max_rows)])
            .header("Content-Type", "application/json")
            .header("opc-request-id", &request_id)
            .json(&body);
        if let Some(token) = &self.bearer_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        if status == 200 || status == 201 {
            let json: Value = response.json().await?;
            return Ok(parse_response(&json));
        }

        let body_text = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body_text))
    }
}

/// Console-shaped JSON body for `request`, with relative scopes resolved
/// against `now`.
pub fn request_body(request: &QueryRequest, now: DateTime<Utc>) -> Value {
    let (start, end) = request.time_scope.resolve(now);
    json!({
        "subSystem": "LOG",
        "queryString": request.query_string,
        "shouldRunAsync": false,
        "shouldIncludeTotalCount": true,
        "compartmentId": request.compartment_id,
        "compartmentIdInSubtree": request.compartment_id_in_subtree,
        "timeFilter": {
            "timeStart": start.to_rfc3339_opts(SecondsFormat::Millis, true),
            "timeEnd": end.to_rfc3339_opts(SecondsFormat::Millis, true),
            "timeZone": "UTC",
        },
        "maxTotalCount": request.max_rows,
    })
}

/// Extract rows and counters from a successful response. Missing fields
/// default to empty/zero.
pub fn parse_response(json: &Value) -> QueryResponse {
    let items = json
        .get("items")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let total_count = json
        .get("totalCount")
        .and_then(|v| v.as_u64())
        .unwrap_or(items.len() as u64);

    QueryResponse {
        total_count,
        execution_time_ms: json
            .get("queryExecutionTimeInMs")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        are_partial_results: json
            .get("arePartialResults")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        items,
    }
}

/// Map a non-success status and its body to a [`BackendError`].
pub fn classify_failure(status: u16, body: &str) -> BackendError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    match status {
        400 | 404 | 409 | 422 => BackendError::Rejected {
            status,
            code: field("code").unwrap_or_else(|| format!("HTTP {}", status)),
            message: field("message").unwrap_or_else(|| body.to_string()),
        },
        _ => {
            let detail = field("message").unwrap_or_else(|| body.to_string());
            BackendError::Unavailable {
                message: format!("HTTP {}: {}", status, detail),
            }
        }
    }
}
