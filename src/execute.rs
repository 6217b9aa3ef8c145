//! Execution fallback controller and console-equivalent mode.
//!
//! ```text
//!            ┌─────────┐  ok                    ┌─────────┐
//! query ───▶ │ primary │ ─────▶ success          │         │
//!            └────┬────┘                         │         │
//!                 │ Rejected                     │ fallback│ ok ──▶ success (fallback_used)
//!                 └────────────────────────────▶ │         │
//!                 │ Unavailable                  └────┬────┘
//!                 ▼                                   │ any error
//!              failure                                ▼
//!                                                  failure
//! ```
//!
//! The fallback tier runs at most once per call and re-normalizes the
//! caller's original text, not the primary query.

use chrono::Utc;

use crate::backend::{QueryBackend, QueryRequest, QueryResponse};
use crate::config::Config;
use crate::error::{BackendError, NormalizeError};
use crate::models::{ExecutionError, ExecutionOutcome, ExecutionPath, RawQuery, TimeScope};
use crate::normalize::{normalize, rewrite_query, NormalizeOptions};
use crate::rewrite::canonicalize_null_comparisons;
use crate::stages::QuerySegments;
use crate::validate::suggest_alternative;

pub const SYNTAX_HINT: &str =
    "Check query syntax: field names, log source names, and pipeline stages";
pub const CONNECTIVITY_HINT: &str = "Check backend connectivity and credentials";

/// Per-tenancy values every execution needs.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSettings {
    pub compartment_id: String,
    pub compartment_id_in_subtree: bool,
    pub available_sources: Vec<String>,
}

impl ExecutionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            compartment_id: config.backend.compartment_id.clone(),
            compartment_id_in_subtree: config.backend.compartment_id_in_subtree,
            available_sources: config.query.available_sources.clone(),
        }
    }
}

/// Normalize and run `raw`, falling back once on a structured rejection.
pub async fn execute_query(
    backend: &dyn QueryBackend,
    settings: &ExecutionSettings,
    raw: &RawQuery,
) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::empty(raw);
    outcome.compartment_id_in_subtree = settings.compartment_id_in_subtree;

    let normalized = normalize(
        &raw.text,
        &NormalizeOptions {
            time_period_minutes: Some(raw.time_period_minutes),
            available_sources: &settings.available_sources,
        },
    );
    outcome.warnings = normalized.warnings.clone();

    let primary_query = match normalized.final_query {
        Some(q) if normalized.success => q,
        _ => {
            outcome.suggested_alternative = normalized.suggested_alternative;
            outcome.error = Some(ExecutionError {
                code: "MalformedInput".to_string(),
                message: normalized
                    .error
                    .unwrap_or_else(|| "query could not be normalized".to_string()),
                hint: Some(SYNTAX_HINT.to_string()),
            });
            return outcome;
        }
    };

    let scope = TimeScope::Relative {
        minutes: raw.time_period_minutes,
    };

    tracing::info!(path = "primary", "submitting query");
    let primary_err = match submit(backend, settings, &primary_query, scope, raw.max_rows).await {
        Ok(resp) => {
            record_success(&mut outcome, resp, ExecutionPath::Primary, primary_query);
            return outcome;
        }
        Err(err) => err,
    };

    outcome.query_used = Some(primary_query);
    if !primary_err.is_rejection() {
        tracing::error!(error = %primary_err, "backend unavailable; not falling back");
        record_failure(&mut outcome, &primary_err, CONNECTIVITY_HINT);
        return outcome;
    }
    tracing::warn!(code = primary_err.code(), "primary query rejected; trying fallback");

    let fallback = match fallback_query(&raw.text, normalized.preserved) {
        Ok(q) => q,
        Err(err) => {
            tracing::error!(error = %err, "fallback query could not be built");
            outcome.path = Some(ExecutionPath::Primary);
            record_failure(&mut outcome, &primary_err, SYNTAX_HINT);
            return outcome;
        }
    };

    outcome.fallback_used = true;
    tracing::info!(path = "fallback", "submitting query");
    match submit(backend, settings, &fallback, scope, raw.max_rows).await {
        Ok(resp) => record_success(&mut outcome, resp, ExecutionPath::Fallback, fallback),
        Err(err) => {
            tracing::error!(code = err.code(), "fallback query failed");
            outcome.path = Some(ExecutionPath::Fallback);
            outcome.query_used = Some(fallback);
            outcome.suggested_alternative = Some(suggest_alternative(&raw.text).to_string());
            let hint = if err.is_rejection() {
                SYNTAX_HINT
            } else {
                CONNECTIVITY_HINT
            };
            record_failure(&mut outcome, &err, hint);
        }
    }
    outcome
}

/// The query tried after a rejection: the original text re-normalized
/// without a time clause, minus a `sort` stage (and what follows it) when
/// the query also aggregates with `stats`. Preserved queries skip the
/// rewrite but still lose the `sort`.
pub fn fallback_query(original: &str, preserved: bool) -> Result<String, NormalizeError> {
    let base = if preserved {
        original.trim().to_string()
    } else {
        rewrite_query(original)?.query
    };
    // Preserved text may hold an open quote; send it as-is then.
    let Ok(mut segments) = QuerySegments::parse(&base) else {
        return Ok(base);
    };
    if segments.has_verb("stats") {
        if let Some(index) = segments.position("sort") {
            segments.truncate(index);
            return Ok(segments.render());
        }
    }
    Ok(base)
}

/// Run `raw` exactly as a console user would: null comparisons
/// canonicalized, everything else untouched, explicit start/end window,
/// whole compartment subtree. No fallback.
pub async fn execute_console(
    backend: &dyn QueryBackend,
    settings: &ExecutionSettings,
    raw: &RawQuery,
    bypass_all_processing: bool,
) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::empty(raw);
    outcome.console_mode = true;
    outcome.bypass_all_processing = bypass_all_processing;
    outcome.compartment_id_in_subtree = true;

    if raw.text.trim().is_empty() {
        outcome.suggested_alternative = Some(suggest_alternative(&raw.text).to_string());
        outcome.error = Some(ExecutionError {
            code: "MalformedInput".to_string(),
            message: NormalizeError::malformed("query must not be empty").to_string(),
            hint: Some(SYNTAX_HINT.to_string()),
        });
        return outcome;
    }

    let query = canonicalize_null_comparisons(&raw.text).query;
    let end = Utc::now();
    let start = end - chrono::Duration::minutes(i64::from(raw.time_period_minutes));
    let request = QueryRequest {
        query_string: query.clone(),
        compartment_id: settings.compartment_id.clone(),
        compartment_id_in_subtree: true,
        time_scope: TimeScope::Absolute { start, end },
        max_rows: raw.max_rows,
    };

    tracing::info!(path = "console", bypass_all_processing, "submitting query");
    match backend.query(&request).await {
        Ok(resp) => record_success(&mut outcome, resp, ExecutionPath::Primary, query),
        Err(err) => {
            tracing::error!(code = err.code(), "console query failed");
            outcome.query_used = Some(query);
            let hint = if err.is_rejection() {
                SYNTAX_HINT
            } else {
                CONNECTIVITY_HINT
            };
            record_failure(&mut outcome, &err, hint);
        }
    }
    outcome
}

async fn submit(
    backend: &dyn QueryBackend,
    settings: &ExecutionSettings,
    query: &str,
    time_scope: TimeScope,
    max_rows: u32,
) -> Result<QueryResponse, BackendError> {
    tracing::debug!(query, "query text");
    let request = QueryRequest {
        query_string: query.to_string(),
        compartment_id: settings.compartment_id.clone(),
        compartment_id_in_subtree: settings.compartment_id_in_subtree,
        time_scope,
        max_rows,
    };
    backend.query(&request).await
}

fn record_success(
    outcome: &mut ExecutionOutcome,
    resp: QueryResponse,
    path: ExecutionPath,
    query: String,
) {
    outcome.success = true;
    outcome.total_count = resp.total_count;
    outcome.execution_time_ms = resp.execution_time_ms;
    outcome.are_partial_results = resp.are_partial_results;
    outcome.results = resp.items;
    outcome.path = Some(path);
    outcome.query_used = Some(query);
    outcome.error = None;
}

fn record_failure(outcome: &mut ExecutionOutcome, err: &BackendError, hint: &str) {
    outcome.success = false;
    outcome.error = Some(ExecutionError {
        code: err.code().to_string(),
        message: err.message().to_string(),
        hint: Some(hint.to_string()),
    });
}
