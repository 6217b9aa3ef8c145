//! Core data models used throughout Logan Harness.
//!
//! These types flow through the normalization pipeline and the execution
//! controller, and are serialized verbatim as tool results.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Label attached to every execution outcome so callers can tell live
/// backend data apart from anything synthesized locally.
pub const DATA_SOURCE: &str = "Oracle Cloud Infrastructure Logging Analytics";

/// A query as submitted by a caller, together with its intended time
/// window and result cap. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQuery {
    pub text: String,
    pub time_period_minutes: u32,
    pub max_rows: u32,
}

impl RawQuery {
    pub fn new(text: impl Into<String>, time_period_minutes: u32, max_rows: u32) -> Self {
        Self {
            text: text.into(),
            time_period_minutes,
            max_rows,
        }
    }
}

/// The time window sent alongside a query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeScope {
    /// The last `minutes` minutes, resolved against the clock at send time.
    Relative { minutes: u32 },
    /// An explicit start/end pair, as the web console sends.
    Absolute {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TimeScope {
    /// Resolve to a concrete `(start, end)` window relative to `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match *self {
            TimeScope::Relative { minutes } => {
                (now - chrono::Duration::minutes(i64::from(minutes)), now)
            }
            TimeScope::Absolute { start, end } => (start, end),
        }
    }
}

/// Output of the non-executing half of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationResult {
    pub success: bool,
    pub original_query: String,
    /// The query to submit. Absent only when normalization failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_query: Option<String>,
    pub was_modified: bool,
    pub preserved: bool,
    pub is_valid: bool,
    pub warnings: Vec<String>,
    /// Names of the rewrite rules that changed the query, in order.
    pub rules_applied: Vec<String>,
    /// The relative time clause that was spliced in, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_alternative: Option<String>,
}

/// Which execution tier produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPath {
    Primary,
    Fallback,
}

/// Structured failure detail carried on an unsuccessful outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Result of running a query against the backend, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub results: Vec<serde_json::Value>,
    pub total_count: u64,
    pub execution_time_ms: u64,
    pub are_partial_results: bool,
    /// The tier that produced this outcome; absent when nothing was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<ExecutionPath>,
    pub fallback_used: bool,
    /// The exact query string last sent to the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_used: Option<String>,
    pub original_query: String,
    pub time_period_minutes: u32,
    pub console_mode: bool,
    /// Console mode only: caller asked for no processing at all.
    pub bypass_all_processing: bool,
    pub compartment_id_in_subtree: bool,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_alternative: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    pub data_source: &'static str,
}

impl ExecutionOutcome {
    /// An outcome with nothing filled in but the request metadata.
    pub fn empty(raw: &RawQuery) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            total_count: 0,
            execution_time_ms: 0,
            are_partial_results: false,
            path: None,
            fallback_used: false,
            query_used: None,
            original_query: raw.text.clone(),
            time_period_minutes: raw.time_period_minutes,
            console_mode: false,
            bypass_all_processing: false,
            compartment_id_in_subtree: false,
            warnings: Vec::new(),
            suggested_alternative: None,
            error: None,
            data_source: DATA_SOURCE,
        }
    }
}
