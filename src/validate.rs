//! Validation reporter.
//!
//! Non-fatal checks over a finalized query, flagging patterns that the
//! backend often rejects, plus a keyword-sniffed alternative query for when
//! normalization itself fails. Also home to the static set of queries known
//! to run cleanly.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

pub const WARN_UNKNOWN_SOURCE: &str = "Query may not reference available log sources";
pub const WARN_QUOTED_GROUPING: &str =
    "Stats operations with quoted field names may cause parsing issues";
pub const WARN_DATE_RELATIVE: &str = "dateRelative function may cause 'Missing input' errors";

pub const BASIC_SEARCH: &str = "* | head 10";
pub const VCN_FLOW_LOGS: &str = "'Log Source' in ('OCI VCN Flow Unified Schema Logs') | head 10";
pub const TIMESTATS_EXAMPLE: &str = "* | timestats count by 'Log Source' span=1h";

/// `stats … by` whose grouping keys include a quoted name.
static QUOTED_GROUPING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bstats\b[^|]*\bby\b[^|]*['"]"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub warnings: Vec<String>,
}

/// Check `query` for patterns associated with backend rejection.
///
/// `available_sources` lists the log sources present in the tenancy; when
/// non-empty and none is named, the query is flagged.
pub fn validate_final_query(query: &str, available_sources: &[String]) -> ValidationReport {
    let mut warnings = Vec::new();

    if !available_sources.is_empty() && !available_sources.iter().any(|s| query.contains(s.as_str()))
    {
        warnings.push(WARN_UNKNOWN_SOURCE.to_string());
    }
    if QUOTED_GROUPING.is_match(query) {
        warnings.push(WARN_QUOTED_GROUPING.to_string());
    }
    if query.contains("dateRelative") {
        warnings.push(WARN_DATE_RELATIVE.to_string());
    }

    ValidationReport {
        is_valid: warnings.is_empty(),
        warnings,
    }
}

/// A known-good query resembling what `query` was trying to do.
pub fn suggest_alternative(query: &str) -> &'static str {
    let lower = query.to_lowercase();
    if lower.contains("timestats") {
        TIMESTATS_EXAMPLE
    } else if query.contains("VCN") || query.contains("Flow") || lower.contains("network") {
        VCN_FLOW_LOGS
    } else {
        BASIC_SEARCH
    }
}

/// Queries known to execute cleanly, grouped by shape.
#[derive(Debug, Clone, Serialize)]
pub struct WorkingExamples {
    pub basic_queries: &'static [&'static str],
    pub filtered_queries: &'static [&'static str],
    pub stats_queries: &'static [&'static str],
}

pub fn working_examples() -> WorkingExamples {
    WorkingExamples {
        basic_queries: &[
            "* | head 10",
            "'Log Source' in ('OCI VCN Flow Unified Schema Logs') | head 5",
            "'Log Source' in ('OCI Audit Logs') | head 5",
        ],
        filtered_queries: &[
            "'Log Source' in ('OCI VCN Flow Unified Schema Logs') and Action in ('drop', 'reject') | head 10",
            "'Log Source' in ('OCI Audit Logs') and 'Event Type' != \"\" | head 10",
        ],
        stats_queries: &[
            "'Log Source' in ('OCI VCN Flow Unified Schema Logs') | stats count by Action | head 10",
            "'Log Source' in ('OCI VCN Flow Unified Schema Logs') | stats count by SourceIP | sort -count | head 10",
            "'Log Source' in ('OCI Audit Logs') | stats count by 'Event Type' | head 10",
            TIMESTATS_EXAMPLE,
        ],
    }
}
