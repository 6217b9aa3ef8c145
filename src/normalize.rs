//! The non-executing half of the query pipeline.
//!
//! ```text
//! raw ──▶ preserve? ──yes──▶ unchanged
//!             │no
//!             ▼
//!       syntax rules ──▶ reference map ──▶ pipe tidy ──▶ time filter ──▶ report
//! ```
//!
//! [`normalize`] never fails: a malformed input yields a
//! [`NormalizationResult`] with `success = false` and a suggested
//! alternative query.

use crate::error::NormalizeError;
use crate::models::NormalizationResult;
use crate::preserve::{self, PRESERVED_WARNING};
use crate::references::resolve_references;
use crate::rewrite::{normalize_syntax, RewriteOutcome};
use crate::stages::{check_quotes, tidy_pipes};
use crate::timefilter::inject_time_filter;
use crate::validate::{suggest_alternative, validate_final_query};

/// Per-call normalization settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions<'a> {
    /// Inject a relative time clause covering this many minutes.
    pub time_period_minutes: Option<u32>,
    /// Log sources the tenancy actually has, for the validation report.
    pub available_sources: &'a [String],
}

/// Run syntax rules, reference resolution, and pipe tidying. No time
/// filter is injected.
pub fn rewrite_query(query: &str) -> Result<RewriteOutcome, NormalizeError> {
    if query.trim().is_empty() {
        return Err(NormalizeError::malformed("query must not be empty"));
    }
    check_quotes(query)?;

    let syntax = normalize_syntax(query);
    let refs = resolve_references(&syntax.query);
    let tidy = tidy_pipes(&refs.query)?;

    if tidy.trim().is_empty() {
        return Err(NormalizeError::malformed(
            "no filter expression left after removing unsupported stages",
        ));
    }

    let mut applied = syntax.applied;
    applied.extend(refs.applied);
    Ok(RewriteOutcome {
        query: tidy,
        applied,
    })
}

/// Normalize `query` for submission to the backend.
pub fn normalize(query: &str, opts: &NormalizeOptions) -> NormalizationResult {
    match try_normalize(query, opts) {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(error = %err, "normalization failed; suggesting an alternative");
            NormalizationResult {
                success: false,
                original_query: query.to_string(),
                final_query: None,
                was_modified: false,
                preserved: false,
                is_valid: false,
                warnings: Vec::new(),
                rules_applied: Vec::new(),
                time_filter: None,
                error: Some(err.to_string()),
                suggested_alternative: Some(suggest_alternative(query).to_string()),
            }
        }
    }
}

fn try_normalize(
    query: &str,
    opts: &NormalizeOptions,
) -> Result<NormalizationResult, NormalizeError> {
    if let Some(rule) = preserve::matching_rule(query) {
        tracing::info!(marker = rule.marker, "query preserved as-is");
        return Ok(NormalizationResult {
            success: true,
            original_query: query.to_string(),
            final_query: Some(query.to_string()),
            was_modified: false,
            preserved: true,
            is_valid: true,
            warnings: vec![PRESERVED_WARNING.to_string()],
            rules_applied: Vec::new(),
            time_filter: None,
            error: None,
            suggested_alternative: None,
        });
    }

    let rewritten = rewrite_query(query)?;

    let (final_query, time_filter) = match opts.time_period_minutes {
        Some(minutes) => {
            let injection = inject_time_filter(&rewritten.query, minutes);
            (injection.query, injection.clause)
        }
        None => (rewritten.query, None),
    };

    let report = validate_final_query(&final_query, opts.available_sources);
    let was_modified = final_query != query;
    tracing::debug!(
        was_modified,
        rules = rewritten.applied.len(),
        "query normalized"
    );

    Ok(NormalizationResult {
        success: true,
        original_query: query.to_string(),
        final_query: Some(final_query),
        was_modified,
        preserved: false,
        is_valid: report.is_valid,
        warnings: report.warnings,
        rules_applied: rewritten.applied.iter().map(|r| r.to_string()).collect(),
        time_filter,
        error: None,
        suggested_alternative: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{BASIC_SEARCH, TIMESTATS_EXAMPLE, VCN_FLOW_LOGS, WARN_DATE_RELATIVE};

    fn with_minutes(minutes: u32) -> NormalizeOptions<'static> {
        NormalizeOptions {
            time_period_minutes: Some(minutes),
            available_sources: &[],
        }
    }

    #[test]
    fn count_star_with_window_gets_where_stage() {
        let result = normalize("* | stats count(*)", &with_minutes(60));
        assert!(result.success);
        assert_eq!(
            result.final_query.as_deref(),
            Some("* | where Time > dateRelative(1h) | stats count")
        );
        assert!(result.was_modified);
        assert_eq!(result.rules_applied, vec!["count-star"]);
        assert_eq!(result.time_filter.as_deref(), Some("Time > dateRelative(1h)"));
        assert_eq!(result.warnings, vec![WARN_DATE_RELATIVE]);
    }

    #[test]
    fn preserved_query_is_returned_verbatim() {
        let q = "'Log Source' = 'OCI WAF Logs' | stats count(*) by 'Request Protection Rule IDs' | sort -count";
        let result = normalize(q, &with_minutes(60));
        assert!(result.success);
        assert!(result.preserved);
        assert!(!result.was_modified);
        assert_eq!(result.final_query.as_deref(), Some(q));
        assert_eq!(result.warnings, vec![PRESERVED_WARNING]);
    }

    #[test]
    fn inequality_rewrite_flows_through_pipeline() {
        let result = normalize("fieldX != someLiteral", &NormalizeOptions::default());
        assert_eq!(result.final_query.as_deref(), Some(r#"fieldX != """#));
        assert!(result.was_modified);
    }

    #[test]
    fn string_literals_pass_through_unchanged() {
        let q = r#"* | where contains("Log Entry", "status != ok") | head 5"#;
        let result = normalize(q, &NormalizeOptions::default());
        assert_eq!(result.final_query.as_deref(), Some(q));
        assert!(!result.was_modified);
    }

    #[test]
    fn top_rewrite_flows_through_pipeline() {
        let result = normalize("* | top 10 Count", &NormalizeOptions::default());
        assert_eq!(result.final_query.as_deref(), Some("* | sort -Count | head 10"));
    }

    #[test]
    fn references_resolve_after_syntax_rules() {
        let result = normalize(
            "'Log Source' = 'Linux Audit Logs' and 'User Name' != null | stats count by 'Event ID'",
            &NormalizeOptions::default(),
        );
        assert_eq!(
            result.final_query.as_deref(),
            Some(r#"'Log Source' = 'OCI Audit Logs' and 'Principal Name' != "" | stats count by 'Event Type'"#)
        );
    }

    #[test]
    fn already_normal_query_is_unmodified() {
        let q = "'Log Source' in ('OCI Audit Logs') | stats count by Action | head 10";
        let sources = vec!["OCI Audit Logs".to_string()];
        let result = normalize(
            q,
            &NormalizeOptions {
                time_period_minutes: None,
                available_sources: &sources,
            },
        );
        assert!(!result.was_modified);
        assert!(result.is_valid);
        assert!(result.rules_applied.is_empty());
    }

    #[test]
    fn existing_time_clause_is_kept_single() {
        let q = "* | where Time > dateRelative(2h) | stats count";
        let result = normalize(q, &with_minutes(1440));
        assert_eq!(result.final_query.as_deref(), Some(q));
        assert!(result.time_filter.is_none());
    }

    #[test]
    fn empty_query_degrades_to_suggestion() {
        let result = normalize("   ", &with_minutes(60));
        assert!(!result.success);
        assert!(result.final_query.is_none());
        assert_eq!(result.suggested_alternative.as_deref(), Some(BASIC_SEARCH));
        assert!(result.error.unwrap().contains("must not be empty"));
    }

    #[test]
    fn unbalanced_quotes_suggest_by_keyword() {
        let result = normalize("'Log Source' = 'OCI VCN Flow | stats count", &with_minutes(60));
        assert!(!result.success);
        assert_eq!(result.suggested_alternative.as_deref(), Some(VCN_FLOW_LOGS));
    }

    #[test]
    fn preservation_runs_before_malformed_checks() {
        let q = "* | timestats count by 'Log Source";
        let result = normalize(q, &with_minutes(60));
        assert!(result.success);
        assert_eq!(result.final_query.as_deref(), Some(q));
        assert_ne!(result.suggested_alternative.as_deref(), Some(TIMESTATS_EXAMPLE));
    }

    #[test]
    fn search_only_query_is_malformed() {
        let result = normalize("| search \"failed\"", &NormalizeOptions::default());
        assert!(!result.success);
    }
}
