//! Security query catalog, custom query builder, and dashboard queries.
//!
//! Catalog queries are plain text templates. Rendering prefixes each with a
//! `timefilter(<unit>)` stage whose unit follows the same thresholds as the
//! relative time clause ([`TimeFilterSpec`]).

use anyhow::{bail, Result};
use serde::Serialize;

use crate::timefilter::TimeFilterSpec;

/// A named family of related security queries.
#[derive(Debug, Clone, Copy)]
pub struct QueryFamily {
    pub name: &'static str,
    pub description: &'static str,
    pub queries: &'static [&'static str],
}

pub static SECURITY_QUERIES: &[QueryFamily] = &[
    QueryFamily {
        name: "failed_logins",
        description: "Failed login attempts",
        queries: &[
            r#"* | where contains("Log Entry", "Failed password") or contains("Log Entry", "authentication failure") or contains("Log Entry", "Invalid user")"#,
            "* | where 'Event Name' = 'AuthenticationFailure'",
            r#"* | where contains("Message", "login failed") or contains("Message", "authentication failed")"#,
            r#"* | where "Event Name" = "SigninFailure" or "Event Name" = "LoginFailure""#,
        ],
    },
    QueryFamily {
        name: "successful_logins",
        description: "Successful login events",
        queries: &[
            r#"* | where contains("Log Entry", "Accepted password") or contains("Log Entry", "authentication successful")"#,
            "* | where 'Event Name' = 'SigninSuccess' or 'Event Name' = 'LoginSuccess'",
        ],
    },
    QueryFamily {
        name: "privilege_escalation",
        description: "Privilege escalation attempts",
        queries: &[
            r#"* | where contains("Log Entry", "sudo") or contains("Log Entry", "su:")"#,
            "* | where contains('Event Name', 'Assume') or contains('Event Name', 'Escalate')",
            r#"* | where "Event Name" = "AssumeRole" or "Event Name" = "ElevatePrivileges""#,
        ],
    },
    QueryFamily {
        name: "suspicious_network",
        description: "Suspicious network activity",
        queries: &[
            r#"* | where contains("Log Entry", "connection refused") or contains("Log Entry", "blocked")"#,
            r#"* | where "Action" = "BLOCK" or "Action" = "DENY" or "Action" = "REJECT""#,
        ],
    },
    QueryFamily {
        name: "port_scanning",
        description: "Port scanning attempts",
        queries: &[
            r#"* | where contains("Log Entry", "port scan") or contains("Message", "scanning")"#,
        ],
    },
    QueryFamily {
        name: "audit_changes",
        description: "Configuration and audit changes",
        queries: &[
            "* | where contains('Event Name', 'Create') or contains('Event Name', 'Update') or contains('Event Name', 'Delete')",
            "* | where contains('Event Name', 'Terminate') or contains('Event Name', 'Launch')",
        ],
    },
    QueryFamily {
        name: "user_management",
        description: "User management events",
        queries: &[
            "* | where contains('Event Name', 'CreateUser') or contains('Event Name', 'DeleteUser') or contains('Event Name', 'UpdateUser')",
        ],
    },
    QueryFamily {
        name: "high_volume_requests",
        description: "High volume API requests",
        queries: &[
            r#"* | stats count as requests by "Source IP" | where requests > 100 | sort -requests"#,
            r#"* | stats count as requests by "User" | where requests > 50 | sort -requests"#,
        ],
    },
    QueryFamily {
        name: "cloud_guard",
        description: "Cloud Guard security findings",
        queries: &[r#"* | where "Log Source" = "OCI Cloud Guard""#],
    },
    QueryFamily {
        name: "security_events",
        description: "General security events",
        queries: &[
            r#"* | where contains("Log Entry", "security") or contains("Message", "threat")"#,
        ],
    },
];

pub fn family(name: &str) -> Option<&'static QueryFamily> {
    SECURITY_QUERIES.iter().find(|f| f.name == name)
}

pub fn family_names() -> Vec<&'static str> {
    SECURITY_QUERIES.iter().map(|f| f.name).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilySummary {
    pub name: &'static str,
    pub description: &'static str,
    pub query_count: usize,
}

pub fn list_families() -> Vec<FamilySummary> {
    SECURITY_QUERIES
        .iter()
        .map(|f| FamilySummary {
            name: f.name,
            description: f.description,
            query_count: f.queries.len(),
        })
        .collect()
}

/// `timefilter(1d)` for 1440 minutes; `None` for zero.
pub fn time_filter_prefix(minutes: u32) -> Option<String> {
    if minutes == 0 {
        return None;
    }
    Some(format!(
        "timefilter({})",
        TimeFilterSpec::from_minutes(minutes).unit_string()
    ))
}

/// A catalog family with its queries scoped to a time window.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedFamily {
    #[serde(rename = "type")]
    pub query_type: &'static str,
    pub description: &'static str,
    pub queries: Vec<String>,
    pub time_period_minutes: u32,
}

pub fn security_query(name: &str, minutes: u32) -> Result<RenderedFamily> {
    let Some(family) = family(name) else {
        bail!(
            "Unknown query type: '{}'. Available types: {}",
            name,
            family_names().join(", ")
        );
    };

    let prefix = time_filter_prefix(minutes);
    let queries = family
        .queries
        .iter()
        .map(|q| match &prefix {
            Some(p) => format!("{} | {}", p, pipeline_body(q)),
            None => q.to_string(),
        })
        .collect();

    Ok(RenderedFamily {
        query_type: family.name,
        description: family.description,
        queries,
        time_period_minutes: minutes,
    })
}

/// `* | where …` → `where …`.
fn pipeline_body(query: &str) -> &str {
    query
        .strip_prefix('*')
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('|'))
        .map(str::trim)
        .unwrap_or(query)
}

/// Backslash-escape `\`, `"` and `'` for use inside a quoted literal.
pub fn escape_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '\'') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomQuery {
    pub query: String,
    pub search_terms: Vec<String>,
    pub log_sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    pub time_period_minutes: u32,
}

/// Build a full-text query over `Log Entry` and `Message` for `terms`,
/// optionally restricted to `sources` and a severity.
pub fn build_custom_query(
    terms: &[String],
    sources: &[String],
    severity: Option<&str>,
    minutes: u32,
) -> Result<CustomQuery> {
    let terms: Vec<String> = terms
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        bail!("Search terms required");
    }

    let mut parts: Vec<String> = time_filter_prefix(minutes).into_iter().collect();

    let conditions: Vec<String> = terms
        .iter()
        .map(|term| {
            let t = escape_query_value(term);
            format!(
                r#"contains("Log Entry", "{t}") or contains("Message", "{t}")"#,
                t = t
            )
        })
        .collect();
    parts.push(format!("* | where {}", conditions.join(" or ")));

    if !sources.is_empty() {
        let source_conditions: Vec<String> = sources
            .iter()
            .map(|s| format!(r#""Log Source" = "{}""#, escape_query_value(s)))
            .collect();
        parts.push(format!("where {}", source_conditions.join(" or ")));
    }

    let severity = severity
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"));
    if let Some(level) = severity {
        parts.push(format!(
            r#"where contains("Severity", "{}")"#,
            escape_query_value(level)
        ));
    }

    Ok(CustomQuery {
        query: parts.join(" | "),
        search_terms: terms,
        log_sources: sources.to_vec(),
        severity: severity.map(str::to_string),
        time_period_minutes: minutes,
    })
}

/// Fixed summary queries for a dashboard view.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardQueries {
    pub total_events: &'static str,
    pub log_sources: &'static str,
    pub top_source_ips: &'static str,
    pub event_types: &'static str,
    pub severity_breakdown: &'static str,
    pub hourly_trends: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSet {
    pub queries: DashboardQueries,
    pub time_period_minutes: u32,
}

pub fn dashboard_queries(minutes: u32) -> DashboardSet {
    DashboardSet {
        queries: DashboardQueries {
            total_events: "* | stats count as total_events",
            log_sources: "* | stats count as events by 'Log Source' | sort -events",
            top_source_ips: "* | stats count as requests by 'Source IP' | sort -requests | head 10",
            event_types: "* | stats count as events by 'Event Name' | sort -events | head 10",
            severity_breakdown: "* | stats count as events by 'Severity' | sort -events",
            hourly_trends: "* | stats count as events by datefloor('Datetime', '1h') | sort datefloor",
        },
        time_period_minutes: minutes,
    }
}
