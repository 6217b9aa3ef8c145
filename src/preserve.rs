//! Preservation classifier.
//!
//! Some queries are already correct for the backend but use syntax the
//! rewrite rules would mangle: lookup tables, custom log-source namespaces,
//! advanced analytic verbs, and sources whose dialect diverges from the
//! common case. A query containing any marker below bypasses every later
//! stage and is returned verbatim.
//!
//! Matching is case-sensitive substring containment. The list is closed:
//! bump [`RULESET_VERSION`] whenever a marker is added or removed.

use serde::Serialize;

/// Version of the marker list below.
pub const RULESET_VERSION: u32 = 1;

/// Warning attached to a preserved query.
pub const PRESERVED_WARNING: &str = "Query preserved as-is due to complexity";

/// Why a marker forces preservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    LookupTable,
    CustomNamespace,
    AnalyticVerb,
    SourceDialect,
    SourceField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PreservationRule {
    pub marker: &'static str,
    pub kind: MarkerKind,
}

const fn rule(marker: &'static str, kind: MarkerKind) -> PreservationRule {
    PreservationRule { marker, kind }
}

pub static PRESERVATION_RULES: &[PreservationRule] = &[
    rule("lookup table", MarkerKind::LookupTable),
    rule("com.oraclecloud.logging.custom", MarkerKind::CustomNamespace),
    rule("eval vol = unit", MarkerKind::AnalyticVerb),
    rule("geostats", MarkerKind::AnalyticVerb),
    rule("highlightgroups", MarkerKind::AnalyticVerb),
    rule("classify", MarkerKind::AnalyticVerb),
    rule("timestats", MarkerKind::AnalyticVerb),
    rule("link span", MarkerKind::AnalyticVerb),
    rule("compare timeshift", MarkerKind::AnalyticVerb),
    rule("'Web Application Firewall", MarkerKind::SourceDialect),
    rule("OCI WAF Logs", MarkerKind::SourceDialect),
    rule("Suricata", MarkerKind::SourceDialect),
    rule("Windows Sysmon", MarkerKind::SourceDialect),
    rule("Request Protection Rule IDs", MarkerKind::SourceField),
    rule("Host IP Address (Client)", MarkerKind::SourceField),
    rule("User Agent", MarkerKind::SourceField),
    rule("Response Code", MarkerKind::SourceField),
];

/// The first rule whose marker occurs in `query`.
pub fn matching_rule(query: &str) -> Option<&'static PreservationRule> {
    PRESERVATION_RULES.iter().find(|r| query.contains(r.marker))
}

pub fn should_preserve(query: &str) -> bool {
    matching_rule(query).is_some()
}
