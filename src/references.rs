//! Reference resolver: rewrites log-source and field names known to be
//! invalid in the target tenancy.
//!
//! Plain, unguarded string substitution. Entries are applied in order, so a
//! field mapped to another mapped field resolves through the chain.

use std::sync::LazyLock;

use crate::rewrite::{apply_rules, RewriteOutcome, RewriteRule};

/// Log sources that do not exist in the tenancy → the source that does.
pub static SOURCE_MAP: &[(&str, &str)] = &[
    ("'Linux Audit Logs'", "'OCI Audit Logs'"),
    ("'Network Security Events'", "'OCI VCN Flow Unified Schema Logs'"),
];

/// Field names that do not exist in the tenancy → the field that does.
pub static FIELD_MAP: &[(&str, &str)] = &[
    ("'Event ID'", "'Event Type'"),
    ("'Host IP Address (Client)'", "'Source IP'"),
    ("'Request Protection Rule IDs'", "'Event Type'"),
    ("'User Name'", "'Principal Name'"),
    ("'Computer Name'", "'Compartment Name'"),
    ("'Source IP'", "SourceIP"),
    ("'Source Port'", "SourcePort"),
    ("'Destination IP'", "DestinationIP"),
    ("'Destination Port'", "DestinationPort"),
];

static REFERENCE_RULES: LazyLock<Vec<RewriteRule>> = LazyLock::new(|| {
    SOURCE_MAP
        .iter()
        .map(|&(from, to)| RewriteRule::literal("log-source", from, to))
        .chain(
            FIELD_MAP
                .iter()
                .map(|&(from, to)| RewriteRule::literal("field-name", from, to)),
        )
        .collect()
});

pub fn resolve_references(query: &str) -> RewriteOutcome {
    apply_rules(&REFERENCE_RULES, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sources_map_to_available_ones() {
        let out = resolve_references("'Log Source' = 'Linux Audit Logs' | head 10");
        assert_eq!(out.query, "'Log Source' = 'OCI Audit Logs' | head 10");
        assert_eq!(out.applied, vec!["log-source"]);

        assert_eq!(
            resolve_references("'Log Source' in ('Network Security Events')").query,
            "'Log Source' in ('OCI VCN Flow Unified Schema Logs')"
        );
    }

    #[test]
    fn field_names_are_rewritten() {
        assert_eq!(
            resolve_references("* | stats count by 'Event ID'").query,
            "* | stats count by 'Event Type'"
        );
        assert_eq!(
            resolve_references("* | stats count by 'Source IP', 'Destination Port'").query,
            "* | stats count by SourceIP, DestinationPort"
        );
    }

    #[test]
    fn mappings_chain_in_order() {
        assert_eq!(
            resolve_references("* | stats count by 'Host IP Address (Client)'").query,
            "* | stats count by SourceIP"
        );
    }

    #[test]
    fn resolved_query_is_stable() {
        let once = resolve_references("'Log Source' = 'Linux Audit Logs' and 'User Name' != \"\"").query;
        let twice = resolve_references(&once);
        assert_eq!(twice.query, once);
        assert!(!twice.changed());
    }

    #[test]
    fn no_target_is_also_a_source() {
        // A target that is itself a key later in the list would make the
        // resolver non-idempotent.
        for (i, (_, to)) in FIELD_MAP.iter().enumerate() {
            assert!(
                !FIELD_MAP[..=i].iter().any(|(from, _)| from == to),
                "{} maps back onto an earlier key",
                to
            );
        }
    }
}
