//! Rewrite-rule interpreter and the syntax normalizer rule table.
//!
//! Every text-level correction is a [`RewriteRule`]: a name, a [`Guard`]
//! deciding whether it runs, and an [`Action`] describing the edit. A
//! single interpreter ([`apply_rules`]) evaluates an ordered rule list, so
//! the order is explicit and each rule can be tested on its own.
//!
//! # Syntax normalizer order
//!
//! | # | Rules | Effect |
//! |---|-------|--------|
//! | 1 | `null-comparison/*` | `!= null`, `is not null`, `field != literal` → `!= ""` |
//! | 2 | `value-list-quoting` | `in (drop, reject)` → `in ('drop', 'reject')` |
//! | 3 | `top-n`, `top` | `top N f` → `sort -f \| head N` |
//! | 4 | `count-star`, `count-field/*` | `count(*)` → `count`; guarded `count(f)` → `count` |
//! | 5 | `rename-stage` | excise `rename` stages |
//! | 6 | `search-stage` | drop a `search` stage and all that follows |
//! | 7 | `lookup-stage` | drop a `lookup` stage and all that follows, unless load-bearing |
//!
//! Later rules assume earlier ones already ran. Each rule is idempotent on
//! its own output.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::stages::{literal_spans, stage_verb, QuerySegments};

/// Condition evaluated against the current query text before a rule runs.
#[derive(Debug, Clone, Copy)]
pub enum Guard {
    Always,
    /// Run only when any marker occurs (case-sensitive).
    IfContains(&'static [&'static str]),
    /// Run only when no marker occurs (case-sensitive).
    UnlessContains(&'static [&'static str]),
}

impl Guard {
    pub fn holds(&self, query: &str) -> bool {
        match self {
            Guard::Always => true,
            Guard::IfContains(markers) => markers.iter().any(|m| query.contains(m)),
            Guard::UnlessContains(markers) => !markers.iter().any(|m| query.contains(m)),
        }
    }
}

/// Replacement text for a regex rule.
pub enum Replacement {
    /// `regex` replacement template (`$1`, `${name}`).
    Template(&'static str),
    /// Computed from the captures.
    Computed(fn(&Captures) -> String),
}

pub enum Action {
    Literal {
        from: &'static str,
        to: &'static str,
    },
    Pattern {
        regex: Regex,
        replacement: Replacement,
    },
    /// Excise every stage with this verb; following stages stay attached.
    RemoveStage { verb: &'static str },
    /// Drop the first stage with this verb and everything after it.
    TruncateFrom { verb: &'static str },
}

/// Which parts of the query a text rule may edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Anywhere, quoted literals included.
    Anywhere,
    /// Only outside quoted literals. Literal contents are hidden from the
    /// rule and restored verbatim afterwards.
    OutsideLiterals,
}

pub struct RewriteRule {
    pub name: &'static str,
    pub guard: Guard,
    pub scope: Scope,
    pub action: Action,
}

impl RewriteRule {
    pub fn literal(name: &'static str, from: &'static str, to: &'static str) -> Self {
        Self {
            name,
            guard: Guard::Always,
            scope: Scope::Anywhere,
            action: Action::Literal { from, to },
        }
    }

    /// Regex rule. `pattern` is a compile-time constant; an invalid one is
    /// a programming error caught by the rule-table tests.
    pub fn pattern(name: &'static str, pattern: &str, replacement: Replacement) -> Self {
        let regex = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("invalid pattern for rule {}: {}", name, e));
        Self {
            name,
            guard: Guard::Always,
            scope: Scope::Anywhere,
            action: Action::Pattern { regex, replacement },
        }
    }

    pub fn remove_stage(name: &'static str, verb: &'static str) -> Self {
        Self {
            name,
            guard: Guard::Always,
            scope: Scope::Anywhere,
            action: Action::RemoveStage { verb },
        }
    }

    pub fn truncate_from(name: &'static str, verb: &'static str) -> Self {
        Self {
            name,
            guard: Guard::Always,
            scope: Scope::Anywhere,
            action: Action::TruncateFrom { verb },
        }
    }

    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    /// Leave the contents of quoted literals alone.
    pub fn outside_literals(mut self) -> Self {
        self.scope = Scope::OutsideLiterals;
        self
    }

    /// Apply to `query`, ignoring the guard.
    pub fn rewrite(&self, query: &str) -> String {
        let text_rule = matches!(self.action, Action::Literal { .. } | Action::Pattern { .. });
        if self.scope == Scope::OutsideLiterals && text_rule {
            let masked = MaskedLiterals::new(query);
            return masked.restore(&self.rewrite_text(&masked.text));
        }
        self.rewrite_text(query)
    }

    fn rewrite_text(&self, query: &str) -> String {
        match &self.action {
            Action::Literal { from, to } => query.replace(from, to),
            Action::Pattern { regex, replacement } => match replacement {
                Replacement::Template(t) => regex.replace_all(query, *t).into_owned(),
                Replacement::Computed(f) => regex
                    .replace_all(query, |caps: &Captures| f(caps))
                    .into_owned(),
            },
            Action::RemoveStage { verb } => remove_stages(query, verb),
            Action::TruncateFrom { verb } => truncate_from(query, verb),
        }
    }

    /// Apply to `query` when the guard holds.
    pub fn apply(&self, query: &str) -> String {
        if self.guard.holds(query) {
            self.rewrite(query)
        } else {
            query.to_string()
        }
    }
}

const MASK_OPEN: char = '\u{E000}';
const MASK_CLOSE: char = '\u{E001}';

static MASK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{E000}(\\d+)\u{E001}").unwrap());

/// A query whose literal contents are replaced by numbered placeholders.
/// Quote characters stay in place, so rules still see `'…'` and `"…"`.
struct MaskedLiterals<'a> {
    text: String,
    literals: Vec<&'a str>,
}

impl<'a> MaskedLiterals<'a> {
    fn new(query: &'a str) -> Self {
        let mut text = String::with_capacity(query.len());
        let mut literals = Vec::new();
        let mut last = 0;
        for span in literal_spans(query) {
            text.push_str(&query[last..span.start]);
            text.push(MASK_OPEN);
            text.push_str(&literals.len().to_string());
            text.push(MASK_CLOSE);
            literals.push(&query[span.clone()]);
            last = span.end;
        }
        text.push_str(&query[last..]);
        Self { text, literals }
    }

    fn restore(&self, rewritten: &str) -> String {
        if self.literals.is_empty() {
            return rewritten.to_string();
        }
        MASK_TOKEN
            .replace_all(rewritten, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.literals.get(i))
                    .map_or_else(|| caps[0].to_string(), |lit| lit.to_string())
            })
            .into_owned()
    }
}

fn remove_stages(query: &str, verb: &str) -> String {
    let Ok(mut segments) = QuerySegments::parse(query) else {
        return query.to_string();
    };
    let before = segments.stages.len();
    segments
        .stages
        .retain(|s| !stage_verb(s).eq_ignore_ascii_case(verb));
    if segments.stages.len() == before {
        return query.to_string();
    }
    segments.render()
}

fn truncate_from(query: &str, verb: &str) -> String {
    let Ok(mut segments) = QuerySegments::parse(query) else {
        return query.to_string();
    };
    match segments.position(verb) {
        Some(index) => {
            segments.truncate(index);
            segments.render()
        }
        None => query.to_string(),
    }
}

/// Result of running a rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub query: String,
    /// Names of rules that changed the text, in application order.
    pub applied: Vec<&'static str>,
}

impl RewriteOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Run `rules` in order over `query`.
pub fn apply_rules(rules: &[RewriteRule], query: &str) -> RewriteOutcome {
    let mut current = query.to_string();
    let mut applied = Vec::new();
    for rule in rules {
        let next = rule.apply(&current);
        if next != current {
            tracing::debug!(rule = rule.name, "rewrite rule applied");
            applied.push(rule.name);
            current = next;
        }
    }
    RewriteOutcome {
        query: current,
        applied,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Rule table
// ═══════════════════════════════════════════════════════════════════════

/// Source families for which `count(field)` is flattened to `count`.
const COUNT_FIELD_SOURCES: &[&str] = &["WAF", "Suricata"];
const COUNT_FIELD_FAMILY: &[&str] = &["VCN Flow"];

/// A lookup is kept when the query targets one of these.
const LOAD_BEARING_LOOKUP: &[&str] = &["WAF", "Suricata", "MITRE"];

fn null_comparison_rules() -> Vec<RewriteRule> {
    vec![
        RewriteRule::pattern(
            "null-comparison/not-equal-null",
            r"!=\s*null\b",
            Replacement::Template(r#"!= """#),
        )
        .outside_literals(),
        RewriteRule::pattern(
            "null-comparison/is-not-null",
            r"(?i)\bis\s+not\s+null\b",
            Replacement::Template(r#"!= """#),
        )
        .outside_literals(),
        // Lossy: any `field != literal` becomes a non-empty check, because
        // the backend's inequality against arbitrary literals is unreliable.
        RewriteRule::pattern(
            "null-comparison/not-equal-literal",
            r#"(\w+)\s*!=\s*[^\s|()'"]+"#,
            Replacement::Template(r#"${1} != """#),
        )
        .outside_literals(),
    ]
}

fn quote_value_list(caps: &Captures) -> String {
    let items: Vec<&str> = caps[2].split(',').map(str::trim).collect();
    if !items.iter().any(|item| is_bare_identifier(item)) {
        return caps[0].to_string();
    }
    let quoted: Vec<String> = items
        .iter()
        .map(|item| {
            if is_bare_identifier(item) {
                format!("'{}'", item)
            } else {
                item.to_string()
            }
        })
        .collect();
    format!("{} ({})", &caps[1], quoted.join(", "))
}

fn is_bare_identifier(item: &str) -> bool {
    let mut chars = item.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    }
}

fn syntax_rules() -> Vec<RewriteRule> {
    let mut rules = null_comparison_rules();
    rules.extend([
        RewriteRule::pattern(
            "value-list-quoting",
            r"(?i)\b(in)\s*\(([^()]*)\)",
            Replacement::Computed(quote_value_list),
        )
        .outside_literals(),
        RewriteRule::pattern(
            "top-n",
            r#"\|\s*(?i:top)\s+(\d+)\s+('[^']*'|"[^"]*"|\w+)"#,
            Replacement::Template("| sort -${2} | head ${1}"),
        )
        .outside_literals(),
        RewriteRule::pattern(
            "top",
            r#"\|\s*(?i:top)\s+('[^']*'|"[^"]*"|[A-Za-z_]\w*)"#,
            Replacement::Template("| sort -${1} | head 10"),
        )
        .outside_literals(),
        RewriteRule::pattern(
            "count-star",
            r"count\(\s*\*\s*\)",
            Replacement::Template("count"),
        )
        .outside_literals(),
        RewriteRule::pattern(
            "count-field/source-markers",
            r#"stats count\(['"]?[^')"]+['"]?\)"#,
            Replacement::Template("stats count"),
        )
        .when(Guard::IfContains(COUNT_FIELD_SOURCES)),
        RewriteRule::pattern(
            "count-field/vcn-flow",
            r#"stats count\(['"]?[^')"]+['"]?\)"#,
            Replacement::Template("stats count"),
        )
        .when(Guard::IfContains(COUNT_FIELD_FAMILY)),
        RewriteRule::remove_stage("rename-stage", "rename"),
        RewriteRule::truncate_from("search-stage", "search"),
        RewriteRule::truncate_from("lookup-stage", "lookup")
            .when(Guard::UnlessContains(LOAD_BEARING_LOOKUP)),
    ]);
    rules
}

/// Step 1 alone; also the only rewrite console-equivalent mode applies.
pub static NULL_COMPARISON_RULES: LazyLock<Vec<RewriteRule>> =
    LazyLock::new(null_comparison_rules);

/// The full ordered syntax normalizer.
pub static SYNTAX_RULES: LazyLock<Vec<RewriteRule>> = LazyLock::new(syntax_rules);

pub fn normalize_syntax(query: &str) -> RewriteOutcome {
    apply_rules(&SYNTAX_RULES, query)
}

pub fn canonicalize_null_comparisons(query: &str) -> RewriteOutcome {
    apply_rules(&NULL_COMPARISON_RULES, query)
}
