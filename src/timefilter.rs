//! Relative time filter computation and injection.
//!
//! A minute count becomes a [`TimeFilterSpec`] whose clause
//! (`Time > dateRelative(2h)`) is spliced into the query. Where the clause
//! goes depends on the query's shape, because the backend treats the
//! leading filter expression and pipeline stages asymmetrically: a boolean
//! clause must never land where a pipeline verb is expected.
//!
//! Injection is skipped when the query already filters on time, or when it
//! uses constructs that the clause is known to break.

use serde::Serialize;

use crate::stages::find_unquoted_pipe;

/// Field the relative clause compares against.
pub const TIME_FIELD: &str = "Time";

/// Grouping appended when the whole query is a bare `*`.
pub const BARE_WILDCARD_TAIL: &str = "stats count as logrecords by 'Log Source' | sort -logrecords";

const MINUTES_PER_HOUR: u32 = 60;
const MINUTES_PER_DAY: u32 = 1_440;
const MINUTES_PER_MONTH: u32 = 43_200;

/// Vocabulary that means the query already has a time filter when paired
/// with a `where` clause.
const TIME_KEYWORDS: &[&str] = &["datetime", "time ", "timestamp"];

/// Time functions that mark a time filter wherever they appear.
const TIME_FUNCTIONS: &[&str] = &["daterelative", "timefilter"];

/// Queries containing these never receive an injected clause.
///
/// Every entry also trips a preservation marker, so inside `normalize` the
/// preservation check wins first; this list only decides for direct callers
/// of [`inject_time_filter`].
pub const SKIP_PATTERNS: &[&str] = &[
    "lookup table",
    "com.oraclecloud.logging.custom",
    "eval vol = unit",
    "geostats",
    "highlightgroups",
    "classify",
    "timestats",
    "link span",
    "compare timeshift",
    "fields SuricataSignature",
    "Request Protection Rule IDs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Months,
}

impl TimeUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
            TimeUnit::Months => "mon",
        }
    }
}

/// Unit-normalized form of a minute count. Recomputed per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeFilterSpec {
    pub minutes: u32,
    pub magnitude: u32,
    pub unit: TimeUnit,
    pub clause: String,
}

impl TimeFilterSpec {
    pub fn from_minutes(minutes: u32) -> Self {
        let (magnitude, unit) = if minutes < MINUTES_PER_HOUR {
            (minutes, TimeUnit::Minutes)
        } else if minutes < MINUTES_PER_DAY {
            (minutes / MINUTES_PER_HOUR, TimeUnit::Hours)
        } else if minutes < MINUTES_PER_MONTH {
            (minutes / MINUTES_PER_DAY, TimeUnit::Days)
        } else {
            (minutes / MINUTES_PER_MONTH, TimeUnit::Months)
        };
        let clause = format!(
            "{} > dateRelative({}{})",
            TIME_FIELD,
            magnitude,
            unit.suffix()
        );
        Self {
            minutes,
            magnitude,
            unit,
            clause,
        }
    }

    /// E.g. `"1d"` for 1500 minutes.
    pub fn unit_string(&self) -> String {
        format!("{}{}", self.magnitude, self.unit.suffix())
    }
}

/// Why no clause was injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoWindow,
    AlreadyFiltered,
    ComplexQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub query: String,
    /// The clause that was spliced in.
    pub clause: Option<String>,
    pub skipped: Option<SkipReason>,
}

impl Injection {
    fn skipped(query: &str, reason: SkipReason) -> Self {
        Self {
            query: query.to_string(),
            clause: None,
            skipped: Some(reason),
        }
    }
}

pub fn has_time_filter(query: &str) -> bool {
    let lower = query.to_lowercase();
    if TIME_FUNCTIONS.iter().any(|f| lower.contains(f)) {
        return true;
    }
    lower.contains("where") && TIME_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub fn should_skip(query: &str) -> bool {
    SKIP_PATTERNS.iter().any(|p| query.contains(p))
}

fn has_boolean_conditions(expr: &str) -> bool {
    let lower = expr.to_lowercase();
    lower.contains(" and ") || lower.contains(" or ")
}

/// Splice a relative time clause for `minutes` into `query`.
pub fn inject_time_filter(query: &str, minutes: u32) -> Injection {
    if minutes == 0 {
        return Injection::skipped(query, SkipReason::NoWindow);
    }
    if has_time_filter(query) {
        tracing::debug!("query already filters on time; not injecting");
        return Injection::skipped(query, SkipReason::AlreadyFiltered);
    }
    if should_skip(query) {
        tracing::debug!("complex query; not injecting a time filter");
        return Injection::skipped(query, SkipReason::ComplexQuery);
    }

    let spec = TimeFilterSpec::from_minutes(minutes);
    let clause = spec.clause.as_str();
    let q = query.trim();

    let spliced = if q == "*" {
        format!("* | where {} | {}", clause, BARE_WILDCARD_TAIL)
    } else if let Some(rest) = wildcard_pipeline(q) {
        // `* | stats …` and friends: a new `where` stage right after `*`.
        format!("* | where {} | {}", clause, rest)
    } else if let Some(pos) = find_unquoted_pipe(q) {
        let before = q[..pos].trim();
        let after = q[pos..].trim();
        if before.is_empty() {
            format!("{} {}", clause, after)
        } else {
            format!("{} and {} {}", before, clause, after)
        }
    } else if has_boolean_conditions(q) {
        format!("{} and {}", q, clause)
    } else if let Some(rest) = q.strip_prefix('*') {
        format!("* | where {} | {}", clause, rest.trim())
    } else {
        format!("{} and {}", q, clause)
    };

    Injection {
        query: spliced,
        clause: Some(spec.clause),
        skipped: None,
    }
}

/// For `* | <stages>`, the text after the first pipe.
fn wildcard_pipeline(query: &str) -> Option<&str> {
    let rest = query.strip_prefix('*')?.trim_start();
    rest.strip_prefix('|').map(str::trim)
}
