//! Pipe-stage model of a query.
//!
//! A query is a leading filter expression followed by zero or more
//! pipeline stages (`stats`, `sort`, `head`, `where`, …), separated by `|`.
//! Pipes inside single- or double-quoted literals are not separators.
//! Stage content is otherwise opaque text.

use std::ops::Range;

use crate::error::NormalizeError;

/// A query split at its unquoted pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySegments {
    /// Leading filter expression (may be empty for a query that starts with `|`).
    pub filter: String,
    /// Pipeline stages after the filter, trimmed, without their pipes.
    pub stages: Vec<String>,
}

impl QuerySegments {
    pub fn parse(query: &str) -> Result<Self, NormalizeError> {
        let mut parts = split_unquoted(query)?.into_iter();
        let filter = parts.next().unwrap_or_default();
        Ok(Self {
            filter,
            stages: parts.collect(),
        })
    }

    /// Index of the first stage whose verb is `verb` (case-insensitive).
    pub fn position(&self, verb: &str) -> Option<usize> {
        self.stages
            .iter()
            .position(|s| stage_verb(s).eq_ignore_ascii_case(verb))
    }

    pub fn has_verb(&self, verb: &str) -> bool {
        self.position(verb).is_some()
    }

    /// Drop stage `index` and everything after it.
    pub fn truncate(&mut self, index: usize) {
        self.stages.truncate(index);
    }

    pub fn render(&self) -> String {
        let mut out = self.filter.clone();
        for stage in &self.stages {
            if out.is_empty() {
                out.push_str("| ");
            } else {
                out.push_str(" | ");
            }
            out.push_str(stage);
        }
        out
    }
}

/// First word of a stage, e.g. `"stats"` for `"stats count by Action"`.
pub fn stage_verb(stage: &str) -> &str {
    stage.split_whitespace().next().unwrap_or("")
}

/// Role of a character relative to quoted literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lexeme {
    /// Outside any literal.
    Plain,
    /// The quote opening a literal.
    Open,
    /// Inside a literal, escapes included.
    Quoted,
    /// The quote closing a literal.
    Close,
}

/// Walks a query yielding `(byte offset, char, Lexeme)`. Single and double
/// quotes both open literals; a backslash inside a literal escapes the next
/// character.
pub struct QuoteScanner<'a> {
    chars: std::str::CharIndices<'a>,
    quote: Option<char>,
    escaped: bool,
}

impl<'a> QuoteScanner<'a> {
    pub fn new(query: &'a str) -> Self {
        Self {
            chars: query.char_indices(),
            quote: None,
            escaped: false,
        }
    }

    /// The quote character of a literal still open at this point.
    pub fn open_quote(&self) -> Option<char> {
        self.quote
    }
}

impl Iterator for QuoteScanner<'_> {
    type Item = (usize, char, Lexeme);

    fn next(&mut self) -> Option<Self::Item> {
        let (i, c) = self.chars.next()?;
        let lexeme = match self.quote {
            Some(_) if self.escaped => {
                self.escaped = false;
                Lexeme::Quoted
            }
            Some(_) if c == '\\' => {
                self.escaped = true;
                Lexeme::Quoted
            }
            Some(q) if c == q => {
                self.quote = None;
                Lexeme::Close
            }
            Some(_) => Lexeme::Quoted,
            None if c == '\'' || c == '"' => {
                self.quote = Some(c);
                Lexeme::Open
            }
            None => Lexeme::Plain,
        };
        Some((i, c, lexeme))
    }
}

/// Byte offset of the first `|` outside any quoted literal.
pub fn find_unquoted_pipe(query: &str) -> Option<usize> {
    QuoteScanner::new(query)
        .find(|&(_, c, lexeme)| lexeme == Lexeme::Plain && c == '|')
        .map(|(i, _, _)| i)
}

/// Byte ranges of the contents of every quoted literal, quotes excluded.
/// A literal left open runs to the end of the query.
pub fn literal_spans(query: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c, lexeme) in QuoteScanner::new(query) {
        match lexeme {
            Lexeme::Open => start = Some(i + c.len_utf8()),
            Lexeme::Close => {
                if let Some(s) = start.take() {
                    spans.push(s..i);
                }
            }
            Lexeme::Plain | Lexeme::Quoted => {}
        }
    }
    if let Some(s) = start {
        spans.push(s..query.len());
    }
    spans
}

/// Fail when a quoted literal is left open, since stage boundaries can no
/// longer be located reliably.
pub fn check_quotes(query: &str) -> Result<(), NormalizeError> {
    split_unquoted(query).map(|_| ())
}

/// Split on unquoted pipes; each part is trimmed.
fn split_unquoted(query: &str) -> Result<Vec<String>, NormalizeError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut scanner = QuoteScanner::new(query);

    for (_, c, lexeme) in scanner.by_ref() {
        if lexeme == Lexeme::Plain && c == '|' {
            parts.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }

    if let Some(q) = scanner.open_quote() {
        return Err(NormalizeError::malformed(format!(
            "unterminated {} quoted literal",
            if q == '\'' { "single" } else { "double" }
        )));
    }

    parts.push(current.trim().to_string());
    Ok(parts)
}

/// Remove empty pipeline stages (`a | | b`, trailing `|`) left behind by
/// stage-removing rewrites. A query without empty stages is returned
/// byte-for-byte unchanged.
pub fn tidy_pipes(query: &str) -> Result<String, NormalizeError> {
    let segments = QuerySegments::parse(query)?;
    if segments.stages.iter().all(|s| !s.is_empty()) {
        return Ok(query.to_string());
    }
    let tidy = QuerySegments {
        filter: segments.filter,
        stages: segments
            .stages
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect(),
    };
    Ok(tidy.render())
}
