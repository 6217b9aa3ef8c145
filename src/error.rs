//! Error taxonomy for the query pipeline.
//!
//! Two families of failure exist:
//!
//! - [`NormalizeError`]: the text pipeline could not make sense of its
//!   input. Recovered locally by the validation reporter, which degrades to
//!   a suggested alternative query.
//! - [`BackendError`]: the execution API refused or could not serve the
//!   request. A [`BackendError::Rejected`] earns exactly one fallback
//!   attempt; [`BackendError::Unavailable`] is surfaced immediately.
//!
//! Application-level code (config, CLI, tools) works with `anyhow` instead.

/// Normalization could not proceed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("malformed query: {reason}")]
    MalformedInput { reason: String },
}

impl NormalizeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        NormalizeError::MalformedInput {
            reason: reason.into(),
        }
    }
}

/// Failure reported by (or while reaching) the query-execution API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Structured rejection of the query itself: syntax error, unknown
    /// field, unknown source. Deterministic for a given query string.
    #[error("backend rejected query ({code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    /// Connectivity, auth, throttling, or server-side failure.
    #[error("backend unavailable: {message}")]
    Unavailable { message: String },
}

impl BackendError {
    /// Machine-readable code surfaced to callers.
    pub fn code(&self) -> &str {
        match self {
            BackendError::Rejected { code, .. } => code,
            BackendError::Unavailable { .. } => "BackendUnavailable",
        }
    }

    /// The backend's message, verbatim.
    pub fn message(&self) -> &str {
        match self {
            BackendError::Rejected { message, .. } => message,
            BackendError::Unavailable { message } => message,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, BackendError::Rejected { .. })
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        BackendError::Unavailable { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_exposes_code_and_message() {
        let err = BackendError::Rejected {
            status: 400,
            code: "InvalidParameter".to_string(),
            message: "Invalid query: unknown field Foo".to_string(),
        };
        assert!(err.is_rejection());
        assert_eq!(err.code(), "InvalidParameter");
        assert_eq!(err.message(), "Invalid query: unknown field Foo");
        assert!(err.to_string().contains("InvalidParameter"));
    }

    #[test]
    fn unavailable_is_not_a_rejection() {
        let err = BackendError::Unavailable {
            message: "connection refused".to_string(),
        };
        assert!(!err.is_rejection());
        assert_eq!(err.code(), "BackendUnavailable");
    }

    #[test]
    fn malformed_input_message() {
        let err = NormalizeError::malformed("query must not be empty");
        assert_eq!(err.to_string(), "malformed query: query must not be empty");
    }
}
