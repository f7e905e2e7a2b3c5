use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a report run. Everything downstream of a decoded
/// payload degrades silently instead of returning one of these.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query command `{command}` is not installed or not on PATH")]
    ExternalToolMissing { command: String },

    #[error("query timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("query command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("malformed query response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    #[error("unresolved query placeholders: {}", .0.join(", "))]
    UnresolvedPlaceholders(Vec<String>),

    #[error("failed to read query file {path:?}: {source}")]
    QueryFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running query: {0}")]
    Io(#[from] std::io::Error),
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// Raw command output attached to the error, if any
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            QueryError::MalformedResponse { raw, .. } => Some(raw),
            QueryError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, QueryError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_budget() {
        let err = QueryError::Timeout { seconds: 300 };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "query timed out after 300 seconds");
    }

    #[test]
    fn test_unresolved_placeholders_lists_names() {
        let err = QueryError::UnresolvedPlaceholders(vec!["start_date".into(), "region".into()]);
        assert_eq!(err.to_string(), "unresolved query placeholders: start_date, region");
    }

    #[test]
    fn test_malformed_response_keeps_raw_output() {
        let err = QueryError::MalformedResponse {
            reason: "no rows returned".into(),
            raw: "[]".into(),
        };
        assert_eq!(err.raw_output(), Some("[]"));
        assert!(!err.is_timeout());
    }
}
