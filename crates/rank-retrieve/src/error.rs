//! Error types for rank-retrieve.

use std::fmt;

/// Errors that can occur while building, merging, weighting, sharding, or
/// querying an index.
#[derive(Debug)]
pub enum RetrieveError {
    /// A required input file (corpus, queries, relevance judgements) does not exist.
    InputNotFound(String),
    /// I/O failure while reading or writing index files.
    Io(std::io::Error),
    /// A line in a run/merged/final/shard file did not match the posting codec.
    FormatViolation(String),
}

impl fmt::Display for RetrieveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrieveError::InputNotFound(path) => write!(f, "input file not found: {path}"),
            RetrieveError::Io(e) => write!(f, "I/O error: {e}"),
            RetrieveError::FormatViolation(msg) => write!(f, "index format violation: {msg}"),
        }
    }
}

impl std::error::Error for RetrieveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetrieveError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RetrieveError {
    fn from(e: std::io::Error) -> Self {
        RetrieveError::Io(e)
    }
}

/// Result type for rank-retrieve operations.
pub type RetrieveResult<T> = Result<T, RetrieveError>;
