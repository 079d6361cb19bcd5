//! Error types for schemaport.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the extraction, filtering and materialization stages.
#[derive(Debug, Error)]
pub enum Error {
    /// The assessment report contains no recognizable inventory table.
    #[error("parse error: {0}")]
    Parse(String),

    /// A single report row could not be parsed. Recovered inside the
    /// extractor (row skipped with a warning); never escapes that stage.
    #[error("malformed row: {0}")]
    MalformedRow(String),

    /// The migration configuration is missing, malformed or contradicts
    /// the extracted schema.
    #[error("configuration error: {0}")]
    Config(String),

    /// The target database service cannot be reached, or rejected the
    /// credentials.
    #[error("target connection error: {0}")]
    Connection(String),

    /// A single operation against the target exceeded the configured
    /// timeout.
    #[error("operation timed out after {0}s")]
    Timeout(u64),

    /// A create-collection call failed for a reason other than
    /// "already exists".
    #[error("materialization error: {0}")]
    Materialization(String),

    /// The target rate-limited the request. Payload is the suggested
    /// retry delay in seconds.
    #[error("rate limited, retry after {0}s")]
    RateLimit(u64),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
