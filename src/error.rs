//! Error types for orca-sync.

use thiserror::Error;

/// Main error type for the fetch and reconcile pipelines.
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Login failed: bad credentials or an unreachable login endpoint.
    /// Fatal; nothing can be fetched without a bearer token.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The server kept rejecting the credential after re-authentication.
    #[error("Request still rejected after {attempts} attempts (last status {status})")]
    AuthRetriesExhausted { attempts: u32, status: u16 },

    /// A page request came back with a non-200 status mid-pagination.
    #[error("Fetch failed with status {status}: {body}")]
    Fetch { status: u16, body: String },

    /// An alert record is missing its `alert_id` or `status` field.
    #[error("Malformed alert record: {0}")]
    MalformedRecord(String),

    /// The local snapshot file is absent or unreadable. Reconciliation
    /// refuses to run against a guessed-empty id set; the message tells the
    /// caller to produce a snapshot first.
    #[error("Local snapshot unavailable: {0}")]
    SnapshotUnavailable(String),
}

impl Error {
    /// Whether this error ends the run outright, as opposed to the
    /// stop-and-return-partial handling applied to page fetch failures.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Fetch { .. })
    }
}
