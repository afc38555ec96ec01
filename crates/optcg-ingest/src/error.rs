//! Error types for catalog ingestion
//!
//! The variants follow the failure scopes of a run: a [`CardParseError`] is
//! isolated to one card, a fetch failure to one page or asset, a bridge
//! failure to one batch (or one statement on the single-statement paths).
//! Failed pack discovery and failed snapshot writes are fatal to a run.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Extraction failure for a single card, scoped to the field that failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CardParseError {
    pub field: Option<&'static str>,
    pub message: String,
}

impl CardParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field: Some(field),
            message: message.into(),
        }
    }
}

/// Main error type for ingestion
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Card parse error: {0}")]
    Parse(#[from] CardParseError),

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Bridge execution failed: {0}")]
    BridgeExecution(String),

    #[error("Bridge call timed out after {0:?}")]
    BridgeTimeout(Duration),

    #[error("Statement failed: {0}")]
    StatementFailed(String),

    #[error("Snapshot write failed: {0}")]
    Snapshot(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "Existing-id lookup returned {reported} ids but the remote store reports {existing} cards"
    )]
    Reconciliation { reported: usize, existing: u64 },
}

impl IngestError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        IngestError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Local snapshot write or encoding failure
    pub fn is_snapshot_failure(&self) -> bool {
        matches!(
            self,
            IngestError::Snapshot(_) | IngestError::Serialization(_)
        )
    }

    /// Whether the failure came from the bridge process rather than the data
    pub fn is_bridge_failure(&self) -> bool {
        matches!(
            self,
            IngestError::BridgeExecution(_) | IngestError::BridgeTimeout(_)
        )
    }
}
