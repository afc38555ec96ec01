//! Error types shared across the OPTCG workspace

use thiserror::Error;

/// Result type alias for OPTCG domain operations
pub type Result<T> = std::result::Result<T, OptcgError>;

/// Main error type for shared domain code
#[derive(Error, Debug)]
pub enum OptcgError {
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

impl OptcgError {
    /// Shorthand for an unrecognised enum label coming from the source
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        OptcgError::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}
