//! OPTCG Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the OPTCG catalog tools.
//!
//! # Overview
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: Centralized `tracing` subscriber setup
//! - **Types**: Packs, cards, and the label parsing for their enumerated fields
//!
//! # Example
//!
//! ```no_run
//! use optcg_common::types::Pack;
//!
//! let pack = Pack::from_raw_title("569101", "BOOSTER PACK -ROMANCE DAWN- [OP-01]");
//! assert_eq!(pack.title_parts.label.as_deref(), Some("OP-01"));
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{OptcgError, Result};
