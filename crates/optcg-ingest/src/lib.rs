//! OPTCG Ingest Library
//!
//! Ingests the One Piece card game catalog from the official card list and
//! replicates it into a local JSON snapshot and a remote D1 database.
//!
//! # Components
//!
//! - **source**: pack discovery and card extraction from the card list site
//! - **snapshot**: `json/` and `images/` files under an output directory
//! - **store**: chunked, retried upserts with per-card accounting
//! - **bridge**: literal SQL executed through `wrangler d1 execute`
//! - **orchestrator**: the sequential run tying them together
//!
//! # Example
//!
//! ```no_run
//! use optcg_ingest::bridge::WranglerBridge;
//! use optcg_ingest::config::IngestConfig;
//! use optcg_ingest::orchestrator::Orchestrator;
//! use optcg_ingest::source::OfficialSite;
//! use optcg_ingest::store::BulkStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = IngestConfig::default();
//!     config.run.upload = true;
//!
//!     let source = OfficialSite::new(config.source.clone())?;
//!     let store = BulkStore::new(WranglerBridge::new(&config.bridge));
//!     let summary = Orchestrator::new(source, config.run.clone())
//!         .with_store(store)
//!         .run()
//!         .await?;
//!
//!     tracing::info!(cards = summary.total_cards, "Done");
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod snapshot;
pub mod source;
pub mod store;

pub use error::{CardParseError, IngestError, Result};
