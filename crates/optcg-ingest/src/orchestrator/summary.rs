// End-of-run summary

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::state::{DuplicateRecord, RunError, RunState};

/// Outcome of a run, logged at the end and available to callers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub packs_only: bool,
    pub packs_discovered: usize,
    pub packs_selected: usize,
    pub packs_uploaded: usize,
    pub packs_processed: usize,
    pub total_cards: usize,
    pub unique_cards: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed_uploads: usize,
    pub images_mirrored: usize,
    pub duplicates: Vec<DuplicateRecord>,
    pub errors: Vec<RunError>,
    pub remote_card_count: Option<u64>,
    pub remote_pack_count: Option<u64>,
    pub reconciliation_warning: bool,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl RunSummary {
    pub(crate) fn from_state(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        packs_discovered: usize,
        packs_selected: usize,
        state: RunState,
    ) -> Self {
        let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
        let unique_cards = state.unique_cards();
        let duplicates = state.duplicates().to_vec();

        Self {
            run_id,
            started_at,
            packs_only: false,
            packs_discovered,
            packs_selected,
            packs_uploaded: state.packs_uploaded,
            packs_processed: state.packs_processed,
            total_cards: state.total_cards,
            unique_cards,
            uploaded: state.uploaded,
            skipped: state.skipped,
            failed_uploads: state.failed_uploads,
            images_mirrored: state.images_mirrored,
            duplicates,
            errors: state.errors,
            remote_card_count: None,
            remote_pack_count: None,
            reconciliation_warning: state.reconciliation_warning,
            cancelled: state.cancelled,
            duration_ms,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Emit the summary through `tracing`
    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            packs = self.packs_selected,
            packs_processed = self.packs_processed,
            total_cards = self.total_cards,
            unique_cards = self.unique_cards,
            uploaded = self.uploaded,
            skipped = self.skipped,
            failed_uploads = self.failed_uploads,
            images = self.images_mirrored,
            duplicates = self.duplicates.len(),
            errors = self.errors.len(),
            duration_ms = self.duration_ms,
            "Run summary"
        );

        if let Some(count) = self.remote_card_count {
            info!(cards = count, packs = ?self.remote_pack_count, "Remote totals");
        }

        for duplicate in &self.duplicates {
            info!(
                card_id = %duplicate.card_id,
                packs = %duplicate.pack_ids.join(", "),
                "Card appears in several packs"
            );
        }

        for error in &self.errors {
            warn!(scope = %error.scope, "{}", error.message);
        }

        if self.reconciliation_warning {
            warn!("Existing-id lookup disagreed with the card count; nothing was skipped");
        }

        if self.cancelled {
            warn!("Run was cancelled before every pack was processed");
        }
    }
}
