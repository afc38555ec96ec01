// Run-scoped state of one ingestion run

use std::collections::HashMap;
use std::fmt;

use optcg_common::types::Card;
use serde::Serialize;
use tracing::debug;

/// Stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPhase {
    Discovering,
    FilteringPacks,
    UploadingPackMetadata,
    LoadingExistingIds,
    IteratingPacks,
    WritingCombinedSnapshot,
    Reconciling,
    Done,
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestPhase::Discovering => "discovering",
            IngestPhase::FilteringPacks => "filtering_packs",
            IngestPhase::UploadingPackMetadata => "uploading_pack_metadata",
            IngestPhase::LoadingExistingIds => "loading_existing_ids",
            IngestPhase::IteratingPacks => "iterating_packs",
            IngestPhase::WritingCombinedSnapshot => "writing_combined_snapshot",
            IngestPhase::Reconciling => "reconciling",
            IngestPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Card id produced by more than one pack, packs in encounter order.
///
/// The first pack is the id's attribution of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRecord {
    pub card_id: String,
    pub pack_ids: Vec<String>,
}

impl DuplicateRecord {
    pub fn owner(&self) -> &str {
        self.pack_ids.first().map(String::as_str).unwrap_or_default()
    }
}

/// A recovered failure, scoped to a pack or a run step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    pub scope: String,
    pub message: String,
}

/// Accumulators owned by the orchestrator for the duration of a run
#[derive(Debug)]
pub struct RunState {
    phase: IngestPhase,
    first_seen: HashMap<String, String>,
    duplicates: Vec<DuplicateRecord>,
    duplicate_index: HashMap<String, usize>,
    pub all_cards: Vec<Card>,
    pub packs_processed: usize,
    pub packs_uploaded: usize,
    pub total_cards: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed_uploads: usize,
    pub images_mirrored: usize,
    pub reconciliation_warning: bool,
    pub cancelled: bool,
    pub errors: Vec<RunError>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            phase: IngestPhase::Discovering,
            first_seen: HashMap::new(),
            duplicates: Vec::new(),
            duplicate_index: HashMap::new(),
            all_cards: Vec::new(),
            packs_processed: 0,
            packs_uploaded: 0,
            total_cards: 0,
            uploaded: 0,
            skipped: 0,
            failed_uploads: 0,
            images_mirrored: 0,
            reconciliation_warning: false,
            cancelled: false,
            errors: Vec::new(),
        }
    }

    pub fn phase(&self) -> IngestPhase {
        self.phase
    }

    pub fn enter(&mut self, phase: IngestPhase) {
        debug!(from = %self.phase, to = %phase, "Phase transition");
        self.phase = phase;
    }

    /// Track ids of a freshly fetched pack against every earlier pack
    pub fn track_ids(&mut self, pack_id: &str, cards: &[Card]) {
        for card in cards {
            if let Some(&index) = self.duplicate_index.get(&card.id) {
                self.duplicates[index].pack_ids.push(pack_id.to_string());
            } else if let Some(owner) = self.first_seen.get(&card.id) {
                self.duplicate_index
                    .insert(card.id.clone(), self.duplicates.len());
                self.duplicates.push(DuplicateRecord {
                    card_id: card.id.clone(),
                    pack_ids: vec![owner.clone(), pack_id.to_string()],
                });
            } else {
                self.first_seen.insert(card.id.clone(), pack_id.to_string());
            }
        }
    }

    pub fn unique_cards(&self) -> usize {
        self.first_seen.len()
    }

    /// Duplicates in the order they were first detected
    pub fn duplicates(&self) -> &[DuplicateRecord] {
        &self.duplicates
    }

    /// Pack an id was first seen in
    pub fn owner_of(&self, card_id: &str) -> Option<&str> {
        self.first_seen.get(card_id).map(String::as_str)
    }

    pub fn record_error(&mut self, scope: impl Into<String>, message: impl Into<String>) {
        self.errors.push(RunError {
            scope: scope.into(),
            message: message.into(),
        });
    }
}
