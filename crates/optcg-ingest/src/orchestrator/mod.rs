//! Ingestion orchestrator
//!
//! Drives one run: discover packs, filter them, snapshot and upload pack
//! metadata, then walk the packs strictly one after another. Each pack is
//! fetched, checked for ids already seen this run, snapshotted in full,
//! uploaded minus the ids already stored remotely, and optionally mirrored.
//! After the loop the combined snapshot is written and remote totals are
//! read back.
//!
//! A run aborts on failed discovery, on any failed snapshot write (the local
//! snapshot is the run's record of truth) and on a reconciliation mismatch
//! under [`ReconciliationPolicy::Fail`]. Fetch and upload failures are
//! recorded in the summary's error list and the run moves on.

mod state;
mod summary;

pub use state::{DuplicateRecord, IngestPhase, RunError, RunState};
pub use summary::RunSummary;

use std::collections::HashSet;

use chrono::Utc;
use optcg_common::types::{Card, Pack};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bridge::QueryBridge;
use crate::config::{ReconciliationPolicy, RunOptions};
use crate::error::{IngestError, Result};
use crate::snapshot::SnapshotStore;
use crate::source::CatalogSource;
use crate::store::BulkStore;

/// How many failed cards are listed individually per pack
const FAILED_CARDS_LISTED: usize = 5;

const SAMPLE_IDS_LOGGED: usize = 5;

pub struct Orchestrator<S, B> {
    source: S,
    store: Option<BulkStore<B>>,
    snapshot: SnapshotStore,
    options: RunOptions,
    cancel: CancellationToken,
}

impl<S: CatalogSource, B: QueryBridge> Orchestrator<S, B> {
    /// Orchestrator writing snapshots under `options.output_dir`, without upload
    pub fn new(source: S, options: RunOptions) -> Self {
        Self {
            source,
            store: None,
            snapshot: SnapshotStore::new(&options.output_dir),
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Upload through `store`
    pub fn with_store(mut self, store: BulkStore<B>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn store(&self) -> Option<&BulkStore<B>> {
        self.store.as_ref()
    }

    fn uploading(&self) -> Option<&BulkStore<B>> {
        if self.options.upload {
            self.store.as_ref()
        } else {
            None
        }
    }

    /// Execute a full run
    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("ingest_run", run_id = %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunSummary> {
        let started_at = Utc::now();
        let mut state = RunState::new();

        info!(
            output = %self.options.output_dir.display(),
            upload = self.uploading().is_some(),
            images = self.options.mirror_images,
            packs_only = self.options.packs_only,
            "Starting catalog ingestion"
        );

        // Nothing to iterate over without the pack list
        state.enter(IngestPhase::Discovering);
        let discovered = self.source.discover_packs().await?;
        let packs_discovered = discovered.len();

        state.enter(IngestPhase::FilteringPacks);
        let packs: Vec<Pack> = discovered
            .into_iter()
            .filter(|pack| self.options.selects(&pack.id))
            .collect();
        info!(
            discovered = packs_discovered,
            selected = packs.len(),
            filter = ?self.options.filter,
            "Packs selected"
        );

        state.enter(IngestPhase::UploadingPackMetadata);
        self.publish_packs(&mut state, &packs).await?;

        if self.options.packs_only {
            state.enter(IngestPhase::Done);
            let mut summary =
                RunSummary::from_state(run_id, started_at, packs_discovered, packs.len(), state);
            summary.packs_only = true;
            summary.log();
            return Ok(summary);
        }

        state.enter(IngestPhase::LoadingExistingIds);
        let existing = self.load_existing_ids(&mut state).await?;

        state.enter(IngestPhase::IteratingPacks);
        for (index, pack) in packs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                state.cancelled = true;
                break;
            }

            info!(
                "[{}/{}] Processing pack {} - {}",
                index + 1,
                packs.len(),
                pack.id,
                pack.display_title()
            );

            let span = info_span!("pack", pack_id = %pack.id, index = index + 1);
            match self
                .process_pack(&mut state, pack, &existing)
                .instrument(span)
                .await
            {
                Ok(()) => {},
                Err(e) if e.is_snapshot_failure() => {
                    error!(pack_id = %pack.id, error = %e, "Snapshot write failed, aborting run");
                    return Err(e);
                },
                Err(e) => {
                    warn!(pack_id = %pack.id, error = %e, "Failed to process pack");
                    state.record_error(pack.id.clone(), e.to_string());
                },
            }
            state.packs_processed += 1;

            if index + 1 < packs.len() && !self.pause_between_packs().await {
                state.cancelled = true;
                break;
            }
        }

        state.enter(IngestPhase::WritingCombinedSnapshot);
        self.snapshot.write_combined(&state.all_cards).await?;

        if !state.duplicates().is_empty() {
            warn!(
                duplicates = state.duplicates().len(),
                "Found card ids shared across packs; the remote table holds fewer rows than total cards"
            );
        }

        state.enter(IngestPhase::Reconciling);
        let (remote_cards, remote_packs) = self.remote_totals().await;

        state.enter(IngestPhase::Done);
        let mut summary =
            RunSummary::from_state(run_id, started_at, packs_discovered, packs.len(), state);
        summary.remote_card_count = remote_cards;
        summary.remote_pack_count = remote_packs;
        summary.log();

        Ok(summary)
    }

    /// Write `packs.json` and upsert pack metadata; only the write is fatal
    async fn publish_packs(&self, state: &mut RunState, packs: &[Pack]) -> Result<()> {
        self.snapshot.write_packs(packs).await?;

        let Some(store) = self.uploading() else {
            return Ok(());
        };

        let result = store.upsert_packs(packs).await;
        state.packs_uploaded = result.successful;
        if result.is_success() {
            info!(packs = result.successful, "Uploaded pack metadata");
        } else {
            warn!(
                uploaded = result.successful,
                total = result.total_attempted,
                failed = result.failed,
                "Pack metadata upload incomplete"
            );
        }
        Ok(())
    }

    /// Ids already stored remotely; empty when not uploading or when the lookup fails
    async fn load_existing_ids(&self, state: &mut RunState) -> Result<HashSet<String>> {
        let Some(store) = self.uploading() else {
            return Ok(HashSet::new());
        };

        let existing = match store.existing_card_ids(None).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not check existing cards, proceeding without skip detection");
                return Ok(HashSet::new());
            },
        };
        info!(existing = existing.len(), "Found existing cards");

        if !existing.is_empty() {
            let sample: Vec<&str> = existing
                .iter()
                .take(SAMPLE_IDS_LOGGED)
                .map(String::as_str)
                .collect();
            debug!(sample = ?sample, "Sample existing ids");
            return Ok(existing);
        }

        match store.card_count().await {
            Ok(count) if count > 0 => {
                state.reconciliation_warning = true;
                match self.options.reconciliation_policy {
                    ReconciliationPolicy::Warn => warn!(
                        count,
                        "Remote table has cards but the id lookup returned none; no cards will be skipped"
                    ),
                    ReconciliationPolicy::Fail => {
                        return Err(IngestError::Reconciliation {
                            reported: 0,
                            existing: count,
                        });
                    },
                }
            },
            Ok(_) => {},
            Err(e) => debug!(error = %e, "Card count check failed"),
        }

        Ok(existing)
    }

    async fn process_pack(
        &self,
        state: &mut RunState,
        pack: &Pack,
        existing: &HashSet<String>,
    ) -> Result<()> {
        debug!("Fetching cards");
        let cards = self.source.fetch_cards(&pack.id).await?;

        if cards.is_empty() {
            warn!("No cards found");
            return Ok(());
        }

        self.snapshot.write_cards(pack, &cards).await?;
        state.track_ids(&pack.id, &cards);

        let to_upload: Vec<Card> = match self.uploading() {
            Some(_) => cards
                .iter()
                .filter(|card| !existing.contains(&card.id))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let skipped = if self.uploading().is_some() {
            cards.len() - to_upload.len()
        } else {
            0
        };
        if skipped > 0 {
            info!(skipped, "Skipping cards already stored");
            state.skipped += skipped;
        }

        if let Some(store) = self.uploading() {
            if to_upload.is_empty() {
                info!(cards = cards.len(), "All cards already stored");
            } else {
                self.upload_cards(state, store, pack, &to_upload).await;
            }
        }

        state.total_cards += cards.len();
        info!(
            cards = cards.len(),
            new = to_upload.len(),
            existing = skipped,
            "Processed pack"
        );

        if self.options.mirror_images {
            self.mirror_images(state, &cards).await;
        }

        state.all_cards.extend(cards);
        Ok(())
    }

    async fn upload_cards(
        &self,
        state: &mut RunState,
        store: &BulkStore<B>,
        pack: &Pack,
        cards: &[Card],
    ) {
        let result = store
            .upsert_cards(cards, self.options.batch_size, self.options.retry_failed)
            .await;

        state.uploaded += result.successful;
        state.failed_uploads += result.failed;

        if result.is_success() {
            info!(
                cards = result.successful,
                duration_ms = result.duration.as_millis() as u64,
                "Uploaded cards"
            );
            return;
        }

        if result.failed_items.len() <= FAILED_CARDS_LISTED {
            for failed in &result.failed_items {
                warn!(card_id = %failed.item.id, name = %failed.item.name, error = %failed.error, "Card upload failed");
            }
        }

        let message = if result.is_total_failure() {
            let cause = result
                .failed_items
                .first()
                .map(|f| f.error.as_str())
                .unwrap_or("unknown error");
            format!("Upload failed for all {} cards: {}", result.total_attempted, cause)
        } else {
            format!(
                "Failed to upload {} of {} cards",
                result.failed, result.total_attempted
            )
        };
        warn!(
            uploaded = result.successful,
            total = result.total_attempted,
            "Card upload incomplete"
        );
        state.record_error(pack.id.clone(), message);
    }

    async fn mirror_images(&self, state: &mut RunState, cards: &[Card]) {
        info!(images = cards.len(), "Downloading images");
        let mut written = 0;

        for (i, card) in cards.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }

            let outcome = match self.source.fetch_asset(card).await {
                Ok(bytes) => self.snapshot.write_image(card, &bytes).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(_) => {
                    written += 1;
                    debug!(card_id = %card.id, "Downloaded image {}/{}", i + 1, cards.len());
                },
                Err(e) => warn!(card_id = %card.id, error = %e, "Failed to download image"),
            }
        }

        state.images_mirrored += written;
        info!(images = written, "Images downloaded");
    }

    /// Sleep the inter-pack delay; false when the run was cancelled meanwhile
    async fn pause_between_packs(&self) -> bool {
        let delay = self.options.delay();
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }

        debug!(delay_ms = self.options.delay_ms, "Waiting before next pack");
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn remote_totals(&self) -> (Option<u64>, Option<u64>) {
        let Some(store) = self.uploading() else {
            return (None, None);
        };

        let cards = match store.card_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                debug!(error = %e, "Could not read final card count");
                None
            },
        };
        let packs = match store.pack_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                debug!(error = %e, "Could not read final pack count");
                None
            },
        };

        (cards, packs)
    }
}
