//! Bulk persistence through the query bridge
//!
//! [`BulkStore`] upserts packs and cards in fixed-size chunks, one bridge
//! call per chunk. Accounting is per item: a statement that reports failure
//! fails only its own item, a call that fails as a whole fails every item in
//! its chunk. With retry enabled, failed items are then upserted one at a
//! time, so a chunk lost to a crashed bridge call can still converge.
//!
//! For every [`UploadResult`], `successful + failed == total_attempted`.

mod statements;

pub use statements::Upsertable;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use optcg_common::types::{Card, Pack};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bridge::{QueryBridge, Statement, StatementResult};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::{IngestError, Result};

/// An item that could not be persisted, with its latest error
#[derive(Debug, Clone)]
pub struct FailedItem<T> {
    pub item: T,
    pub error: String,
}

/// Aggregate outcome of one bulk upsert
#[derive(Debug, Clone)]
pub struct UploadResult<T> {
    pub total_attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub failed_items: Vec<FailedItem<T>>,
    pub duration: Duration,
}

impl<T> UploadResult<T> {
    fn empty() -> Self {
        Self {
            total_attempted: 0,
            successful: 0,
            failed: 0,
            failed_items: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Every item ultimately persisted
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Whole upload lost, e.g. the bridge was unreachable for every call
    pub fn is_total_failure(&self) -> bool {
        self.total_attempted > 0 && self.successful == 0
    }

    fn record_failure(&mut self, item: T, error: impl Into<String>) {
        self.failed += 1;
        self.failed_items.push(FailedItem {
            item,
            error: error.into(),
        });
    }
}

/// Progress of a running bulk upsert
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UploadProgress {
    pub total: usize,
    pub current: usize,
    pub failed: usize,
    pub percentage: f64,
}

impl UploadProgress {
    fn new(total: usize, current: usize, failed: usize) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            current as f64 / total as f64 * 100.0
        };
        Self {
            total,
            current,
            failed,
            percentage,
        }
    }
}

/// Callback receiving upload progress
pub type ProgressObserver = Arc<dyn Fn(&UploadProgress) + Send + Sync>;

/// Chunked insert-or-replace store for packs and cards
pub struct BulkStore<B> {
    bridge: B,
    observer: Option<ProgressObserver>,
}

impl<B: QueryBridge> BulkStore<B> {
    pub fn new(bridge: B) -> Self {
        Self {
            bridge,
            observer: None,
        }
    }

    pub fn with_progress(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    fn report(&self, progress: UploadProgress) {
        if let Some(observer) = &self.observer {
            observer(&progress);
        }
    }

    /// Upsert a single record, failing on a bridge error or a failed statement
    pub async fn upsert_one<T: Upsertable>(&self, item: &T) -> Result<()> {
        let statement = item.upsert_statement()?;
        let results = self.bridge.execute_many(std::slice::from_ref(&statement)).await?;

        match results.into_iter().next() {
            Some(result) if result.success => Ok(()),
            Some(result) => Err(IngestError::StatementFailed(
                result.error.unwrap_or_else(|| "Unknown error".to_string()),
            )),
            None => Err(IngestError::StatementFailed(format!(
                "No result returned for {} {}",
                T::TABLE,
                item.key()
            ))),
        }
    }

    /// Upsert records in chunks of `batch_size`, optionally retrying failures one by one
    pub async fn upsert_batch<T: Upsertable>(
        &self,
        items: &[T],
        batch_size: usize,
        retry_failed: bool,
    ) -> UploadResult<T> {
        let start = Instant::now();
        let mut result = UploadResult::empty();
        result.total_attempted = items.len();

        if items.is_empty() {
            return result;
        }

        let batch_size = batch_size.max(1);
        let total_chunks = items.len().div_ceil(batch_size);
        let mut processed = 0;

        info!(
            table = T::TABLE,
            items = items.len(),
            batch_size,
            chunks = total_chunks,
            "Uploading in batches"
        );

        for (chunk_index, chunk) in items.chunks(batch_size).enumerate() {
            self.report(UploadProgress::new(items.len(), processed, result.failed));

            let mut submitted: Vec<&T> = Vec::with_capacity(chunk.len());
            let mut statements: Vec<Statement> = Vec::with_capacity(chunk.len());
            for item in chunk {
                match item.upsert_statement() {
                    Ok(statement) => {
                        submitted.push(item);
                        statements.push(statement);
                    },
                    Err(e) => result.record_failure(item.clone(), e.to_string()),
                }
            }

            match self.bridge.execute_many(&statements).await {
                Ok(results) => self.account_chunk(&mut result, &submitted, results),
                Err(e) => {
                    warn!(
                        table = T::TABLE,
                        chunk = chunk_index + 1,
                        chunks = total_chunks,
                        size = submitted.len(),
                        error = %e,
                        "Batch call failed, marking every item in the chunk failed"
                    );
                    let message = e.to_string();
                    for item in submitted {
                        result.record_failure(item.clone(), message.clone());
                    }
                },
            }

            processed += chunk.len();
            debug!(
                table = T::TABLE,
                chunk = chunk_index + 1,
                chunks = total_chunks,
                successful = result.successful,
                failed = result.failed,
                "Chunk complete"
            );
        }

        self.report(UploadProgress::new(items.len(), processed, result.failed));

        if retry_failed && !result.failed_items.is_empty() {
            self.retry_individually(&mut result).await;
        }

        result.duration = start.elapsed();

        info!(
            table = T::TABLE,
            successful = result.successful,
            failed = result.failed,
            total = result.total_attempted,
            duration_ms = result.duration.as_millis() as u64,
            "Upload complete"
        );

        result
    }

    fn account_chunk<T: Upsertable>(
        &self,
        result: &mut UploadResult<T>,
        submitted: &[&T],
        statement_results: Vec<StatementResult>,
    ) {
        let mut statement_results = statement_results.into_iter();
        for item in submitted {
            match statement_results.next() {
                Some(outcome) if outcome.success => result.successful += 1,
                Some(outcome) => result.record_failure(
                    (*item).clone(),
                    outcome.error.unwrap_or_else(|| "Unknown error".to_string()),
                ),
                None => result.record_failure((*item).clone(), "No result returned for statement"),
            }
        }
    }

    async fn retry_individually<T: Upsertable>(&self, result: &mut UploadResult<T>) {
        let pending = std::mem::take(&mut result.failed_items);
        info!(table = T::TABLE, count = pending.len(), "Retrying failed items individually");

        let mut recovered = 0;
        for failed in pending {
            match self.upsert_one(&failed.item).await {
                Ok(()) => {
                    recovered += 1;
                    result.successful += 1;
                    result.failed -= 1;
                },
                Err(e) => {
                    debug!(table = T::TABLE, key = failed.item.key(), error = %e, "Retry failed");
                    result.failed_items.push(FailedItem {
                        item: failed.item,
                        error: e.to_string(),
                    });
                },
            }
        }

        info!(
            table = T::TABLE,
            recovered,
            still_failed = result.failed,
            "Individual retry complete"
        );
    }

    pub async fn upsert_pack(&self, pack: &Pack) -> Result<()> {
        self.upsert_one(pack).await
    }

    pub async fn upsert_card(&self, card: &Card) -> Result<()> {
        self.upsert_one(card).await
    }

    /// Pack metadata upload; failures are reported, not retried
    pub async fn upsert_packs(&self, packs: &[Pack]) -> UploadResult<Pack> {
        self.upsert_batch(packs, DEFAULT_BATCH_SIZE, false).await
    }

    pub async fn upsert_cards(
        &self,
        cards: &[Card],
        batch_size: usize,
        retry_failed: bool,
    ) -> UploadResult<Card> {
        self.upsert_batch(cards, batch_size, retry_failed).await
    }

    async fn query_ok(&self, statement: &Statement) -> Result<StatementResult> {
        let result = self.bridge.query(statement).await?;
        if result.success {
            Ok(result)
        } else {
            Err(IngestError::StatementFailed(
                result.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }

    /// Ids of stored cards, optionally limited to one pack
    pub async fn existing_card_ids(&self, pack_id: Option<&str>) -> Result<HashSet<String>> {
        let result = self.query_ok(&statements::select_card_ids(pack_id)).await?;
        Ok(result.column_text("id").into_iter().collect())
    }

    pub async fn existing_pack_ids(&self) -> Result<HashSet<String>> {
        let result = self.query_ok(&statements::select_pack_ids()).await?;
        Ok(result.column_text("id").into_iter().collect())
    }

    pub async fn card_count(&self) -> Result<u64> {
        self.count("cards").await
    }

    pub async fn pack_count(&self) -> Result<u64> {
        self.count("packs").await
    }

    async fn count(&self, table: &str) -> Result<u64> {
        let result = self.query_ok(&statements::count_rows(table)).await?;
        Ok(result.first_integer("count").unwrap_or(0))
    }
}
