//! End-to-end orchestrator runs against in-memory source and bridge

mod common;

use std::path::Path;

use anyhow::Result;
use common::{card, card_named, cards, pack, MemoryBridge, MemorySource};
use optcg_common::types::{Card, Pack};
use optcg_ingest::bridge::SqlValue;
use optcg_ingest::config::{ExitPolicy, ReconciliationPolicy, RunOptions};
use optcg_ingest::orchestrator::{DuplicateRecord, Orchestrator};
use optcg_ingest::snapshot::pack_file_name;
use optcg_ingest::store::BulkStore;
use optcg_ingest::IngestError;
use tokio_util::sync::CancellationToken;

fn options(dir: &Path) -> RunOptions {
    RunOptions::default()
        .with_output_dir(dir)
        .with_delay_ms(0)
        .with_upload(true)
}

fn orchestrator(
    source: &MemorySource,
    bridge: &MemoryBridge,
    options: RunOptions,
) -> Orchestrator<MemorySource, MemoryBridge> {
    Orchestrator::new(source.clone(), options).with_store(BulkStore::new(bridge.clone()))
}

fn read_cards(path: &Path) -> Vec<Card> {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_reprint_is_recorded_and_last_write_wins() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = MemorySource::new()
        .with_pack(
            pack("569201"),
            vec![card_named("X", "569201", "Nami"), card("Y", "569201")],
        )
        .with_pack(
            pack("569101"),
            vec![card_named("X", "569101", "Nami (Reprint)"), card("Z", "569101")],
        );
    let bridge = MemoryBridge::new();

    let summary = orchestrator(&source, &bridge, options(dir.path())).run().await?;

    // processing order decides ownership, not id order
    assert_eq!(
        summary.duplicates,
        vec![DuplicateRecord {
            card_id: "X".to_string(),
            pack_ids: vec!["569201".to_string(), "569101".to_string()],
        }]
    );
    assert_eq!(summary.total_cards, 4);
    assert_eq!(summary.unique_cards, 3);
    assert_eq!(summary.uploaded, 4);

    assert_eq!(bridge.row_count("cards"), 3);
    assert_eq!(
        bridge.column("cards", "X", 2),
        Some(SqlValue::Text("Nami (Reprint)".to_string()))
    );

    let combined = read_cards(&dir.path().join("json").join("all-cards.json"));
    let ids: Vec<&str> = combined.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["X", "Y", "X", "Z"]);
    assert_eq!(summary.remote_card_count, Some(3));
    assert_eq!(summary.remote_pack_count, Some(2));
    Ok(())
}

#[tokio::test]
async fn test_existing_cards_are_skipped_but_snapshotted() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pack_a = pack("569101");
    let fetched = cards("OP01", "569101", 6);
    let source = MemorySource::new().with_pack(pack_a.clone(), fetched.clone());
    let bridge = MemoryBridge::new();
    bridge.seed_card(&fetched[0]);
    bridge.seed_card(&fetched[3]);

    let summary = orchestrator(&source, &bridge, options(dir.path())).run().await?;

    let mut uploaded_cards: Vec<String> = bridge
        .upserted_ids()
        .into_iter()
        .filter(|id| id.starts_with("OP01"))
        .collect();
    uploaded_cards.sort();
    assert_eq!(
        uploaded_cards,
        vec!["OP01-002", "OP01-003", "OP01-005", "OP01-006"]
    );
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.uploaded, 4);

    let snapshot = read_cards(&dir.path().join("json").join(pack_file_name(&pack_a)));
    assert_eq!(snapshot, fetched);
    Ok(())
}

#[tokio::test]
async fn test_packs_only_stops_after_metadata() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = MemorySource::new()
        .with_pack(pack("569101"), cards("OP01", "569101", 3))
        .with_pack(pack("569102"), cards("OP02", "569102", 3));
    let bridge = MemoryBridge::new();

    let summary = orchestrator(&source, &bridge, options(dir.path()).with_packs_only(true))
        .run()
        .await?;

    assert!(summary.packs_only);
    assert_eq!(summary.packs_selected, 2);
    assert_eq!(summary.packs_uploaded, 2);
    assert_eq!(summary.total_cards, 0);
    assert!(source.fetched_packs().is_empty());
    assert_eq!(bridge.row_count("packs"), 2);
    assert_eq!(bridge.row_count("cards"), 0);

    let packs: Vec<Pack> =
        serde_json::from_slice(&std::fs::read(dir.path().join("json").join("packs.json"))?)?;
    assert_eq!(packs.len(), 2);
    assert!(!dir.path().join("json").join("all-cards.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_failed_pack_is_recorded_and_run_continues() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = MemorySource::new()
        .with_pack(pack("569101"), cards("OP01", "569101", 2))
        .with_pack(pack("569102"), cards("OP02", "569102", 2))
        .with_pack(pack("569103"), cards("OP03", "569103", 2));
    source.fail_pack("569102");
    let bridge = MemoryBridge::new();

    let summary = orchestrator(&source, &bridge, options(dir.path())).run().await?;

    assert_eq!(source.fetched_packs(), vec!["569101", "569102", "569103"]);
    assert_eq!(summary.packs_processed, 3);
    assert_eq!(summary.total_cards, 4);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].scope, "569102");
    assert!(summary.errors[0].message.contains("HTTP 500"));

    assert!(!ExitPolicy::Advisory.run_failed(summary.errors.len()));
    assert!(ExitPolicy::Strict.run_failed(summary.errors.len()));
    Ok(())
}

#[tokio::test]
async fn test_empty_pack_is_not_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = MemorySource::new()
        .with_pack(pack("569101"), Vec::new())
        .with_pack(pack("569102"), cards("OP02", "569102", 1));
    let bridge = MemoryBridge::new();

    let summary = orchestrator(&source, &bridge, options(dir.path())).run().await?;

    assert!(summary.errors.is_empty());
    assert_eq!(summary.total_cards, 1);
    Ok(())
}

#[tokio::test]
async fn test_discovery_failure_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new().with_pack(pack("569101"), cards("OP01", "569101", 1));
    source.fail_discovery();
    let bridge = MemoryBridge::new();

    let err = orchestrator(&source, &bridge, options(dir.path()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Fetch { .. }));
    assert!(source.fetched_packs().is_empty());
    assert!(bridge.call_sizes().is_empty());
}

#[tokio::test]
async fn test_bridge_outage_is_recorded_per_pack() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = MemorySource::new()
        .with_pack(pack("569101"), cards("OP01", "569101", 3))
        .with_pack(pack("569102"), cards("OP02", "569102", 3));
    let bridge = MemoryBridge::new();
    bridge.fail_everything();

    let summary = orchestrator(&source, &bridge, options(dir.path())).run().await?;

    assert_eq!(summary.packs_uploaded, 0);
    assert_eq!(summary.uploaded, 0);
    assert_eq!(summary.failed_uploads, 6);
    assert_eq!(summary.errors.len(), 2);
    assert!(summary.errors[0].message.starts_with("Upload failed for all 3 cards"));
    assert_eq!(summary.remote_card_count, None);

    // local snapshots do not depend on the remote store
    let combined = read_cards(&dir.path().join("json").join("all-cards.json"));
    assert_eq!(combined.len(), 6);
    Ok(())
}

#[tokio::test]
async fn test_reconciliation_mismatch_warns_by_default() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let fetched = cards("OP01", "569101", 4);
    let source = MemorySource::new().with_pack(pack("569101"), fetched.clone());
    let bridge = MemoryBridge::new();
    bridge.seed_card(&fetched[0]);
    bridge.hide_ids();

    let summary = orchestrator(&source, &bridge, options(dir.path())).run().await?;

    assert!(summary.reconciliation_warning);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.uploaded, 4);
    Ok(())
}

#[tokio::test]
async fn test_reconciliation_mismatch_fails_under_strict_policy() {
    let dir = tempfile::tempdir().unwrap();
    let fetched = cards("OP01", "569101", 4);
    let source = MemorySource::new().with_pack(pack("569101"), fetched.clone());
    let bridge = MemoryBridge::new();
    bridge.seed_card(&fetched[0]);
    bridge.seed_card(&fetched[1]);
    bridge.hide_ids();

    let options = options(dir.path()).with_reconciliation_policy(ReconciliationPolicy::Fail);
    let err = orchestrator(&source, &bridge, options).run().await.unwrap_err();

    assert!(matches!(
        err,
        IngestError::Reconciliation {
            reported: 0,
            existing: 2
        }
    ));
    assert!(source.fetched_packs().is_empty());
}

#[tokio::test]
async fn test_failed_lookup_proceeds_without_skipping() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let fetched = cards("OP01", "569101", 3);
    let source = MemorySource::new().with_pack(pack("569101"), fetched.clone());
    let bridge = MemoryBridge::new();
    bridge.seed_card(&fetched[0]);
    bridge.fail_queries();

    let summary = orchestrator(&source, &bridge, options(dir.path())).run().await?;

    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.uploaded, 3);
    assert!(!summary.reconciliation_warning);
    assert_eq!(summary.remote_card_count, None);
    Ok(())
}

#[tokio::test]
async fn test_filter_selects_packs_by_substring() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = MemorySource::new()
        .with_pack(pack("569101"), cards("OP01", "569101", 1))
        .with_pack(pack("569201"), cards("ST01", "569201", 1))
        .with_pack(pack("569102"), cards("OP02", "569102", 1));
    let bridge = MemoryBridge::new();

    let summary = orchestrator(&source, &bridge, options(dir.path()).with_filter("5691"))
        .run()
        .await?;

    assert_eq!(summary.packs_discovered, 3);
    assert_eq!(summary.packs_selected, 2);
    assert_eq!(source.fetched_packs(), vec!["569101", "569102"]);
    assert_eq!(bridge.ids("packs"), vec!["569101", "569102"]);
    Ok(())
}

#[tokio::test]
async fn test_images_are_mirrored_per_pack() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = MemorySource::new().with_pack(pack("569101"), cards("OP01", "569101", 3));
    source.fail_asset("OP01-002");
    let bridge = MemoryBridge::new();

    let summary = orchestrator(&source, &bridge, options(dir.path()).with_mirror_images(true))
        .run()
        .await?;

    let images = dir.path().join("images").join("569101");
    assert_eq!(summary.images_mirrored, 2);
    assert!(summary.errors.is_empty());
    assert_eq!(std::fs::read(images.join("OP01-001.png"))?, b"image:OP01-001");
    assert!(!images.join("OP01-002.png").exists());
    assert!(images.join("OP01-003.png").exists());
    Ok(())
}

#[tokio::test]
async fn test_local_only_run_never_touches_the_bridge() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = MemorySource::new().with_pack(pack("569101"), cards("OP01", "569101", 2));
    let bridge = MemoryBridge::new();

    let summary = orchestrator(&source, &bridge, options(dir.path()).with_upload(false))
        .run()
        .await?;

    assert!(bridge.call_sizes().is_empty());
    assert_eq!(summary.uploaded, 0);
    assert_eq!(summary.total_cards, 2);
    assert_eq!(summary.remote_card_count, None);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_run_still_writes_combined_snapshot() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = MemorySource::new()
        .with_pack(pack("569101"), cards("OP01", "569101", 2))
        .with_pack(pack("569102"), cards("OP02", "569102", 2));
    let bridge = MemoryBridge::new();
    let token = CancellationToken::new();
    token.cancel();

    let summary = orchestrator(&source, &bridge, options(dir.path()))
        .with_cancellation(token)
        .run()
        .await?;

    assert!(summary.cancelled);
    assert_eq!(summary.packs_processed, 0);
    assert!(source.fetched_packs().is_empty());
    assert!(read_cards(&dir.path().join("json").join("all-cards.json")).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cancel_during_delay_stops_before_next_pack() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = MemorySource::new()
        .with_pack(pack("569101"), cards("OP01", "569101", 2))
        .with_pack(pack("569102"), cards("OP02", "569102", 2));
    let bridge = MemoryBridge::new();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let summary = orchestrator(&source, &bridge, options(dir.path()).with_delay_ms(60_000))
        .with_cancellation(token)
        .run()
        .await?;

    assert!(summary.cancelled);
    assert_eq!(summary.packs_processed, 1);
    assert_eq!(source.fetched_packs(), vec!["569101"]);
    Ok(())
}

#[tokio::test]
async fn test_unwritable_output_root_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("not-a-directory");
    std::fs::write(&root, b"occupied").unwrap();
    let source = MemorySource::new()
        .with_pack(pack("569101"), cards("OP01", "569101", 3))
        .with_pack(pack("569102"), cards("OP02", "569102", 3));
    let bridge = MemoryBridge::new();

    let err = orchestrator(&source, &bridge, options(&root))
        .run()
        .await
        .unwrap_err();

    assert!(err.is_snapshot_failure());
    assert!(source.fetched_packs().is_empty());
    assert!(bridge.call_sizes().is_empty());
}

#[tokio::test]
async fn test_failed_pack_snapshot_aborts_before_upload() {
    let dir = tempfile::tempdir().unwrap();
    let first = pack("569101");
    // a directory where the pack file should go makes the write fail
    std::fs::create_dir_all(dir.path().join("json").join(pack_file_name(&first))).unwrap();
    let source = MemorySource::new()
        .with_pack(first, cards("OP01", "569101", 3))
        .with_pack(pack("569102"), cards("OP02", "569102", 3));
    let bridge = MemoryBridge::new();

    let err = orchestrator(&source, &bridge, options(dir.path()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Snapshot(_)));
    assert_eq!(source.fetched_packs(), vec!["569101"]);
    assert!(!bridge.upserted_ids().iter().any(|id| id.starts_with("OP0")));
    assert_eq!(bridge.row_count("packs"), 2);
    assert!(!dir.path().join("json").join("all-cards.json").exists());
}

#[tokio::test]
async fn test_failed_combined_snapshot_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("json").join("all-cards.json")).unwrap();
    let source = MemorySource::new().with_pack(pack("569101"), cards("OP01", "569101", 2));
    let bridge = MemoryBridge::new();

    let err = orchestrator(&source, &bridge, options(dir.path()))
        .run()
        .await
        .unwrap_err();

    assert!(err.is_snapshot_failure());
    // pack files and uploads happen before the combined write
    assert_eq!(bridge.row_count("cards"), 2);
}
