//! Background driver against an in-process remote, in real time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tandem_core::config::TandemConfig;
use tandem_core::models::{ItemKey, ItemValue, RemoteDocument};
use tandem_storage::MemoryStore;
use tandem_sync::{EngineEvent, InMemoryRemote, SyncEngine};

use common::*;

const SETTLE: Duration = Duration::from_millis(50);
const PATIENCE: Duration = Duration::from_secs(2);

fn driver_config(max_wait_ms: u64) -> TandemConfig {
    let mut config = config();
    config.outbox.max_wait_ms = max_wait_ms;
    config.retry.initial_backoff_ms = 50;
    config
}

fn engine_with(config: TandemConfig, remote: &InMemoryRemote) -> SyncEngine<MemoryStore, InMemoryRemote> {
    open(config, Arc::new(MemoryStore::new()), remote)
}

#[tokio::test]
async fn flushes_once_max_wait_elapses() {
    let remote = remote();
    let engine = engine_with(driver_config(300), &remote);
    let driver = engine.spawn_driver();
    tokio::time::sleep(SETTLE).await;

    engine.set("tent", true).unwrap();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(remote.commit_count(), 0);

    assert!(eventually(PATIENCE, || remote.commit_count() == 1).await);
    driver.shutdown().await;
}

#[tokio::test]
async fn full_outbox_flushes_without_waiting() {
    let remote = remote();
    let mut config = driver_config(60_000);
    config.outbox.max_batch_size = 3;
    let engine = engine_with(config, &remote);
    let driver = engine.spawn_driver();
    tokio::time::sleep(SETTLE).await;

    for key in ["a", "b", "c"] {
        engine.set(key, true).unwrap();
    }

    assert!(eventually(PATIENCE, || remote.commit_count() == 1).await);
    assert_eq!(remote.commit_log()[0].len(), 3);
    driver.shutdown().await;
}

#[tokio::test]
async fn cold_start_adopts_and_replays() {
    let remote = remote();
    remote.write_as(OTHER_DEVICE, "stove", true).unwrap();
    let store = Arc::new(MemoryStore::new());
    {
        let engine = open(config(), Arc::clone(&store), &remote);
        engine.set("tent", true).unwrap();
    }

    let engine = open(driver_config(60_000), store, &remote);
    let driver = engine.spawn_driver();

    assert!(eventually(PATIENCE, || engine.pending_count() == 0).await);
    assert_eq!(engine.get("stove"), Some(ItemValue::Bool(true)));
    assert_eq!(remote.document().items.get("tent"), Some(&ItemValue::Bool(true)));
    driver.shutdown().await;
}

#[tokio::test]
async fn remote_changes_arrive_through_the_feed() {
    let remote = remote();
    let engine = engine_with(driver_config(50), &remote);
    let driver = engine.spawn_driver();
    tokio::time::sleep(SETTLE).await;

    remote.write_as(OTHER_DEVICE, "lamp", "red").unwrap();
    let red = Some(ItemValue::Text("red".into()));
    assert!(eventually(PATIENCE, || engine.get("lamp") == red).await);

    // A notification older than what was already merged is dropped.
    let mut stale = RemoteDocument::empty(config().collection_id);
    stale
        .items
        .insert(ItemKey::new("lamp").unwrap(), ItemValue::Text("blue".into()));
    stale.last_updated = Utc::now();
    remote.publish(stale);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.get("lamp"), red);

    driver.shutdown().await;
}

#[tokio::test]
async fn republished_document_is_not_merged_twice() {
    let remote = remote();
    let engine = engine_with(driver_config(50), &remote);
    let driver = engine.spawn_driver();
    tokio::time::sleep(SETTLE).await;

    remote.write_as(OTHER_DEVICE, "lamp", "red").unwrap();
    let red = Some(ItemValue::Text("red".into()));
    assert!(eventually(PATIENCE, || engine.get("lamp") == red).await);
    tokio::time::sleep(SETTLE).await;

    let mut events = engine.subscribe();
    let before = engine.get_all();
    remote.publish(remote.document());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let events = drain(&mut events);
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::ItemChanged { .. } | EngineEvent::Merged(_))));
    assert_eq!(engine.get_all(), before);
    driver.shutdown().await;
}

#[tokio::test]
async fn failed_commit_is_retried_after_backoff() {
    let remote = remote();
    let engine = engine_with(driver_config(20), &remote);
    let driver = engine.spawn_driver();
    tokio::time::sleep(SETTLE).await;

    remote.fail_next_commits(1);
    engine.set("tent", true).unwrap();

    assert!(eventually(PATIENCE, || remote.commit_count() == 1).await);
    assert_eq!(engine.pending_count(), 0);
    driver.shutdown().await;
}

#[tokio::test]
async fn reconnect_replays_offline_writes() {
    let remote = remote();
    let engine = engine_with(driver_config(20), &remote);
    let driver = engine.spawn_driver();
    tokio::time::sleep(SETTLE).await;

    engine.set_connectivity(false);
    engine.set("tent", true).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(remote.commit_count(), 0);

    engine.set_connectivity(true);
    assert!(eventually(PATIENCE, || remote.commit_count() == 1).await);
    driver.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_flushing() {
    let remote = remote();
    let engine = engine_with(driver_config(20), &remote);
    let driver = engine.spawn_driver();
    tokio::time::sleep(SETTLE).await;
    driver.shutdown().await;

    engine.set("tent", true).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(remote.commit_count(), 0);
    assert_eq!(engine.pending_count(), 1);
}
