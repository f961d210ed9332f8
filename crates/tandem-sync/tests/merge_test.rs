//! Remote merges: adoption, pending-work protection, golden scenarios.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tandem_core::constants::pending_ops_namespace;
use tandem_core::errors::TandemResult;
use tandem_core::models::{Batch, ItemKey, ItemOrigin, ItemValue, OpType, RemoteDocument};
use tandem_storage::MemoryStore;
use tandem_sync::{
    ChangeFeed, CommitReceipt, EngineEvent, IRemoteGateway, InMemoryRemote, MergeTrigger,
    SyncEngine,
};
use test_fixtures::{load_merge_scenarios, MergeScenario};

use common::*;

fn items(raw: &BTreeMap<String, serde_json::Value>) -> BTreeMap<ItemKey, ItemValue> {
    raw.iter()
        .map(|(k, v)| {
            (
                ItemKey::new(k.as_str()).unwrap(),
                serde_json::from_value(v.clone()).unwrap(),
            )
        })
        .collect()
}

fn document(items: BTreeMap<ItemKey, ItemValue>, revision: u64) -> RemoteDocument {
    RemoteDocument {
        items,
        last_updated: Utc::now(),
        last_writer_id: Some(OTHER_DEVICE.to_string()),
        revision,
        ..RemoteDocument::empty(config().collection_id)
    }
}

#[tokio::test]
async fn fresh_device_adopts_remote_without_pushing() {
    let remote = remote();
    remote.write_as(OTHER_DEVICE, "tent", true).unwrap();
    remote.write_as(OTHER_DEVICE, "lamp", "red").unwrap();
    let engine = memory_engine(&remote);
    let mut events = engine.subscribe();

    let report = engine.reconcile(MergeTrigger::ColdStart).await.unwrap();

    assert_eq!(report.adopted, 2);
    assert_eq!(report.pushed, 0);
    assert_eq!(engine.get_all(), remote.document().items);
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(engine.remote_revision(), 2);

    let remote_changes = drain(&mut events)
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                EngineEvent::ItemChanged {
                    origin: ItemOrigin::Remote,
                    ..
                }
            )
        })
        .count();
    assert_eq!(remote_changes, 2);
}

#[tokio::test]
async fn pending_edit_is_not_clobbered_by_remote() {
    let remote = remote();
    let engine = memory_engine(&remote);
    engine.set("tent", false).unwrap();
    remote.write_as(OTHER_DEVICE, "tent", true).unwrap();

    let report = engine.reconcile(MergeTrigger::RemoteChange).await.unwrap();

    assert_eq!(report.retained, 1);
    assert_eq!(engine.get("tent"), Some(ItemValue::Bool(false)));

    engine.flush().await;
    assert_eq!(remote.document().items.get("tent"), Some(&ItemValue::Bool(false)));
}

#[tokio::test]
async fn settled_key_takes_remote_value() {
    let remote = remote();
    let engine = memory_engine(&remote);
    engine.set("tent", false).unwrap();
    engine.flush().await;
    remote.write_as(OTHER_DEVICE, "tent", true).unwrap();

    engine.reconcile(MergeTrigger::RemoteChange).await.unwrap();

    assert_eq!(engine.get("tent"), Some(ItemValue::Bool(true)));
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test]
async fn adopted_values_persist_across_restart() {
    let remote = remote();
    remote.write_as(OTHER_DEVICE, "tent", true).unwrap();
    let store = Arc::new(MemoryStore::new());

    let engine = open(config(), Arc::clone(&store), &remote);
    engine.reconcile(MergeTrigger::ColdStart).await.unwrap();
    drop(engine);

    let engine = open(config(), store, &remote);
    assert_eq!(engine.get("tent"), Some(ItemValue::Bool(true)));
    assert_eq!(engine.remote_revision(), 1);
}

#[tokio::test]
async fn local_only_keys_are_queued_as_adds() {
    let remote = remote();
    let engine = memory_engine(&remote);
    engine
        .apply_remote_document(document(items_of(&[("map", true)]), 1), MergeTrigger::ColdStart)
        .unwrap();

    let report = engine
        .apply_remote_document(document(BTreeMap::new(), 2), MergeTrigger::Reconnect)
        .unwrap();

    assert_eq!(report.pushed, 1);
    let pending = engine.pending_operations();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].op_type(), OpType::Add);
    assert_eq!(pending[0].target_key.as_str(), "map");
}

fn items_of(pairs: &[(&str, bool)]) -> BTreeMap<ItemKey, ItemValue> {
    pairs
        .iter()
        .map(|(k, v)| (ItemKey::new(*k).unwrap(), ItemValue::Bool(*v)))
        .collect()
}

/// Put the engine in the scenario's local state: `local` settled, plus a
/// pending operation for every key in `pending`.
fn seed(engine: &tandem_sync::SyncEngine<MemoryStore, tandem_sync::InMemoryRemote>, scenario: &MergeScenario) {
    let local = items(&scenario.local);
    let remote = items(&scenario.remote);
    let mut settled = local.clone();
    for key in &scenario.pending {
        if !local.contains_key(key.as_str()) {
            let value = remote
                .get(key.as_str())
                .cloned()
                .unwrap_or(ItemValue::Bool(true));
            settled.insert(ItemKey::new(key.as_str()).unwrap(), value);
        }
    }
    engine
        .apply_remote_document(document(settled, 1), MergeTrigger::ColdStart)
        .unwrap();

    for key in &scenario.pending {
        match local.get(key.as_str()) {
            Some(value) => engine.set(key, value.clone()).unwrap(),
            None => assert!(engine.remove(key).unwrap()),
        }
    }
}

#[tokio::test]
async fn golden_merge_scenarios() {
    let scenarios = load_merge_scenarios();
    assert!(!scenarios.is_empty());

    for scenario in scenarios {
        let remote = remote();
        let engine = memory_engine(&remote);
        seed(&engine, &scenario);

        let report = engine
            .apply_remote_document(document(items(&scenario.remote), 2), MergeTrigger::Reconnect)
            .unwrap();

        assert_eq!(
            engine.get_all(),
            items(&scenario.expected.items),
            "{}: items",
            scenario.name
        );
        assert_eq!(report.adopted, scenario.expected.adopted.len(), "{}: adopted", scenario.name);
        assert_eq!(report.retained, scenario.expected.retained.len(), "{}: retained", scenario.name);
        assert_eq!(report.pushed, scenario.expected.pushed.len(), "{}: pushed", scenario.name);

        let mut pending: Vec<String> = engine
            .pending_operations()
            .into_iter()
            .map(|op| op.target_key.as_str().to_string())
            .collect();
        pending.sort();
        let mut expected_pending: Vec<String> = scenario
            .pending
            .iter()
            .chain(scenario.expected.pushed.iter())
            .cloned()
            .collect();
        expected_pending.sort();
        assert_eq!(pending, expected_pending, "{}: pending", scenario.name);
    }
}

/// Remote whose fetches return a snapshot taken before a delay.
struct SlowFetch {
    inner: InMemoryRemote,
    delay: Duration,
}

impl IRemoteGateway for SlowFetch {
    async fn commit_batch(&self, device_id: &str, batch: &Batch) -> TandemResult<CommitReceipt> {
        self.inner.commit_batch(device_id, batch).await
    }

    async fn fetch_document(&self) -> TandemResult<RemoteDocument> {
        let snapshot = self.inner.fetch_document().await?;
        tokio::time::sleep(self.delay).await;
        Ok(snapshot)
    }

    fn subscribe(&self) -> TandemResult<ChangeFeed> {
        self.inner.subscribe()
    }
}

#[tokio::test]
async fn late_fetch_does_not_revert_a_committed_edit() {
    let remote = remote();
    remote.write_as(OTHER_DEVICE, "a", false).unwrap();
    let gateway = Arc::new(SlowFetch {
        inner: remote.clone(),
        delay: Duration::from_millis(100),
    });
    let engine = SyncEngine::open(config(), Arc::new(MemoryStore::new()), gateway).unwrap();
    engine.reconcile(MergeTrigger::ColdStart).await.unwrap();

    engine.set("a", true).unwrap();
    let fetching = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.reconcile(MergeTrigger::Reconnect).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(engine.flush().await.committed, 1);

    let stale = fetching.await.unwrap().unwrap();
    assert_eq!(stale.adopted, 0);
    assert_eq!(engine.get("a"), Some(ItemValue::Bool(true)));
    assert_eq!(remote.document().items.get("a"), Some(&ItemValue::Bool(true)));
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test]
async fn unqueueable_push_does_not_abort_the_merge() {
    let remote = remote();
    let store = Arc::new(MemoryStore::new());
    let engine = open(config(), Arc::clone(&store), &remote);
    engine
        .apply_remote_document(document(items_of(&[("map", true)]), 1), MergeTrigger::ColdStart)
        .unwrap();
    let mut events = engine.subscribe();

    let queue_namespace = pending_ops_namespace(engine.collection_id());
    store.set_failing_namespace(Some(&queue_namespace));
    let report = engine
        .apply_remote_document(document(items_of(&[("boots", true)]), 2), MergeTrigger::Reconnect)
        .unwrap();

    assert_eq!(report.adopted, 1);
    assert_eq!(report.pushed, 0);
    assert_eq!(engine.get("boots"), Some(ItemValue::Bool(true)));
    assert_eq!(engine.pending_count(), 0);
    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::ItemChanged { key, origin: ItemOrigin::Remote, .. } if key.as_str() == "boots"
    )));
    assert!(events.iter().any(|e| matches!(e, EngineEvent::Merged(_))));

    // The watermark moved to revision 2, so an older document is ignored.
    engine
        .apply_remote_document(document(items_of(&[("boots", false)]), 1), MergeTrigger::RemoteChange)
        .unwrap();
    assert_eq!(engine.get("boots"), Some(ItemValue::Bool(true)));

    // The skipped key is queued by the next merge.
    store.set_failing_namespace(None);
    let report = engine
        .apply_remote_document(document(items_of(&[("boots", true)]), 3), MergeTrigger::Reconnect)
        .unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(engine.pending_operations()[0].target_key.as_str(), "map");
}
