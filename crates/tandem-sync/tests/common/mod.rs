#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use tandem_core::config::TandemConfig;
use tandem_core::traits::IDurableStore;
use tandem_storage::MemoryStore;
use tandem_sync::{EngineEvent, InMemoryRemote, SyncEngine};

pub const DEVICE: &str = "device-a";
pub const OTHER_DEVICE: &str = "device-b";

pub fn config() -> TandemConfig {
    let mut config = TandemConfig::default();
    config.device_id = DEVICE.to_string();
    config
}

pub fn config_with_batch(max_batch_size: usize) -> TandemConfig {
    let mut config = config();
    config.outbox.max_batch_size = max_batch_size;
    config
}

pub fn remote() -> InMemoryRemote {
    InMemoryRemote::new(TandemConfig::default().collection_id)
}

pub fn open<S: IDurableStore + 'static>(
    config: TandemConfig,
    store: Arc<S>,
    remote: &InMemoryRemote,
) -> SyncEngine<S, InMemoryRemote> {
    SyncEngine::open(config, store, Arc::new(remote.clone())).unwrap()
}

pub fn memory_engine(remote: &InMemoryRemote) -> SyncEngine<MemoryStore, InMemoryRemote> {
    open(config(), Arc::new(MemoryStore::new()), remote)
}

/// Every event currently buffered on the receiver.
pub fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Poll `check` every 10ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
