#![cfg(feature = "http")]

use std::time::Duration;

use tandem_core::errors::SyncError;
use tandem_core::models::{Batch, ItemKey, Mutation, PendingOperation};
use tandem_sync::gateway::{HttpGateway, HttpGatewayConfig};
use tandem_sync::IRemoteGateway;

fn unreachable_gateway() -> HttpGateway {
    HttpGateway::new(HttpGatewayConfig {
        // Port 9 (discard) on loopback: nothing listens in test environments.
        base_url: "http://127.0.0.1:9".to_string(),
        timeout: Duration::from_millis(500),
        ..HttpGatewayConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn unreachable_server_is_a_transient_failure() {
    let gateway = unreachable_gateway();

    let err = gateway.fetch_document().await.unwrap_err();
    assert!(matches!(
        err.as_sync_error(),
        Some(SyncError::TransientNetwork { .. })
    ));

    let op = PendingOperation::new(ItemKey::new("tent").unwrap(), Mutation::Delete);
    let err = gateway
        .commit_batch("device-a", &Batch::single(op))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn subscribe_starts_a_poller_inside_a_runtime() {
    let gateway = unreachable_gateway();
    let feed = gateway.subscribe().unwrap();
    drop(feed);
}
