//! HTTP gateway over reqwest, with a long-poll change feed.
//!
//! Endpoints, relative to `base_url`:
//! - `POST /v1/collections/{id}/commit` with `SyncRequest<CommitPayload>`
//! - `GET  /v1/collections/{id}` returning `SyncResponse<RemoteDocument>`
//! - `GET  /v1/collections/{id}/changes?after={revision}&wait_ms={ms}`
//!   returning `SyncResponse<ChangesPayload>`

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use tandem_core::constants::EVENT_CHANNEL_CAPACITY;
use tandem_core::errors::{SyncError, TandemError, TandemResult};
use tandem_core::models::{Batch, RemoteDocument};

use super::protocol::{ChangesPayload, CommitPayload, SyncRequest, SyncResponse};
use super::{ChangeFeed, CommitReceipt, IRemoteGateway};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Base URL of the sync API, without a trailing slash.
    pub base_url: String,
    pub collection_id: String,
    /// Per-request timeout. Long-poll requests add `poll_wait` on top.
    pub timeout: Duration,
    /// How long the server may hold a long-poll request.
    pub poll_wait: Duration,
    /// Pause after a failed long-poll before trying again.
    pub poll_retry: Duration,
    pub bearer_token: Option<String>,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            collection_id: tandem_core::config::defaults::DEFAULT_COLLECTION_ID.to_string(),
            timeout: Duration::from_secs(10),
            poll_wait: Duration::from_secs(25),
            poll_retry: Duration::from_secs(2),
            bearer_token: None,
        }
    }
}

/// Convert a string into a `SyncError::TransientNetwork`.
fn net_err(reason: String) -> TandemError {
    SyncError::network(reason).into()
}

/// Remote gateway speaking the JSON protocol over HTTP.
#[derive(Debug)]
pub struct HttpGateway {
    client: reqwest::Client,
    config: Arc<HttpGatewayConfig>,
    feed: broadcast::Sender<RemoteDocument>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> TandemResult<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .build()
            .map_err(|e| net_err(e.to_string()))?;
        let (feed, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            client,
            config: Arc::new(config),
            feed,
            poller: Mutex::new(None),
        })
    }

    fn collection_url(config: &HttpGatewayConfig) -> String {
        format!("{}/v1/collections/{}", config.base_url, config.collection_id)
    }

    fn authorize(
        config: &HttpGatewayConfig,
        request: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        match &config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and unwrap the response envelope.
    async fn execute<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> TandemResult<T> {
        let response = request.send().await.map_err(|e| net_err(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::conflict(format!("HTTP {status}: {body}")).into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(net_err(format!("HTTP {status}: {body}")));
        }
        let envelope: SyncResponse<T> = response
            .json()
            .await
            .map_err(|e| net_err(format!("deserialization failed: {e}")))?;
        envelope.into_data().map_err(net_err)
    }

    /// Long-poll loop feeding the broadcast channel. Exits once every
    /// `ChangeFeed` has been dropped.
    async fn poll_changes(
        client: reqwest::Client,
        config: Arc<HttpGatewayConfig>,
        feed: broadcast::Sender<RemoteDocument>,
    ) {
        let url = format!("{}/changes", Self::collection_url(&config));
        let mut after = 0u64;
        while feed.receiver_count() > 0 {
            let request = Self::authorize(
                &config,
                client
                    .get(&url)
                    .query(&[
                        ("after", after.to_string()),
                        ("wait_ms", config.poll_wait.as_millis().to_string()),
                    ])
                    .timeout(config.timeout + config.poll_wait),
            );
            match Self::execute::<ChangesPayload>(request).await {
                Ok(ChangesPayload {
                    document: Some(document),
                }) => {
                    after = after.max(document.revision);
                    let _ = feed.send(document);
                }
                Ok(ChangesPayload { document: None }) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "change poll failed");
                    tokio::time::sleep(config.poll_retry).await;
                }
            }
        }
        tracing::debug!("change feed has no subscribers, stopping poller");
    }
}

impl IRemoteGateway for HttpGateway {
    async fn commit_batch(&self, device_id: &str, batch: &Batch) -> TandemResult<CommitReceipt> {
        let body = SyncRequest::new(
            device_id,
            CommitPayload {
                collection_id: self.config.collection_id.clone(),
                batch: batch.clone(),
            },
        );
        let url = format!("{}/commit", Self::collection_url(&self.config));
        let request = Self::authorize(
            &self.config,
            self.client.post(url).json(&body).timeout(self.config.timeout),
        );
        Self::execute(request).await
    }

    async fn fetch_document(&self) -> TandemResult<RemoteDocument> {
        let request = Self::authorize(
            &self.config,
            self.client
                .get(Self::collection_url(&self.config))
                .timeout(self.config.timeout),
        );
        Self::execute(request).await
    }

    fn subscribe(&self) -> TandemResult<ChangeFeed> {
        let feed = ChangeFeed::new(self.feed.subscribe());
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        let running = poller.as_ref().is_some_and(|task| !task.is_finished());
        if !running {
            let handle = tokio::runtime::Handle::try_current()
                .map_err(|e| net_err(format!("change feed needs a tokio runtime: {e}")))?;
            *poller = Some(handle.spawn(Self::poll_changes(
                self.client.clone(),
                Arc::clone(&self.config),
                self.feed.clone(),
            )));
        }
        Ok(feed)
    }
}

impl Drop for HttpGateway {
    fn drop(&mut self) {
        let poller = self.poller.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = poller.take() {
            task.abort();
        }
    }
}
