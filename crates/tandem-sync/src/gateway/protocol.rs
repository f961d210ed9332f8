//! Versioned wire protocol for the HTTP gateway: JSON envelopes with
//! forward compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tandem_core::models::{Batch, RemoteDocument};

/// Current protocol version.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Envelope for all requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest<T> {
    /// Protocol version for forward compatibility.
    pub version: String,
    /// Unique request ID for tracing.
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    /// Device issuing the request. Becomes `last_writer_id` on commit.
    pub device_id: String,
    pub payload: T,
}

/// Envelope for all responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse<T> {
    pub version: String,
    /// Echoed request ID.
    pub request_id: String,
    pub success: bool,
    /// Error message if `success` is false.
    pub error: Option<String>,
    pub data: Option<T>,
}

/// Body of a commit request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitPayload {
    pub collection_id: String,
    pub batch: Batch,
}

/// Body of a long-poll response: the document if it moved past `after`
/// before the wait ran out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesPayload {
    pub document: Option<RemoteDocument>,
}

impl<T> SyncRequest<T> {
    pub fn new(device_id: impl Into<String>, payload: T) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            device_id: device_id.into(),
            payload,
        }
    }
}

impl<T> SyncResponse<T> {
    pub fn ok(request_id: String, data: T) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            request_id,
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn err(request_id: String, error: String) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            request_id,
            success: false,
            error: Some(error),
            data: None,
        }
    }

    /// The payload of a successful response.
    pub fn into_data(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err("response carried no data".to_string()),
            (false, _) => Err(self.error.unwrap_or_else(|| "unspecified error".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_envelope_carries_version_and_device() {
        let request = SyncRequest::new("phone", 7u32);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["version"], PROTOCOL_VERSION);
        assert_eq!(json["device_id"], "phone");
        assert_eq!(json["payload"], 7);
    }

    #[test]
    fn error_response_surfaces_message() {
        let response: SyncResponse<u32> = SyncResponse::err("r1".into(), "stale".into());
        assert_eq!(response.into_data(), Err("stale".to_string()));
        assert_eq!(SyncResponse::ok("r2".into(), 3u32).into_data(), Ok(3));
    }
}
