/// Tandem version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum length of an item key, in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Maximum length of a text value, in bytes.
pub const MAX_TEXT_VALUE_LEN: usize = 4096;

/// Capacity of the engine event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Durable namespace holding one record per collection.
pub const COLLECTIONS_NAMESPACE: &str = "collections";

/// Prefix of the per-collection pending operation namespace.
pub const PENDING_OPS_NAMESPACE_PREFIX: &str = "pending_ops";

/// Durable namespace holding the device identity.
pub const DEVICE_NAMESPACE: &str = "device";

/// Record key of the device id inside [`DEVICE_NAMESPACE`].
pub const DEVICE_ID_KEY: &str = "id";

/// Namespace holding the pending operations of one collection.
pub fn pending_ops_namespace(collection_id: &str) -> String {
    format!("{PENDING_OPS_NAMESPACE_PREFIX}/{collection_id}")
}
