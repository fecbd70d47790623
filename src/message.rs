//! Sync message and its wire representation
//!
//! ```text
//! { "kind": "storage-update" | "data-refresh" | "force-sync", "key"?: string, "timestamp": number }
//! ```
//!
//! On the inter-context channel every message travels inside an [`Envelope`]
//! that records which port posted it, so a port can skip its own posts.

use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Opaque identifier of a logical data partition.
pub type WatchKey = String;

/// The watch key that matches every partition.
pub const WILDCARD: &str = "*";

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncKind {
    /// A key in the shared store was written
    StorageUpdate,
    /// Periodic full refresh from the ticker
    DataRefresh,
    /// Manual refresh requested by a consumer
    ForceSync,
}

/// A change notification. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub kind: SyncKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<WatchKey>,
    /// Milliseconds since the unix epoch, assigned at broadcast time
    pub timestamp: u64,
}

impl SyncMessage {
    pub fn new(
        kind: SyncKind,
        key: Option<WatchKey>,
        timestamp: u64,
    ) -> Self {
        Self { kind, key, timestamp }
    }

    /// The watch key whose subscribers (besides the wildcard ones) must hear
    /// about this message. `None` means wildcard subscribers only.
    pub fn target(&self) -> Option<&str> {
        match self.kind {
            SyncKind::DataRefresh => None,
            SyncKind::StorageUpdate | SyncKind::ForceSync => self.key.as_deref(),
        }
    }
}

/// Frame carried on the inter-context channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Id of the port that posted the message
    pub origin: u64,
    pub message: SyncMessage,
}

impl Envelope {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(frame: &str) -> Result<Self> {
        Ok(serde_json::from_str(frame)?)
    }
}
