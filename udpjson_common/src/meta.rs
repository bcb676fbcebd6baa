//! Metadata attached to tracked objects.

use serde::{Deserialize, Serialize};

/// Value attached to one tracked object by the enrichment pass.
///
/// Owned independently of the cache entry it was copied from: cloning is the
/// copy hook and dropping is the release hook, so the host pipeline may keep
/// it for as long as its own metadata lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectUserMeta {
    /// Name of the value (the configured metadata key).
    pub key: String,
    /// Canonical string form of the received value.
    pub value: String,
    /// Receipt time of the value, microseconds on the process monotonic clock.
    pub recv_ts_us: u64,
}
