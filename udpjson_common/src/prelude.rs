//! Prelude module for common re-exports.
//!
//! ```rust
//! use udpjson_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig, Validate};

// ─── Defaults ───────────────────────────────────────────────────────
pub use crate::consts::{
    DEFAULT_CACHE_TTL_MS, DEFAULT_MAX_CACHE_SIZE, POLL_INTERVAL_MS, RECV_BUFFER_SIZE,
    UNTRACKED_OBJECT_ID,
};

// ─── C-UAV Protocol ─────────────────────────────────────────────────
pub use crate::cuav::{
    CommonHeader, CuavMessageId, EoSystemParams, GuidanceInfo, MessageType, ServoControl,
    TargetCategory,
};

// ─── Object Metadata ────────────────────────────────────────────────
pub use crate::meta::ObjectUserMeta;
