//! System-wide constants for the udpjson workspace.
//!
//! Single source of truth for defaults and limits. Configuration structs
//! refer to these instead of repeating literals.

use std::net::Ipv4Addr;

/// Default service name written into logs and thread names.
pub const DEFAULT_SERVICE_NAME: &str = "udpjson-meta";

/// Default multicast group for the generic keyed-value feed.
pub const DEFAULT_MULTICAST_IP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

/// Default UDP port for the generic keyed-value feed.
pub const DEFAULT_PORT: u16 = 6000;

/// Default multicast group for the C-UAV feed.
pub const DEFAULT_CUAV_MULTICAST_IP: Ipv4Addr = Ipv4Addr::new(230, 1, 88, 51);

/// Default UDP port for the C-UAV feed.
pub const DEFAULT_CUAV_PORT: u16 = 8003;

/// Default JSON member holding the tracked object id.
pub const DEFAULT_OBJECT_ID_KEY: &str = "object_id";

/// Default JSON member holding the source (camera stream) id.
pub const DEFAULT_SOURCE_ID_KEY: &str = "source_id";

/// Default JSON member holding the value to attach.
pub const DEFAULT_VALUE_KEY: &str = "value";

/// Default cache time-to-live in milliseconds (0 disables expiry).
pub const DEFAULT_CACHE_TTL_MS: u64 = 1000;

/// Default maximum cache cardinality (0 means unbounded).
pub const DEFAULT_MAX_CACHE_SIZE: usize = 2048;

/// Default bound on shared-lock acquisition for one frame, in milliseconds.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5;

/// Receive loop readiness wait in milliseconds.
pub const POLL_INTERVAL_MS: u16 = 100;

/// Largest datagram read per readiness event.
pub const RECV_BUFFER_SIZE: usize = 8192;

/// Object id reserved for objects without a stable tracker identity.
pub const UNTRACKED_OBJECT_ID: u64 = u64::MAX;

/// Longest interface name accepted by `SO_BINDTODEVICE` (IFNAMSIZ - 1).
pub const MAX_IFACE_NAME_LEN: usize = 15;
