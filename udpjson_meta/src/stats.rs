//! Per-channel ingestion counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by one receive loop and read by anyone.
#[derive(Debug, Default)]
pub struct ChannelStats {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`ChannelStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Datagrams read from the socket.
    pub datagrams: u64,
    /// Payload bytes read from the socket.
    pub bytes: u64,
    /// Messages decoded and applied.
    pub accepted: u64,
    /// Messages dropped as malformed or irrelevant.
    pub dropped: u64,
}

impl ChannelStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one received datagram of `len` bytes.
    pub fn record_datagram(&self, len: usize) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Count one decoded message.
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one dropped message.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "datagrams={} bytes={} accepted={} dropped={}",
            self.datagrams, self.bytes, self.accepted, self.dropped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ChannelStats::new();
        stats.record_datagram(10);
        stats.record_datagram(32);
        stats.record_accepted();
        stats.record_dropped();

        let snap = stats.snapshot();
        assert_eq!(
            snap,
            StatsSnapshot {
                datagrams: 2,
                bytes: 42,
                accepted: 1,
                dropped: 1,
            }
        );
        assert_eq!(snap.to_string(), "datagrams=2 bytes=42 accepted=1 dropped=1");
    }
}
