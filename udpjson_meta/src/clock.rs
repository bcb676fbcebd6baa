//! Process-wide monotonic clock.
//!
//! Cache ages are computed on `Instant`s directly. Timestamps that leave the
//! crate (header receipt time, attached metadata) are rendered as
//! microseconds since a fixed process epoch so they stay comparable.

use std::sync::LazyLock;
use std::time::Instant;

static EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Microseconds between the process epoch and `at`.
///
/// Instants taken before the epoch was first touched render as 0.
pub fn monotonic_us(at: Instant) -> u64 {
    u64::try_from(at.saturating_duration_since(*EPOCH).as_micros()).unwrap_or(u64::MAX)
}

/// Current monotonic time in microseconds.
pub fn now_us() -> u64 {
    monotonic_us(Instant::now())
}
