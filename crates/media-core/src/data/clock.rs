//! Monotonic microsecond clock used for gap detection

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Microseconds since the first call in this process.
///
/// Never returns 0, which consumers use to mean "no buffer seen yet".
pub fn now_usec() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_micros() as u64 + 1
}
