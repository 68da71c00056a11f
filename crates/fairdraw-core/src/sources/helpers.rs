//! Shared helpers for source implementations.

use std::sync::OnceLock;
use std::time::Instant;

/// High-resolution timestamp in nanoseconds, relative to a process-local
/// epoch taken on first use.
pub(crate) fn nanos() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_monotonic() {
        let a = nanos();
        let b = nanos();
        assert!(b >= a);
    }
}
