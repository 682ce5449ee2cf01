//! Runtime-wide tunables.
//!
//! Mirrors the reference implementation's handful of boot-time constants
//! (heap ceiling, stack size, GC interval) as a single overridable struct
//! instead of scattered `#define`s.

use std::time::Duration;

/// Tunables that affect heap growth, stack size and GC pacing.
///
/// The CLI front end overlays command-line flags (and an optional TOML file)
/// on top of [`VmConfig::default`]; library callers construct one directly.
#[derive(Debug, Clone, PartialEq)]
pub struct VmConfig {
    /// Upper bound on the number of slots any single object heap may grow to.
    pub heap_ceiling: usize,
    /// Upper bound on the shared call stack, in variable-sized cells.
    pub stack_size: usize,
    /// Wall-clock interval between full garbage-collection sweeps.
    pub gc_interval: Duration,
    /// Soft cap on the number of live objects; `usize::MAX` means unbounded.
    pub max_objects: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            heap_ceiling: 10 * 1024 * 1024,
            stack_size: 65536,
            gc_interval: Duration::from_secs(1),
            max_objects: usize::MAX,
        }
    }
}

impl VmConfig {
    /// Clamps a `--surgescript-gc-interval <milliseconds>`-style override into
    /// the documented `[0, 20000]` range and applies it.
    pub fn with_gc_interval_ms_clamped(mut self, millis: u64) -> Self {
        let clamped = millis.min(20_000);
        self.gc_interval = Duration::from_millis(clamped);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = VmConfig::default();
        assert_eq!(cfg.heap_ceiling, 10 * 1024 * 1024);
        assert_eq!(cfg.stack_size, 65536);
        assert_eq!(cfg.gc_interval, Duration::from_secs(1));
    }

    #[test]
    fn gc_interval_is_clamped() {
        let cfg = VmConfig::default().with_gc_interval_ms_clamped(999_999);
        assert_eq!(cfg.gc_interval, Duration::from_millis(20_000));
    }
}
