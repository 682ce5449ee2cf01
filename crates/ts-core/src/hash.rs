//! 64-bit hashing utilities and the perfect-hash seed finder used to assign
//! 32-bit class ids.

use crate::error::{CoreError, CoreResult};
use crate::rng::XorShiftRng;
use std::collections::BTreeSet;
use xxhash_rust::xxh3::xxh3_64_with_seed;

const MAX_ATTEMPTS: u32 = 64;

/// Hashes `name` under `seed`, folded down to 32 bits. Used both for class
/// ids (over the whole class-name set) and, with a cheap variant, for the
/// tag system's per-class bucket cache.
pub fn hash32(name: &str, seed: u64) -> u32 {
    let full = xxh3_64_with_seed(name.as_bytes(), seed);
    (full ^ (full >> 32)) as u32
}

/// Finds a seed under which [`hash32`] is injective over `names` (a perfect
/// hash for this finite, boot-time-known set). Uses rejection sampling: each
/// candidate seed is validated by inserting every hash into a
/// [`BTreeSet`] and checking no collision occurred. With the class-name set
/// being tiny compared to 2^32, the first or second seed almost always
/// works; giving up after [`MAX_ATTEMPTS`] tries is a fatal condition,
/// signalling a pathological hash collision or a bug in `hash32`.
pub fn find_perfect_seed(names: &[&str]) -> CoreResult<u64> {
    let mut rng = XorShiftRng::new(0xC0FFEE);

    for attempt in 0..MAX_ATTEMPTS {
        let seed = rng.next_u64();
        let mut seen = BTreeSet::new();
        let mut collided = false;
        for name in names {
            if !seen.insert(hash32(name, seed)) {
                collided = true;
                break;
            }
        }
        if !collided {
            return Ok(seed);
        }
        let _ = attempt;
    }

    Err(CoreError::PerfectHashFailed {
        class_count: names.len(),
        attempts: MAX_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash32_is_deterministic() {
        assert_eq!(hash32("Application", 1), hash32("Application", 1));
    }

    #[test]
    fn different_seeds_usually_differ() {
        assert_ne!(hash32("Application", 1), hash32("Application", 2));
    }

    #[test]
    fn perfect_seed_is_injective_over_class_names() {
        let names = ["Application", "Console", "String", "Number", "Boolean", "A", "B", "C"];
        let seed = find_perfect_seed(&names).unwrap();
        let mut seen = std::collections::HashSet::new();
        for name in names {
            assert!(seen.insert(hash32(name, seed)), "collision for {name}");
        }
    }

    #[test]
    fn empty_name_set_trivially_succeeds() {
        assert!(find_perfect_seed(&[]).is_ok());
    }
}
