//! Class ↔ tag associations, plus a per-class bound view optimized for
//! constant-time `has_tag` queries.

use crate::error::{CoreError, CoreResult};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;

const BUCKET_COUNT: usize = 64;

/// The two-way class/tag map. Additions are only expected before objects of
/// the affected class are spawned (§5); reads are unrestricted at any time.
#[derive(Default)]
pub struct TagSystem {
    class_to_tags: HashMap<String, HashSet<Rc<str>>>,
    tag_to_classes: HashMap<Rc<str>, HashSet<String>>,
}

impl TagSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `tag` with `class`. Fails if `tag` is empty.
    pub fn add_tag(&mut self, class: &str, tag: &str) -> CoreResult<()> {
        if tag.is_empty() {
            return Err(CoreError::InvalidTag { name: tag.to_string() });
        }
        let tag_rc: Rc<str> = Rc::from(tag);
        self.class_to_tags
            .entry(class.to_string())
            .or_default()
            .insert(Rc::clone(&tag_rc));
        self.tag_to_classes
            .entry(tag_rc)
            .or_default()
            .insert(class.to_string());
        Ok(())
    }

    /// Direct table lookup, bypassing any bound cache. The reference
    /// implementation against which [`BoundTagSystem`] is checked for
    /// equivalence.
    pub fn has_tag(&self, class: &str, tag: &str) -> bool {
        self.class_to_tags
            .get(class)
            .map(|tags| tags.iter().any(|t| t.as_ref() == tag))
            .unwrap_or(false)
    }

    pub fn tags_of(&self, class: &str) -> Vec<Rc<str>> {
        self.class_to_tags
            .get(class)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn classes_with_tag(&self, tag: &str) -> Vec<String> {
        self.tag_to_classes
            .get(tag)
            .map(|classes| classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Builds the bound, bucketed cache for `class`'s current tag set.
    pub fn bind(&self, class: &str) -> BoundTagSystem {
        BoundTagSystem::build(self.tags_of(class))
    }
}

/// A per-class cache of its tag set, bucketed by a cheap hash of a tag's
/// first few characters with a 64-bit presence bitmask guarding each bucket.
/// `has_tag` usually resolves in one bitmask test (a miss needs no further
/// work); a bitmask hit falls through to one lookup in that bucket's set.
#[derive(Debug, Clone)]
pub struct BoundTagSystem {
    bitmask: u64,
    buckets: Vec<Vec<Rc<str>>>,
}

impl Default for BoundTagSystem {
    fn default() -> Self {
        Self {
            bitmask: 0,
            buckets: vec![Vec::new(); BUCKET_COUNT],
        }
    }
}

impl BoundTagSystem {
    fn build(tags: Vec<Rc<str>>) -> Self {
        let mut bound = Self::default();
        for tag in tags {
            let bucket = bucket_of(&tag);
            bound.bitmask |= 1u64 << bucket;
            bound.buckets[bucket].push(tag);
        }
        bound
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let bucket = bucket_of(tag);
        if self.bitmask & (1u64 << bucket) == 0 {
            return false;
        }
        self.buckets[bucket].iter().any(|t| t.as_ref() == tag)
    }
}

/// Cheap hash of a tag's first few characters into `[0, BUCKET_COUNT)`.
/// Deliberately not cryptographic or even high-quality: it only needs to
/// spread typical tag names across buckets well enough that the bitmask
/// check rejects most non-matches.
fn bucket_of(tag: &str) -> usize {
    let mut acc: u32 = 0;
    for byte in tag.as_bytes().iter().take(4) {
        acc = acc.wrapping_mul(31).wrapping_add(*byte as u32);
    }
    (acc as usize) % BUCKET_COUNT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_tag_rejects_empty_names() {
        let mut tags = TagSystem::new();
        assert!(matches!(tags.add_tag("A", ""), Err(CoreError::InvalidTag { .. })));
    }

    #[test]
    fn direct_lookup_reflects_additions() {
        let mut tags = TagSystem::new();
        tags.add_tag("Enemy", "hostile").unwrap();
        assert!(tags.has_tag("Enemy", "hostile"));
        assert!(!tags.has_tag("Enemy", "friendly"));
        assert!(!tags.has_tag("Player", "hostile"));
    }

    #[test]
    fn bound_view_matches_direct_lookup_for_every_pair() {
        let mut tags = TagSystem::new();
        for (class, class_tags) in [
            ("Enemy", vec!["hostile", "renderable", "collidable"]),
            ("Player", vec!["renderable", "controllable"]),
            ("Trigger", vec![]),
        ] {
            for tag in class_tags {
                tags.add_tag(class, tag).unwrap();
            }
        }

        let classes = ["Enemy", "Player", "Trigger", "Unknown"];
        let candidate_tags = ["hostile", "renderable", "collidable", "controllable", "missing", ""];

        for class in classes {
            let bound = tags.bind(class);
            for tag in candidate_tags {
                if tag.is_empty() {
                    continue;
                }
                assert_eq!(
                    bound.has_tag(tag),
                    tags.has_tag(class, tag),
                    "mismatch for ({class}, {tag})"
                );
            }
        }
    }

    #[test]
    fn classes_with_tag_is_the_inverse_map() {
        let mut tags = TagSystem::new();
        tags.add_tag("A", "shared").unwrap();
        tags.add_tag("B", "shared").unwrap();
        let mut classes = tags.classes_with_tag("shared");
        classes.sort();
        assert_eq!(classes, vec!["A".to_string(), "B".to_string()]);
    }
}
