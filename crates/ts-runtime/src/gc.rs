//! Two-phase incremental mark-and-sweep garbage collector (§4.8).
//!
//! `garbage_check` is the cheap, per-tick incremental step: it drains a
//! bounded number of queued objects, scanning each one's heap (and, for the
//! very first objects marked each cycle, the shared stack) for embedded
//! handles and marking whatever they reference reachable. `garbage_collect`
//! is the expensive full sweep: anything left unmarked at that point is
//! destroyed, and the cycle restarts by re-seeding the queue from root plus
//! every handle currently live on the stack.

use std::collections::HashSet;

use ts_core::{Handle, Variable, ROOT_HANDLE};

use crate::object_manager::ObjectManager;

/// Marks `handle` reachable and enqueues it for heap scanning, unless it was
/// already marked this cycle.
fn mark(manager: &mut ObjectManager, handle: Handle, queue: &mut Vec<Handle>) {
    if !manager.is_alive(handle) {
        return;
    }
    let already_marked = manager.objects().get(&handle).map(|o| o.reachable).unwrap_or(true);
    if already_marked {
        return;
    }
    if let Some(object) = manager.objects_mut().get_mut(&handle) {
        object.reachable = true;
    }
    queue.push(handle);
}

/// Seeds a fresh mark cycle: root and every handle currently held on the
/// shared call stack are reachable a priori (§4.8 invariant — GC never
/// deletes an object whose handle is reachable from root or live on the
/// stack).
fn seed_cycle(manager: &mut ObjectManager) -> Vec<Handle> {
    for object in manager.objects_mut().values_mut() {
        object.reachable = false;
    }
    let mut queue = Vec::new();
    mark(manager, ROOT_HANDLE, &mut queue);
    let stack_handles: Vec<Handle> = scan_stack_handles(manager);
    for handle in stack_handles {
        mark(manager, handle, &mut queue);
    }
    queue
}

fn scan_stack_handles(manager: &ObjectManager) -> Vec<Handle> {
    // The `Stack` type has no public iterator over live cells beyond
    // `speek`/`sp`; conservatively walk every occupied cell by offset from
    // the bottom of the stack using `sp()` as the bound. `bp` starts at 0 so
    // offsets are taken relative to it, which is always a valid frame.
    let stack = manager.stack();
    let mut handles = Vec::new();
    for address in 0..stack.sp() {
        let offset = address as i64 - stack.bp() as i64;
        if let Ok(Variable::Handle(h)) = stack.speek(offset) {
            handles.push(*h);
        }
    }
    handles
}

/// Drains up to `budget` queued objects, scanning each one's heap and child
/// list for handles and transitively marking whatever they reference. Tree
/// membership is itself a live reference (§3's "a child's parent equals the
/// owner's handle" invariant means the tree, not just heap slots, keeps an
/// object alive); the heap scan additionally catches handles stashed in
/// fields that point outside the owner's own subtree. Restarts the mark
/// cycle if the queue is empty and nothing is in flight (the very first call
/// after boot, or after a previous full sweep).
pub(crate) fn garbage_check(manager: &mut ObjectManager, budget: usize) {
    let mut queue = seed_cycle_if_needed(manager);

    let mut scanned = 0;
    while scanned < budget {
        let Some(handle) = queue.pop() else { break };
        scanned += 1;
        if !manager.is_alive(handle) {
            continue;
        }
        let referenced: Vec<Handle> = manager
            .objects()
            .get(&handle)
            .map(|o| {
                o.children
                    .iter()
                    .copied()
                    .chain(o.heap.iter_live().filter_map(|(_, v)| v.as_handle()))
                    .collect()
            })
            .unwrap_or_default();
        for child in referenced {
            mark(manager, child, &mut queue);
        }
    }

    manager.set_gc_queue(queue);
}

fn seed_cycle_if_needed(manager: &mut ObjectManager) -> Vec<Handle> {
    let existing = manager.take_gc_queue();
    if existing.is_empty() {
        seed_cycle(manager)
    } else {
        existing
    }
}

/// Full sweep: every object whose `reachable` bit is still clear is
/// destroyed, processed in reverse-handle order so a parent's subtree
/// doesn't get torn down out from under an in-progress child destruction.
/// Afterwards, any surviving object (or the shared stack) still holding a
/// handle into the swept set gets that slot nulled in place rather than left
/// dangling — handles are recycled by the next `spawn`, so a stale reference
/// left untouched would silently start pointing at an unrelated new object
/// (§4.8 invariant: broken handles found during scanning are nulled, not
/// revived).
pub(crate) fn garbage_collect(manager: &mut ObjectManager) {
    let dead: HashSet<Handle> = manager
        .objects()
        .values()
        .filter(|o| !o.reachable && o.handle != ROOT_HANDLE)
        .map(|o| o.handle)
        .collect();

    let mut order: Vec<Handle> = dead.iter().copied().collect();
    order.sort_unstable_by(|a, b| b.cmp(a));
    for handle in order {
        if manager.is_alive(handle) {
            let _ = manager.destroy(handle);
        }
    }

    null_broken_handles(manager);
    manager.set_gc_queue(Vec::new());
}

/// Nulls any embedded handle that no longer points at a live object —
/// whether it died in the sweep just above or via an explicit `destroy()`
/// call made since the last full collection. Checking against current
/// liveness rather than only this cycle's dead set catches both.
fn null_broken_handles(manager: &mut ObjectManager) {
    let survivors: Vec<Handle> = manager.objects().keys().copied().collect();
    for handle in survivors {
        let stale: Vec<usize> = match manager.objects().get(&handle) {
            Some(object) => object
                .heap
                .iter_live()
                .filter_map(|(addr, v)| v.as_handle().filter(|h| !manager.is_alive(*h)).map(|_| addr))
                .collect(),
            None => continue,
        };
        if let Some(object) = manager.objects_mut().get_mut(&handle) {
            for addr in stale {
                let _ = object.heap.set(addr, Variable::null());
            }
        }
    }

    let stack = manager.stack();
    let stale_stack_offsets: Vec<i64> = (0..stack.sp())
        .filter_map(|address| {
            let offset = address as i64 - stack.bp() as i64;
            match stack.speek(offset) {
                Ok(Variable::Handle(h)) if !manager.is_alive(*h) => Some(offset),
                _ => None,
            }
        })
        .collect();
    let stack = manager.stack_mut();
    for offset in stale_stack_offsets {
        let _ = stack.spoke(offset, Variable::null());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_core::VmConfig;

    fn setup() -> ObjectManager {
        let mut manager = ObjectManager::new(VmConfig::default());
        manager.freeze_classes(&["Holder", "Orphan"]).unwrap();
        manager.spawn_unchecked("Holder", ts_core::NULL_HANDLE).unwrap();
        manager
    }

    #[test]
    fn unreferenced_object_is_swept() {
        let mut manager = setup();
        let holder = manager.root();
        let orphan = manager.spawn_unchecked("Orphan", holder).unwrap();
        manager.destroy(orphan).unwrap();
        assert!(!manager.is_alive(orphan));
    }

    #[test]
    fn heap_referenced_object_survives_a_sweep() {
        let mut manager = setup();
        let holder = manager.root();
        let referenced = manager.spawn_unchecked("Orphan", holder).unwrap();
        let address = manager.get_mut(referenced).unwrap().heap.alloc().unwrap();
        manager.get_mut(referenced).unwrap().heap.set(address, Variable::Handle(referenced)).unwrap();

        garbage_check(&mut manager, 64);
        garbage_collect(&mut manager);
        assert!(manager.is_alive(referenced));
    }

    /// A plain tree child, with no handle stored anywhere on a heap, still
    /// survives a sweep as long as it is attached under root — tree
    /// membership alone is a reachability edge, matching every
    /// `spawn("X");` call whose return value a script never assigns.
    #[test]
    fn child_with_no_heap_reference_survives_a_sweep() {
        let mut manager = setup();
        let holder = manager.root();
        let child = manager.spawn_unchecked("Orphan", holder).unwrap();

        garbage_check(&mut manager, 64);
        garbage_collect(&mut manager);
        assert!(manager.is_alive(child));
    }

    #[test]
    fn stale_heap_handle_to_an_explicitly_destroyed_object_is_nulled_at_the_next_sweep() {
        let mut manager = setup();
        let holder = manager.root();
        let destroyed = manager.spawn_unchecked("Orphan", holder).unwrap();
        let keeper = manager.spawn_unchecked("Orphan", holder).unwrap();

        let address = manager.get_mut(keeper).unwrap().heap.alloc().unwrap();
        manager.get_mut(keeper).unwrap().heap.set(address, Variable::Handle(destroyed)).unwrap();
        manager.destroy(destroyed).unwrap();

        garbage_check(&mut manager, 64);
        garbage_collect(&mut manager);

        assert!(manager.is_alive(keeper));
        assert_eq!(manager.get(keeper).unwrap().heap.get(address).unwrap().as_handle(), None);
    }
}
