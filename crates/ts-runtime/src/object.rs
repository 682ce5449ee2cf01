//! A single node of the live object tree: class identity, heap, tree links
//! and state-machine bookkeeping (§3 `Object`).

use std::rc::Rc;
use std::time::Duration;

use ts_core::{BoundTagSystem, Handle, Heap};

/// Optional local 2-D transform every object may carry. The core only stores
/// it as plain data — transform math beyond this is out of scope (§1).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform2D {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

#[derive(Debug)]
pub struct Object {
    pub handle: Handle,
    pub class_name: Rc<str>,
    pub class_id: u32,
    pub parent: Handle,
    pub children: Vec<Handle>,
    pub heap: Heap,
    pub state_name: Rc<str>,
    pub active: bool,
    pub killed: bool,
    /// Cleared at the start of every GC cycle, set by the mark phase.
    pub reachable: bool,
    pub transform: Option<Transform2D>,
    pub tags: BoundTagSystem,
    /// Clock time at which the current state was entered; state-elapsed time
    /// for `timeout(seconds)` is `clock.elapsed() - state_entered_at`.
    pub state_entered_at: Duration,
    pub user_data: Option<Box<dyn std::any::Any>>,
}

impl Object {
    pub fn new(handle: Handle, parent: Handle, class_name: Rc<str>, class_id: u32, tags: BoundTagSystem, heap_ceiling: usize) -> Self {
        Self {
            handle,
            class_name,
            class_id,
            parent,
            children: Vec::new(),
            heap: Heap::new(heap_ceiling),
            state_name: Rc::from("main"),
            active: true,
            killed: false,
            reachable: false,
            transform: None,
            tags,
            state_entered_at: Duration::ZERO,
            user_data: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent == self.handle
    }

    pub fn set_state(&mut self, name: Rc<str>, now: Duration) {
        self.state_name = name;
        self.state_entered_at = now;
    }

    pub fn state_elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.state_entered_at)
    }
}
