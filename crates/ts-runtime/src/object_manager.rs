//! Owns every live object, spawns and destroys them, roots the tree, and
//! implements [`VmHost`] so `ts-vm`'s interpreter can reach back into it
//! (§3 `ObjectManager`, §4.6, §4.7).

use std::collections::BinaryHeap;
use std::cmp::Reverse;
use std::rc::Rc;
use std::time::Duration;

use hashbrown::HashMap;
use ts_core::{hash::find_perfect_seed, BoundTagSystem, Handle, ProgramPool, TagSystem, Variable, VmConfig, NULL_HANDLE, ROOT_HANDLE};
use ts_vm::{CallTarget, ExecutionEngine, VmError, VmHost, VmResult};

use crate::clock::Clock;
use crate::error::{RuntimeError, RuntimeResult};
use crate::object::Object;
use crate::sslib;

/// A host-bound native function: `(manager, receiver, args) -> result`.
/// Takes the receiver by value reference rather than a bare handle so
/// primitive receivers (numbers, strings, booleans) can be dispatched
/// through the same registry as object methods (§4.5 primitive dispatch).
pub type NativeFn = Rc<dyn Fn(&mut ObjectManager, &Variable, &[Variable]) -> RuntimeResult<Variable>>;

/// Fixed system classes installed as children of root at launch, in order
/// (§3, §4.7). `Application` is not listed here: it is a user-compiled class,
/// spawned last once every other system object exists.
pub const SYSTEM_CLASSES: &[&str] =
    &["String", "Number", "Boolean", "Temp", "GarbageCollector", "Tags", "Math", "Time", "Date", "Console", "System", "Plugin"];

/// Native value-wrapper classes spawned per literal or per `spawn(...)` call
/// rather than once at launch (§4.9 — `Array`/`Dictionary`). Needs a class id
/// like any other class but is never auto-installed under root.
pub const NATIVE_COLLECTION_CLASSES: &[&str] = &["Array", "Dictionary"];

pub struct ObjectManager {
    objects: HashMap<Handle, Object>,
    free_handles: BinaryHeap<Reverse<Handle>>,
    next_handle: Handle,
    pool: ProgramPool,
    tags: TagSystem,
    class_ids: HashMap<String, u32>,
    system_handles: HashMap<&'static str, Handle>,
    clock: Clock,
    config: VmConfig,
    gc_queue: Vec<Handle>,
    gc_interval: Duration,
    gc_last_run: Duration,
    args: Vec<Variable>,
    natives: HashMap<(String, String, usize), NativeFn>,
    engine: ExecutionEngine,
    stack: ts_core::Stack,
    call_stack: Vec<Handle>,
    exit_requested: bool,
    stdout: Box<dyn std::io::Write>,
}

impl ObjectManager {
    pub fn new(config: VmConfig) -> Self {
        let stack = ts_core::Stack::new(config.stack_size);
        let engine = ExecutionEngine::new(2048);
        let gc_interval = config.gc_interval;
        Self {
            objects: HashMap::new(),
            free_handles: BinaryHeap::new(),
            next_handle: ROOT_HANDLE,
            pool: ProgramPool::new(),
            tags: TagSystem::new(),
            class_ids: HashMap::new(),
            system_handles: HashMap::new(),
            clock: Clock::new(),
            config,
            gc_queue: Vec::new(),
            gc_interval,
            gc_last_run: Duration::ZERO,
            args: Vec::new(),
            natives: HashMap::new(),
            engine,
            stack,
            call_stack: Vec::new(),
            exit_requested: false,
            stdout: Box::new(std::io::stdout()),
        }
    }

    pub fn program_pool(&self) -> &ProgramPool {
        &self.pool
    }

    pub fn program_pool_mut(&mut self) -> &mut ProgramPool {
        &mut self.pool
    }

    pub fn tag_system(&self) -> &TagSystem {
        &self.tags
    }

    pub fn tag_system_mut(&mut self) -> &mut TagSystem {
        &mut self.tags
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn gc_interval(&self) -> Duration {
        self.gc_interval
    }

    /// Rewrites the configured full-collection interval, clamped to
    /// `[0, 20000]` ms to match the `--surgescript-gc-interval` bootstrap
    /// flag (§6, §9 resolved Open Question — this setter is live, not
    /// silently ignored).
    pub fn set_gc_interval_ms_clamped(&mut self, millis: f64) {
        let clamped = millis.clamp(0.0, 20_000.0);
        self.gc_interval = Duration::from_millis(clamped as u64);
    }

    pub fn force_full_collection(&mut self) {
        crate::gc::garbage_collect(self);
        self.gc_last_run = self.clock.elapsed();
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn args(&self) -> &[Variable] {
        &self.args
    }

    pub fn set_args(&mut self, args: Vec<Variable>) {
        self.args = args;
    }

    pub fn root(&self) -> Handle {
        ROOT_HANDLE
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn system_handle(&self, name: &str) -> Option<Handle> {
        self.system_handles.get(name).copied()
    }

    pub fn write_stdout(&mut self, text: &str, newline: bool) {
        use std::io::Write;
        let _ = self.stdout.write_all(text.as_bytes());
        if newline {
            let _ = self.stdout.write_all(b"\n");
        }
        let _ = self.stdout.flush();
    }

    pub fn bind_native(&mut self, class: &str, function: &str, arity: usize, f: NativeFn) {
        self.natives.insert((class.to_string(), function.to_string(), arity), f);
    }

    pub fn get(&self, handle: Handle) -> RuntimeResult<&Object> {
        self.objects.get(&handle).ok_or(RuntimeError::UnknownHandle(handle))
    }

    pub fn get_mut(&mut self, handle: Handle) -> RuntimeResult<&mut Object> {
        self.objects.get_mut(&handle).ok_or(RuntimeError::UnknownHandle(handle))
    }

    pub fn is_alive(&self, handle: Handle) -> bool {
        handle != NULL_HANDLE && self.objects.contains_key(&handle)
    }

    /// Computes a perfect-hash class id over every class name known to the
    /// program pool plus the fixed system classes, then freezes the pool
    /// against new classes (§4.7). Must run once, before spawning anything.
    pub fn freeze_classes(&mut self, plugin_classes: &[&str]) -> RuntimeResult<()> {
        let mut names: Vec<&str> = self.pool.class_names();
        for name in SYSTEM_CLASSES {
            if !names.contains(name) {
                names.push(name);
            }
        }
        for name in NATIVE_COLLECTION_CLASSES {
            if !names.contains(name) {
                names.push(name);
            }
        }
        for name in plugin_classes {
            if !names.contains(name) {
                names.push(name);
            }
        }
        for name in ["Object", "Application"] {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let seed = find_perfect_seed(&names).map_err(|e| RuntimeError::ClassIdAssignment(e.to_string()))?;
        for name in &names {
            let id = ts_core::hash::hash32(name, seed);
            self.class_ids.insert(name.to_string(), id);
        }
        self.pool.freeze();
        Ok(())
    }

    fn class_id_of_name(&self, class: &str) -> RuntimeResult<u32> {
        self.class_ids.get(class).copied().ok_or_else(|| RuntimeError::UnknownClass(class.to_string()))
    }

    fn allocate_handle(&mut self) -> Handle {
        if let Some(Reverse(handle)) = self.free_handles.pop() {
            return handle;
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Spawns a new instance of `class` as a child of `parent`, running its
    /// compiler-synthesized `__ssconstructor` followed by the user
    /// constructor (§4.6). `Application` and the fixed system classes may
    /// only be spawned by the manager itself, via [`spawn_unchecked`](Self::spawn_unchecked)
    /// — spawning them from script is a fatal error.
    pub fn spawn(&mut self, class: &str, parent: Handle) -> RuntimeResult<Handle> {
        if class == "Object" || class == "Application" || SYSTEM_CLASSES.contains(&class) {
            return Err(RuntimeError::CannotSpawnRoot(class.to_string()));
        }
        self.spawn_unchecked(class, parent)
    }

    /// Spawns `class` without the script-visible root/system-class
    /// restriction `spawn` enforces. Used by the embeddable API to install
    /// the root object, system objects, plugins and `Application` at launch.
    /// Passing [`NULL_HANDLE`] as `parent` spawns a root object (its own
    /// parent), which is how the manager creates the single tree root.
    pub(crate) fn spawn_unchecked(&mut self, class: &str, parent: Handle) -> RuntimeResult<Handle> {
        let class_id = self.class_id_of_name(class)?;
        let bound_tags = self.tags.bind(class);
        let handle = self.allocate_handle();
        let mut object = Object::new(handle, if parent == NULL_HANDLE { handle } else { parent }, Rc::from(class), class_id, bound_tags, self.config.heap_ceiling);
        object.state_name = Rc::from("main");
        self.objects.insert(handle, object);
        if parent != NULL_HANDLE {
            if let Some(p) = self.objects.get_mut(&parent) {
                p.children.push(handle);
            }
        }
        if class == "Object" || class == "Application" || SYSTEM_CLASSES.contains(&class) {
            self.system_handles.insert(leak_name(class), handle);
        }

        if self.pool.get(class, "__ssconstructor", 0).is_ok() {
            self.call(handle, "__ssconstructor", &[])?;
        }
        if self.pool.get(class, "constructor", 0).is_ok() {
            self.call(handle, "constructor", &[])?;
        }
        Ok(handle)
    }

    /// Finds the nearest descendant of `from` (inclusive) named `name` by
    /// class, depth-first.
    pub fn find_object(&self, from: Handle, name: &str) -> Option<Handle> {
        let object = self.objects.get(&from)?;
        if object.class_name.as_ref() == name {
            return Some(from);
        }
        for &child in &object.children {
            if let Some(found) = self.find_object(child, name) {
                return Some(found);
            }
        }
        None
    }

    /// Calls `function`/arity directly (used for constructors, destructors
    /// and host-driven state updates, none of which go through the VM's
    /// `CALL` opcode — they are entered straight from Rust).
    pub fn call(&mut self, handle: Handle, function: &str, args: &[Variable]) -> RuntimeResult<Variable> {
        let class_name = self.get(handle)?.class_name.clone();
        let program = self.pool.get(&class_name, function, args.len())?;

        // `ExecutionEngine::run` needs the stack and `self` (as `&mut dyn
        // VmHost`) as two independent mutable borrows; both live on `self`,
        // so each is moved out for the duration of the call and moved back
        // once it returns.
        let mut engine = std::mem::replace(&mut self.engine, ExecutionEngine::new(1));
        let mut stack = std::mem::replace(&mut self.stack, ts_core::Stack::new(self.config.stack_size));

        for arg in args {
            stack.push(arg.clone())?;
        }
        stack.pushenv()?;
        self.call_stack.push(handle);
        let result = engine.run(&program, &mut stack, self, handle);
        self.call_stack.pop();
        stack.popenv()?;
        stack.pop_n(args.len())?;

        self.engine = engine;
        self.stack = stack;
        Ok(result?)
    }

    /// Destroys `handle` and, recursively, every child (§4.6): runs the
    /// optional user destructor, detaches from the parent, then frees the
    /// heap and the handle slot for reuse.
    pub fn destroy(&mut self, handle: Handle) -> RuntimeResult<()> {
        if !self.is_alive(handle) {
            return Ok(());
        }
        let class_name = self.get(handle)?.class_name.clone();
        if self.pool.get(&class_name, "destructor", 0).is_ok() {
            let _ = self.call(handle, "destructor", &[]);
        }

        let (parent, children) = {
            let object = self.get(handle)?;
            (object.parent, object.children.clone())
        };
        for child in children {
            self.destroy(child)?;
        }
        if parent != handle {
            if let Some(p) = self.objects.get_mut(&parent) {
                p.children.retain(|&c| c != handle);
            }
        }
        self.objects.remove(&handle);
        if handle != ROOT_HANDLE {
            self.free_handles.push(Reverse(handle));
        }
        Ok(())
    }

    /// Runs one tick of the driver loop: depth-first traversal from root,
    /// invoking each active, non-killed object's current state (§4.6), then
    /// the GC's incremental step (§4.8), then advances the clock.
    pub fn tick(&mut self, delta: Duration, mut pre_update: impl FnMut(&mut ObjectManager, Handle), mut late_update: impl FnMut(&mut ObjectManager, Handle)) -> RuntimeResult<()> {
        self.clock.advance(delta);
        self.tick_node(self.root(), &mut pre_update, &mut late_update)?;
        crate::gc::garbage_check(self, 64);
        if self.clock.elapsed().saturating_sub(self.gc_last_run) >= self.gc_interval {
            crate::gc::garbage_collect(self);
            self.gc_last_run = self.clock.elapsed();
        }
        Ok(())
    }

    fn tick_node(&mut self, handle: Handle, pre_update: &mut impl FnMut(&mut ObjectManager, Handle), late_update: &mut impl FnMut(&mut ObjectManager, Handle)) -> RuntimeResult<()> {
        if !self.is_alive(handle) {
            return Ok(());
        }
        if self.get(handle)?.killed {
            self.destroy(handle)?;
            return Ok(());
        }

        pre_update(self, handle);
        if !self.is_alive(handle) {
            return Ok(());
        }

        let active = self.get(handle)?.active;
        if active {
            let class_name = self.get(handle)?.class_name.clone();
            let state = self.get(handle)?.state_name.clone();
            let function = format!("state:{state}");
            if self.pool.get(&class_name, &function, 0).is_ok() {
                self.call(handle, &function, &[])?;
            }
            if !self.is_alive(handle) {
                return Ok(());
            }
            late_update(self, handle);
        }

        if !self.is_alive(handle) || !self.get(handle)?.active {
            return Ok(());
        }

        let children = self.get(handle)?.children.clone();
        for child in children {
            self.tick_node(child, pre_update, late_update)?;
        }
        Ok(())
    }

    pub(crate) fn objects(&self) -> &HashMap<Handle, Object> {
        &self.objects
    }

    pub(crate) fn objects_mut(&mut self) -> &mut HashMap<Handle, Object> {
        &mut self.objects
    }

    pub(crate) fn stack(&self) -> &ts_core::Stack {
        &self.stack
    }

    pub(crate) fn stack_mut(&mut self) -> &mut ts_core::Stack {
        &mut self.stack
    }

    pub(crate) fn take_gc_queue(&mut self) -> Vec<Handle> {
        std::mem::take(&mut self.gc_queue)
    }

    pub(crate) fn set_gc_queue(&mut self, queue: Vec<Handle>) {
        self.gc_queue = queue;
    }

    fn dispatch_class_of(&self, receiver: &Variable) -> RuntimeResult<(String, Option<Handle>)> {
        match receiver {
            Variable::Handle(h) if self.is_alive(*h) => Ok((self.get(*h)?.class_name.to_string(), Some(*h))),
            Variable::Handle(_) => Ok(("Object".to_string(), None)),
            Variable::Number(_) | Variable::Raw(_) => Ok(("Number".to_string(), None)),
            Variable::String(_) => Ok(("String".to_string(), None)),
            Variable::Bool(_) => Ok(("Boolean".to_string(), None)),
            Variable::Null => Ok(("Object".to_string(), None)),
        }
    }
}

/// Leaks a short, finite set of static system-class names so the manager can
/// key its `system_handles` map by `&'static str` without per-spawn
/// allocation; bounded by [`SYSTEM_CLASSES`], never called per-tick.
fn leak_name(name: &str) -> &'static str {
    SYSTEM_CLASSES.iter().find(|n| **n == name).copied().unwrap_or_else(|| Box::leak(name.to_string().into_boxed_str()))
}

impl VmHost for ObjectManager {
    fn class_id_of(&self, handle: Handle) -> VmResult<u32> {
        Ok(self.get(handle).map(|o| o.class_id).unwrap_or(0))
    }

    fn class_name_of(&self, handle: Handle) -> VmResult<Rc<str>> {
        Ok(self.get(handle).map(|o| o.class_name.clone()).unwrap_or_else(|_| Rc::from("")))
    }

    fn heap(&self, handle: Handle) -> VmResult<&ts_core::Heap> {
        Ok(&self.get(handle).map_err(to_vm_error)?.heap)
    }

    fn heap_mut(&mut self, handle: Handle) -> VmResult<&mut ts_core::Heap> {
        Ok(&mut self.get_mut(handle).map_err(to_vm_error)?.heap)
    }

    fn current_state(&self, handle: Handle) -> VmResult<Rc<str>> {
        Ok(self.get(handle).map_err(to_vm_error)?.state_name.clone())
    }

    fn set_state(&mut self, handle: Handle, state: Rc<str>) -> VmResult<()> {
        let now = self.clock.elapsed();
        self.get_mut(handle).map_err(to_vm_error)?.set_state(state, now);
        Ok(())
    }

    fn caller_of(&self, _handle: Handle) -> VmResult<Handle> {
        Ok(self.call_stack.iter().rev().nth(1).copied().unwrap_or(NULL_HANDLE))
    }

    fn program_pool(&self) -> &ProgramPool {
        &self.pool
    }

    fn tags_of(&self, handle: Handle) -> VmResult<&BoundTagSystem> {
        Ok(&self.get(handle).map_err(to_vm_error)?.tags)
    }

    fn resolve_call(&mut self, receiver: &Variable, name: &str, args: &[Variable]) -> VmResult<CallTarget> {
        let (class_name, handle_opt) = self.dispatch_class_of(receiver).map_err(to_vm_error)?;

        if self.pool.get(&class_name, name, args.len()).is_ok() {
            let class_id = self.class_id_of_name(&class_name).map_err(to_vm_error)?;
            return Ok(CallTarget::Scripted { class_id });
        }

        if let Some(f) = self.natives.get(&(class_name.clone(), name.to_string(), args.len())).cloned() {
            let result = (*f)(self, receiver, args).map_err(|e| VmError::Host(e.to_string()))?;
            return Ok(CallTarget::Native(result));
        }

        if let Some(result) = sslib::dispatch(self, receiver, &class_name, name, args).map_err(|e| VmError::Host(e.to_string()))? {
            return Ok(CallTarget::Native(result));
        }

        Err(VmError::UnresolvedFunction { name: name.to_string(), arity: args.len(), handle: handle_opt.unwrap_or(NULL_HANDLE) })
    }
}

fn to_vm_error(e: RuntimeError) -> VmError {
    VmError::Host(e.to_string())
}
