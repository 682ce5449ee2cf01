//! Embeddable top-level API (§6): compile source, install plugins, launch
//! the object tree, and drive it one tick at a time.

use std::path::Path;
use std::time::Duration;

use ts_core::{Handle, StringPool, TagSystem, Variable, VmConfig};
use ts_compiler::{compile_source, DuplicatePolicy};

use crate::error::{RuntimeResult, ScriptResult};
use crate::object_manager::{NativeFn, ObjectManager, SYSTEM_CLASSES};

/// Owns the program pool (through [`ObjectManager`]), the string pool, and
/// the set of plugin classes discovered across every compiled source unit.
/// A single `Vm` compiles zero or more sources, then launches exactly once.
pub struct Vm {
    manager: ObjectManager,
    strings: StringPool,
    plugin_classes: Vec<String>,
    launched: bool,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Self { manager: ObjectManager::new(config), strings: StringPool::new(), plugin_classes: Vec::new(), launched: false }
    }

    /// Compiles a source file into the shared program pool. May be called
    /// repeatedly before [`launch`](Self::launch); every compiled class is
    /// pooled together.
    pub fn compile_file(&mut self, path: &Path) -> ScriptResult<()> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            crate::error::RuntimeError::Native {
                class: "Vm".to_string(),
                function: "compile_file".to_string(),
                arity: 1,
                reason: format!("{}: {e}", path.display()),
            }
        })?;
        let file = path.display().to_string();
        self.compile_str(&source, &file)
    }

    pub fn compile_str(&mut self, source: &str, file: &str) -> ScriptResult<()> {
        let unit = compile_source(source, file, self.manager.program_pool_mut(), &mut self.strings, DuplicatePolicy::Error)?;
        for class in unit.spawnable_plugin_classes() {
            if !self.plugin_classes.iter().any(|c| c == class) {
                self.plugin_classes.push(class.to_string());
            }
        }
        Ok(())
    }

    /// Registers a plugin class by name without going through a compiled
    /// `@Plugin` declaration — for host-installed plugins (§6).
    pub fn install_plugin(&mut self, class: &str) {
        if !self.plugin_classes.iter().any(|c| c == class) {
            self.plugin_classes.push(class.to_string());
        }
    }

    /// Freezes class ids, spawns root, every system object in order, each
    /// registered plugin under `Plugin`, and finally `Application` (§4.7).
    /// `argv` becomes the `System.args` array and the `Application.args()`
    /// accessor's backing store.
    pub fn launch(&mut self, argv: &[String]) -> ScriptResult<()> {
        if self.launched {
            return Ok(());
        }
        let plugin_refs: Vec<&str> = self.plugin_classes.iter().map(String::as_str).collect();
        self.manager.freeze_classes(&plugin_refs)?;

        let root = self.manager.spawn_unchecked("Object", ts_core::NULL_HANDLE)?;
        for class in SYSTEM_CLASSES {
            self.manager.spawn_unchecked(class, root)?;
        }
        self.manager.set_args(argv.iter().map(|s| Variable::String(s.as_str().into())).collect());

        if let Some(plugin_root) = self.manager.system_handle("Plugin") {
            for class in &self.plugin_classes {
                self.manager.spawn_unchecked(class, plugin_root)?;
            }
        }

        self.manager.spawn_unchecked("Application", root)?;
        self.launched = true;
        Ok(())
    }

    pub fn is_launched(&self) -> bool {
        self.launched
    }

    /// Runs one tick of the driver loop (§4.6, §5). Returns `Ok(true)` while
    /// the root's exit flag remains unset, `Ok(false)` once the VM should
    /// stop — the caller is expected to check this after every call.
    pub fn update(&mut self, delta: Duration, pre_update: impl FnMut(&mut ObjectManager, Handle), late_update: impl FnMut(&mut ObjectManager, Handle)) -> RuntimeResult<bool> {
        if self.manager.exit_requested() {
            return Ok(false);
        }
        self.manager.tick(delta, pre_update, late_update)?;
        Ok(!self.manager.exit_requested())
    }

    pub fn pause(&mut self) {
        self.manager.clock_mut().pause();
    }

    pub fn resume(&mut self) {
        self.manager.clock_mut().resume();
    }

    /// Destroys the entire object tree below root and clears the exit flag,
    /// without re-running compilation or class-id assignment.
    pub fn reset(&mut self) -> RuntimeResult<()> {
        let root = self.manager.root();
        let children = self.manager.get(root)?.children.clone();
        for child in children {
            self.manager.destroy(child)?;
        }
        self.manager.request_exit();
        Ok(())
    }

    pub fn terminate(&mut self) {
        self.manager.request_exit();
    }

    pub fn bind_native(&mut self, class: &str, function: &str, arity: usize, f: NativeFn) {
        self.manager.bind_native(class, function, arity, f);
    }

    pub fn root(&self) -> Handle {
        self.manager.root()
    }

    pub fn spawn(&mut self, class: &str, parent: Handle) -> RuntimeResult<Handle> {
        self.manager.spawn(class, parent)
    }

    pub fn find_object(&self, from: Handle, name: &str) -> Option<Handle> {
        self.manager.find_object(from, name)
    }

    pub fn program_pool(&self) -> &ts_core::ProgramPool {
        self.manager.program_pool()
    }

    pub fn tag_system(&self) -> &TagSystem {
        self.manager.tag_system()
    }

    pub fn tag_system_mut(&mut self) -> &mut TagSystem {
        self.manager.tag_system_mut()
    }

    pub fn object_manager(&self) -> &ObjectManager {
        &self.manager
    }

    pub fn object_manager_mut(&mut self) -> &mut ObjectManager {
        &mut self.manager
    }

    pub fn args(&self) -> &[Variable] {
        self.manager.args()
    }

    pub fn clock(&self) -> &crate::clock::Clock {
        self.manager.clock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launching_twice_is_a_no_op() {
        let mut vm = Vm::new(VmConfig::default());
        vm.compile_str(r#"object "Application" { state "main" {} }"#, "<test>").unwrap();
        vm.launch(&[]).unwrap();
        let application = vm.find_object(vm.root(), "Application").unwrap();
        vm.launch(&[]).unwrap();
        assert_eq!(vm.find_object(vm.root(), "Application"), Some(application));
    }

    #[test]
    fn hello_world_exits_within_two_ticks() {
        let mut vm = Vm::new(VmConfig::default());
        vm.compile_str(r#"object "Application" { state "main" { Console.print("hi"); Application.destroy(); } }"#, "<test>").unwrap();
        vm.launch(&[]).unwrap();
        let mut ticks = 0;
        while vm.update(Duration::from_millis(16), |_, _| {}, |_, _| {}).unwrap() && ticks < 2 {
            ticks += 1;
        }
        assert!(ticks <= 2);
    }
}
