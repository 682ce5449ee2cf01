//! End-to-end scenarios compiling and running whole scripts, mirroring the
//! teacher's `tests/` directory convention for whole-pipeline behavior (§8).

use std::time::Duration;

use ts_core::{Variable, VmConfig};
use ts_runtime::{ObjectManager, Vm};
use ts_vm::{CallTarget, VmHost};

/// Invokes a method the way the interpreter's `CALL` opcode would, through
/// the public `VmHost` seam, rather than `ObjectManager::call` (which only
/// resolves *scripted* programs) — the right way to exercise a native
/// (`sslib`) binding from outside the crate.
fn call_native(manager: &mut ObjectManager, receiver: Variable, name: &str, args: &[Variable]) -> Variable {
    match manager.resolve_call(&receiver, name, args).unwrap() {
        CallTarget::Native(value) => value,
        CallTarget::Scripted { .. } => panic!("{name} resolved to a scripted program, not a native one"),
    }
}

fn run_to_exit(vm: &mut Vm, max_ticks: usize) -> usize {
    let mut ticks = 0;
    while ticks < max_ticks {
        let keep_running = vm.update(Duration::from_millis(10), |_, _| {}, |_, _| {}).unwrap();
        ticks += 1;
        if !keep_running {
            break;
        }
    }
    ticks
}

#[test]
fn timeout_spawns_a_child_that_exits_the_application() {
    let source = r#"
        object "A" {
            state "main" {
                if (timeout(0.0)) {
                    Application.destroy();
                }
            }
        }
        object "Application" {
            state "main" { }
            fun constructor() {
                spawn("A");
            }
        }
    "#;
    let mut vm = Vm::new(VmConfig::default());
    vm.compile_str(source, "<timeout>").unwrap();
    vm.launch(&[]).unwrap();
    let ticks = run_to_exit(&mut vm, 10);
    assert!(ticks <= 10, "VM should have exited well within 10 ticks, took {ticks}");
}

#[test]
fn array_push_get_length_round_trips() {
    let mut vm = Vm::new(VmConfig::default());
    vm.compile_str(r#"object "Application" { state "main" { } }"#, "<array>").unwrap();
    vm.launch(&[]).unwrap();

    let root = vm.root();
    let manager = vm.object_manager_mut();
    let array = manager.spawn("Array", root).unwrap();
    for n in [1.0, 2.0, 3.0] {
        call_native(manager, Variable::Handle(array), "push", &[Variable::Number(n)]);
    }
    let length = call_native(manager, Variable::Handle(array), "length", &[]);
    assert_eq!(length.as_number(), Some(3.0));
    let middle = call_native(manager, Variable::Handle(array), "get", &[Variable::Number(1.0)]);
    assert_eq!(middle.as_number(), Some(2.0));
}

#[test]
fn dictionary_set_and_get_round_trip() {
    let mut vm = Vm::new(VmConfig::default());
    vm.compile_str(r#"object "Application" { state "main" { } }"#, "<dict>").unwrap();
    vm.launch(&[]).unwrap();

    let root = vm.root();
    let manager = vm.object_manager_mut();
    let dict = manager.spawn("Dictionary", root).unwrap();
    call_native(manager, Variable::Handle(dict), "set", &[Variable::String("k".into()), Variable::Number(42.0)]);
    let value = call_native(manager, Variable::Handle(dict), "get", &[Variable::String("k".into())]);
    assert_eq!(value.as_number(), Some(42.0));
}

#[test]
fn state_change_resets_elapsed_time() {
    let mut vm = Vm::new(VmConfig::default());
    vm.compile_str(r#"object "Application" { state "main" { } state "second" { } }"#, "<state>").unwrap();
    vm.launch(&[]).unwrap();
    let application = vm.find_object(vm.root(), "Application").unwrap();

    vm.update(Duration::from_millis(500), |_, _| {}, |_, _| {}).unwrap();
    {
        let manager = vm.object_manager_mut();
        let now = manager.clock().elapsed();
        call_native(manager, Variable::Handle(application), "set_state", &[Variable::String("second".into())]);
        let elapsed = manager.get(application).unwrap().state_elapsed(now);
        assert_eq!(elapsed, Duration::ZERO);
        assert_eq!(manager.get(application).unwrap().state_name.as_ref(), "second");
    }
}

#[test]
fn failed_assertion_with_a_custom_message_crashes_a_non_application_object() {
    let source = r#"
        object "A" {
            state "main" {
                assert(1 == 2, "one is never two");
            }
        }
        object "Application" {
            state "main" { }
            fun constructor() {
                spawn("A");
            }
        }
    "#;
    let mut vm = Vm::new(VmConfig::default());
    vm.compile_str(source, "<assert>").unwrap();
    vm.launch(&[]).unwrap();
    let err = vm.update(Duration::from_millis(10), |_, _| {}, |_, _| {}).unwrap_err();
    assert!(err.to_string().contains("one is never two"), "unexpected error: {err}");
}

#[test]
fn unreferenced_object_is_collected_while_referenced_one_survives() {
    let mut vm = Vm::new(VmConfig::default());
    vm.compile_str(r#"object "Holder" { } object "Target" { } object "Application" { state "main" { } }"#, "<gc>").unwrap();
    vm.launch(&[]).unwrap();

    let root = vm.root();
    let manager = vm.object_manager_mut();
    let holder = manager.spawn("Holder", root).unwrap();
    let kept = manager.spawn("Target", holder).unwrap();
    let dropped = manager.spawn("Target", holder).unwrap();

    let address = manager.get_mut(holder).unwrap().heap.alloc().unwrap();
    manager.get_mut(holder).unwrap().heap.set(address, Variable::Handle(kept)).unwrap();
    manager.destroy(dropped).unwrap();

    manager.tick(Duration::from_secs(2), |_, _| {}, |_, _| {}).unwrap();

    assert!(manager.is_alive(kept));
    assert!(!manager.is_alive(dropped));
}
