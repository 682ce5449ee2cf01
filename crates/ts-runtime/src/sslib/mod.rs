//! Native (non-scripted) standard library bindings (§4.9).
//!
//! [`dispatch`] is consulted by [`ObjectManager::resolve_call`] only after a
//! scripted program and a host-bound native both miss, and returns `Ok(None)`
//! on no match so the engine can raise its own `UnresolvedFunction` error.
//! Coverage here is deliberately the minimum the end-to-end scenarios need,
//! not a full standard library (§1 Non-goals, §4.9).

mod collections;

use ts_core::{Handle, Variable, NULL_HANDLE, ROOT_HANDLE};

use crate::error::{RuntimeError, RuntimeResult};
use crate::object_manager::ObjectManager;

pub(crate) fn dispatch(manager: &mut ObjectManager, receiver: &Variable, class_name: &str, name: &str, args: &[Variable]) -> RuntimeResult<Option<Variable>> {
    if let Some(result) = dispatch_object_base(manager, receiver, name, args)? {
        return Ok(Some(result));
    }
    if let Some(result) = dispatch_plugin_accessor(manager, receiver, name, args)? {
        return Ok(Some(result));
    }
    match class_name {
        "Application" => dispatch_application(manager, name, args),
        "Console" => dispatch_console(manager, name, args),
        "String" => dispatch_string(receiver, name, args),
        "Number" => dispatch_number(receiver, name),
        "Boolean" => dispatch_boolean(receiver, name),
        "Array" => dispatch_array(manager, receiver, name, args),
        "Dictionary" => dispatch_dictionary(manager, receiver, name, args),
        "Time" => dispatch_time(manager, name),
        "GarbageCollector" => dispatch_gc(manager, name, args),
        "Math" => dispatch_math(name, args),
        _ => Ok(None),
    }
}

/// Methods every class inherits from the implicit `Object` base, regardless
/// of its own class name (§4.9 first bullet).
fn dispatch_object_base(manager: &mut ObjectManager, receiver: &Variable, name: &str, args: &[Variable]) -> RuntimeResult<Option<Variable>> {
    let handle = match receiver.as_handle() {
        Some(h) if manager.is_alive(h) => h,
        _ => return Ok(None),
    };

    let result = match name {
        "spawn" => {
            let class = first_string(args)?;
            Variable::Handle(manager.spawn(&class, handle)?)
        }
        "destroy" | "kill" => {
            if manager.get(handle)?.class_name.as_ref() == "Application" {
                manager.request_exit();
            } else {
                manager.get_mut(handle)?.killed = true;
            }
            Variable::null()
        }
        "get_name" => Variable::String(manager.get(handle)?.class_name.clone().into()),
        "get_parent" => Variable::Handle(manager.get(handle)?.parent),
        "get_child_count" => Variable::Number(manager.get(handle)?.children.len() as f64),
        "get_child" => {
            let index = first_number(args)? as usize;
            let children = manager.get(handle)?.children.clone();
            Variable::Handle(children.get(index).copied().unwrap_or(NULL_HANDLE))
        }
        "find_object" => {
            let target = first_string(args)?;
            Variable::Handle(manager.find_object(handle, &target).or_else(|| manager.find_object(ROOT_HANDLE, &target)).unwrap_or(NULL_HANDLE))
        }
        "has_tag" => {
            let tag = first_string(args)?;
            Variable::Bool(manager.get(handle)?.tags.has_tag(&tag))
        }
        "get_state" => Variable::String(manager.get(handle)?.state_name.clone().into()),
        "set_state" => {
            let state = first_string(args)?;
            let now = manager.clock().elapsed();
            manager.get_mut(handle)?.set_state(state.into(), now);
            Variable::null()
        }
        "timeout" => {
            let seconds = first_number(args)?;
            let now = manager.clock().elapsed();
            let elapsed = manager.get(handle)?.state_elapsed(now).as_secs_f64();
            Variable::Bool(elapsed >= seconds)
        }
        "reparent" => return Err(RuntimeError::ReparentNotSupported(manager.get(handle)?.class_name.to_string())),
        "crash" => {
            let object = manager.get(handle)?.class_name.to_string();
            return Err(RuntimeError::ScriptCrash { object, message: first_string(args)? });
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

/// `get_<segment>()` resolves a `using a.b.c;` import path segment by
/// finding a descendant of the receiver named `<segment>` (§4.2
/// `compile_plugin_chain`). Only fires for exactly this shape — any class
/// name may receive it, matching how plugin chains narrow step by step.
fn dispatch_plugin_accessor(manager: &mut ObjectManager, receiver: &Variable, name: &str, args: &[Variable]) -> RuntimeResult<Option<Variable>> {
    if !args.is_empty() {
        return Ok(None);
    }
    let Some(segment) = name.strip_prefix("get_") else { return Ok(None) };
    if segment.is_empty() {
        return Ok(None);
    }
    let Some(handle) = receiver.as_handle() else { return Ok(None) };
    if !manager.is_alive(handle) {
        return Ok(None);
    }
    match manager.find_object(handle, segment) {
        Some(found) => Ok(Some(Variable::Handle(found))),
        None => Ok(None),
    }
}

fn dispatch_application(manager: &mut ObjectManager, name: &str, args: &[Variable]) -> RuntimeResult<Option<Variable>> {
    let result = match name {
        "exit" => {
            manager.request_exit();
            Variable::null()
        }
        "args" => {
            let handle = build_array(manager, ROOT_HANDLE, manager.args().to_vec())?;
            Variable::Handle(handle)
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn dispatch_console(manager: &mut ObjectManager, name: &str, args: &[Variable]) -> RuntimeResult<Option<Variable>> {
    let result = match name {
        "print" => {
            manager.write_stdout(&args.first().cloned().unwrap_or_default().to_string(), true);
            Variable::null()
        }
        "write" => {
            manager.write_stdout(&args.first().cloned().unwrap_or_default().to_string(), false);
            Variable::null()
        }
        "readline" => {
            use std::io::BufRead;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map_err(|e| RuntimeError::Native {
                class: "Console".to_string(),
                function: "readline".to_string(),
                arity: 0,
                reason: e.to_string(),
            })?;
            Variable::String(line.trim_end_matches(['\n', '\r']).into())
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn dispatch_string(receiver: &Variable, name: &str, args: &[Variable]) -> RuntimeResult<Option<Variable>> {
    let text = receiver.as_str().unwrap_or_default();
    let result = match name {
        "toString" => Variable::String(text.into()),
        "valueOf" => Variable::String(text.into()),
        "length" => Variable::Number(text.chars().count() as f64),
        "substr" => {
            let chars: Vec<char> = text.chars().collect();
            let len = chars.len() as i64;
            let mut start = first_number(args).unwrap_or(0.0) as i64;
            if start < 0 {
                start = (len + start).max(0);
            }
            let count = args.get(1).and_then(Variable::as_number).map(|n| n as i64).unwrap_or(len - start).max(0);
            let start = start.clamp(0, len) as usize;
            let end = (start as i64 + count).clamp(0, len) as usize;
            Variable::String(chars[start..end].iter().collect::<String>().into())
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn dispatch_number(receiver: &Variable, name: &str) -> RuntimeResult<Option<Variable>> {
    let n = receiver.as_number().unwrap_or(0.0);
    let result = match name {
        "toString" => Variable::String(n.to_string().into()),
        "valueOf" => Variable::Number(n),
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn dispatch_boolean(receiver: &Variable, name: &str) -> RuntimeResult<Option<Variable>> {
    let b = receiver.is_truthy();
    let result = match name {
        "toString" => Variable::String(if b { "true" } else { "false" }.into()),
        "valueOf" => Variable::Bool(b),
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn dispatch_array(manager: &mut ObjectManager, receiver: &Variable, name: &str, args: &[Variable]) -> RuntimeResult<Option<Variable>> {
    let result = match name {
        "push" => collections::array_push(manager, receiver, args)?,
        "get" => collections::array_get(manager, receiver, args)?,
        "length" => collections::array_length(manager, receiver, args)?,
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn dispatch_dictionary(manager: &mut ObjectManager, receiver: &Variable, name: &str, args: &[Variable]) -> RuntimeResult<Option<Variable>> {
    let result = match name {
        "set" => collections::dictionary_set(manager, receiver, args)?,
        "get" => collections::dictionary_get(manager, receiver, args)?,
        "length" => collections::dictionary_length(manager, receiver, args)?,
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn dispatch_time(manager: &mut ObjectManager, name: &str) -> RuntimeResult<Option<Variable>> {
    let result = match name {
        "now" => Variable::Number(manager.clock().elapsed().as_secs_f64()),
        _ => return Ok(None),
    };
    Ok(Some(result))
}

/// The GC controller's `interval` get/set (§9 resolved Open Question: the
/// setter is real and clamped, not silently ignored).
fn dispatch_gc(manager: &mut ObjectManager, name: &str, args: &[Variable]) -> RuntimeResult<Option<Variable>> {
    let result = match name {
        "get_interval" => Variable::Number(manager.gc_interval().as_secs_f64() * 1000.0),
        "set_interval" => {
            let millis = first_number(args)?;
            manager.set_gc_interval_ms_clamped(millis);
            Variable::null()
        }
        "collect" => {
            manager.force_full_collection();
            Variable::null()
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn dispatch_math(name: &str, args: &[Variable]) -> RuntimeResult<Option<Variable>> {
    let result = match name {
        "abs" => Variable::Number(first_number(args)?.abs()),
        "max" => Variable::Number(first_number(args)?.max(args.get(1).and_then(Variable::as_number).unwrap_or(f64::NEG_INFINITY))),
        "min" => Variable::Number(first_number(args)?.min(args.get(1).and_then(Variable::as_number).unwrap_or(f64::INFINITY))),
        "sqrt" => Variable::Number(first_number(args)?.sqrt()),
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn build_array(manager: &mut ObjectManager, parent: Handle, values: Vec<Variable>) -> RuntimeResult<Handle> {
    let handle = manager.spawn("Array", parent)?;
    for value in values {
        collections::array_push(manager, &Variable::Handle(handle), std::slice::from_ref(&value))?;
    }
    Ok(handle)
}

fn first_string(args: &[Variable]) -> RuntimeResult<String> {
    Ok(args.first().and_then(|v| v.as_str()).unwrap_or_default().to_string())
}

fn first_number(args: &[Variable]) -> RuntimeResult<f64> {
    Ok(args.first().and_then(Variable::as_number).unwrap_or(0.0))
}
