//! `Array` and `Dictionary` native storage (§4.9): both keep their backing
//! store in the spawned object's `user_data` slot rather than the heap —
//! there is no script-visible difference, and it avoids address bookkeeping
//! for a container whose scope is explicitly "push/get/length only".

use ts_core::Variable;

use crate::error::{RuntimeError, RuntimeResult};
use crate::object_manager::ObjectManager;

pub(super) fn array_push(manager: &mut ObjectManager, receiver: &Variable, args: &[Variable]) -> RuntimeResult<Variable> {
    let handle = expect_handle(receiver)?;
    let value = args.first().cloned().unwrap_or_default();
    let object = manager.get_mut(handle)?;
    let store = object.user_data.get_or_insert_with(|| Box::new(Vec::<Variable>::new()));
    let vec = store.downcast_mut::<Vec<Variable>>().ok_or_else(|| native_err("Array", "push", 1, "corrupt backing store"))?;
    vec.push(value);
    Ok(Variable::null())
}

pub(super) fn array_get(manager: &mut ObjectManager, receiver: &Variable, args: &[Variable]) -> RuntimeResult<Variable> {
    let handle = expect_handle(receiver)?;
    let index = args.first().and_then(Variable::as_number).unwrap_or(0.0) as i64;
    let object = manager.get(handle)?;
    let vec = object
        .user_data
        .as_ref()
        .and_then(|d| d.downcast_ref::<Vec<Variable>>())
        .ok_or_else(|| native_err("Array", "get", 1, "array has no elements"))?;
    if index < 0 || index as usize >= vec.len() {
        return Err(native_err("Array", "get", 1, &format!("index {index} out of range")));
    }
    Ok(vec[index as usize].clone())
}

pub(super) fn array_length(manager: &mut ObjectManager, receiver: &Variable, _args: &[Variable]) -> RuntimeResult<Variable> {
    let handle = expect_handle(receiver)?;
    let len = manager
        .get(handle)?
        .user_data
        .as_ref()
        .and_then(|d| d.downcast_ref::<Vec<Variable>>())
        .map(Vec::len)
        .unwrap_or(0);
    Ok(Variable::Number(len as f64))
}

pub(super) fn dictionary_set(manager: &mut ObjectManager, receiver: &Variable, args: &[Variable]) -> RuntimeResult<Variable> {
    let handle = expect_handle(receiver)?;
    let key = args.first().map(|v| v.as_str().unwrap_or_default().to_string()).unwrap_or_default();
    let value = args.get(1).cloned().unwrap_or_default();
    let object = manager.get_mut(handle)?;
    let store = object.user_data.get_or_insert_with(|| Box::new(Vec::<(String, Variable)>::new()));
    let entries = store
        .downcast_mut::<Vec<(String, Variable)>>()
        .ok_or_else(|| native_err("Dictionary", "set", 2, "corrupt backing store"))?;
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
    Ok(Variable::null())
}

pub(super) fn dictionary_get(manager: &mut ObjectManager, receiver: &Variable, args: &[Variable]) -> RuntimeResult<Variable> {
    let handle = expect_handle(receiver)?;
    let key = args.first().map(|v| v.as_str().unwrap_or_default().to_string()).unwrap_or_default();
    let object = manager.get(handle)?;
    let entries = object
        .user_data
        .as_ref()
        .and_then(|d| d.downcast_ref::<Vec<(String, Variable)>>())
        .ok_or_else(|| native_err("Dictionary", "get", 1, "key not found"))?;
    entries
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| native_err("Dictionary", "get", 1, &format!("key {key:?} not found")))
}

pub(super) fn dictionary_length(manager: &mut ObjectManager, receiver: &Variable, _args: &[Variable]) -> RuntimeResult<Variable> {
    let handle = expect_handle(receiver)?;
    let len = manager
        .get(handle)?
        .user_data
        .as_ref()
        .and_then(|d| d.downcast_ref::<Vec<(String, Variable)>>())
        .map(Vec::len)
        .unwrap_or(0);
    Ok(Variable::Number(len as f64))
}

fn expect_handle(receiver: &Variable) -> RuntimeResult<ts_core::Handle> {
    receiver.as_handle().ok_or_else(|| native_err("Array", "<collection>", 0, "receiver is not an object handle"))
}

fn native_err(class: &str, function: &str, arity: usize, reason: &str) -> RuntimeError {
    RuntimeError::Native { class: class.to_string(), function: function.to_string(), arity, reason: reason.to_string() }
}
