//! The closed capability set generated components are instantiated with.
//!
//! DESIGN
//! ======
//! The factory scope binds `React` (element construction plus the hooks) and
//! the bare hook names `useState`, `useEffect`, `useCallback`, `useMemo`,
//! `useRef`. Language built-ins (`Math`, `JSON`, `Array`, ...) come from the
//! parent global scope. Nothing else is reachable: no module loader, no host
//! I/O. This keeps malformed output from touching process state; it is not a
//! defence against deliberately hostile code.
//!
//! Hooks read and write the [`HookFrame`] the renderer installs on the
//! [`Interp`] before calling a component. Setters hold a weak reference to
//! their instance's hook store so an unmounted instance frees its state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::interp::{Env, Interp};
use super::intrinsics::{get_property, own_entries};
use super::value::{Element, ElementType, Function, JsResult, Object, Throw, Value};

/// Names bound in the factory scope, in binding order.
pub const CAPABILITY_NAMES: [&str; 6] = ["React", "useState", "useEffect", "useCallback", "useMemo", "useRef"];

pub(crate) type HookStore = Arc<Mutex<Vec<Hook>>>;

pub(crate) enum Hook {
    State { value: Value, setter: Value },
    Reducer { value: Value, dispatch: Value, reducer: Arc<Mutex<Value>> },
    Effect { deps: Option<Vec<Value>>, cleanup: Value },
    Memo { deps: Option<Vec<Value>>, value: Value },
    Ref(Value),
}

/// An effect scheduled by the current render, run after commit.
pub(crate) struct PendingEffect {
    pub store: HookStore,
    pub index: usize,
    pub create: Value,
}

/// Hook bookkeeping for the component instance currently rendering.
pub(crate) struct HookFrame {
    pub store: HookStore,
    pub cursor: usize,
    pub mounting: bool,
    pub effects: Vec<PendingEffect>,
    pub dirty: Arc<AtomicBool>,
}

impl HookFrame {
    pub fn new(store: HookStore, mounting: bool, dirty: Arc<AtomicBool>) -> Self {
        Self { store, cursor: 0, mounting, effects: Vec::new(), dirty }
    }
}

/// Bind the capability set into `env`.
pub fn install(env: &Env) {
    let use_state = Value::Function(Function::native("useState", use_state));
    let use_effect = Value::Function(Function::native("useEffect", use_effect));
    let use_callback = Value::Function(Function::native("useCallback", use_callback));
    let use_memo = Value::Function(Function::native("useMemo", use_memo));
    let use_ref = Value::Function(Function::native("useRef", use_ref));

    let fragment = Function::native("Fragment", |_, _, args| match args.first() {
        Some(props @ Value::Object(_)) => get_property(props, "children"),
        _ => Ok(Value::Undefined),
    });
    let react = Object::from_entries([
        ("createElement".to_owned(), Value::Function(Function::native("createElement", create_element))),
        ("Fragment".to_owned(), Value::Function(fragment)),
        ("useState".to_owned(), use_state.clone()),
        ("useEffect".to_owned(), use_effect.clone()),
        ("useLayoutEffect".to_owned(), use_effect.clone()),
        ("useCallback".to_owned(), use_callback.clone()),
        ("useMemo".to_owned(), use_memo.clone()),
        ("useRef".to_owned(), use_ref.clone()),
        ("useReducer".to_owned(), Value::Function(Function::native("useReducer", use_reducer))),
        ("memo".to_owned(), Value::Function(Function::native("memo", |_, _, args| Ok(args.first().cloned().unwrap_or_default())))),
    ]);

    env.declare("React", Value::Object(react), false);
    env.declare("useState", use_state, false);
    env.declare("useEffect", use_effect, false);
    env.declare("useCallback", use_callback, false);
    env.declare("useMemo", use_memo, false);
    env.declare("useRef", use_ref, false);
}

// =============================================================================
// ELEMENTS
// =============================================================================

fn create_element(_interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult {
    let kind = match args.first() {
        Some(Value::Str(tag)) => ElementType::Host(tag.to_string()),
        Some(Value::Function(f)) => ElementType::Component(f.clone()),
        other => {
            let found = other.map_or("undefined", Value::type_of);
            return Err(Throw::type_error(format!(
                "Element type is invalid: expected a string (for built-in components) or a function but got: {found}"
            )));
        }
    };

    let props = Object::new();
    let mut key = None;
    if let Some(config @ Value::Object(_)) = args.get(1) {
        for (name, value) in own_entries(config) {
            if name == "key" {
                if !value.is_nullish() {
                    key = Some(value.to_js_string());
                }
            } else {
                props.set(name, value);
            }
        }
    }
    match args.get(2..).unwrap_or_default() {
        [] => {}
        [only] => props.set("children", only.clone()),
        many => props.set("children", Value::from(many.to_vec())),
    }

    Ok(Value::Element(Arc::new(Element { kind, props, key })))
}

// =============================================================================
// HOOKS
// =============================================================================

struct Slot {
    store: HookStore,
    index: usize,
    fresh: bool,
    dirty: Arc<AtomicBool>,
}

/// Claim the next hook slot of the rendering instance.
fn next_slot(interp: &mut Interp) -> JsResult<Slot> {
    let frame = interp.frame_mut()?;
    let index = frame.cursor;
    frame.cursor += 1;
    let len = frame.store.lock().len();
    if !frame.mounting && index >= len {
        return Err(Throw::error("Error", "Rendered more hooks than during the previous render."));
    }
    Ok(Slot { store: frame.store.clone(), index, fresh: index >= len, dirty: frame.dirty.clone() })
}

fn order_error(hook: &str) -> Throw {
    Throw::error(
        "Error",
        format!("React has detected a change in the order of Hooks called by this component ({hook})."),
    )
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn deps_of(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.snapshot()),
        _ => None,
    }
}

fn deps_changed(old: Option<&Vec<Value>>, new: Option<&Vec<Value>>) -> bool {
    match (old, new) {
        (Some(a), Some(b)) => a.len() != b.len() || a.iter().zip(b).any(|(x, y)| !x.same_value(y)),
        _ => true,
    }
}

fn use_state(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult {
    let slot = next_slot(interp)?;
    if slot.fresh {
        let initial = match arg(args, 0) {
            init @ Value::Function(_) => interp.call(&init, Value::Undefined, &[])?,
            value => value,
        };
        let setter = state_setter(Arc::downgrade(&slot.store), slot.index, slot.dirty);
        slot.store.lock().push(Hook::State { value: initial, setter });
    }
    match slot.store.lock().get(slot.index) {
        Some(Hook::State { value, setter }) => Ok(Value::from(vec![value.clone(), setter.clone()])),
        _ => Err(order_error("useState")),
    }
}

fn state_setter(store: Weak<Mutex<Vec<Hook>>>, index: usize, dirty: Arc<AtomicBool>) -> Value {
    Value::Function(Function::native("setState", move |interp, _, args| {
        let Some(store) = store.upgrade() else { return Ok(Value::Undefined) };
        let current = match store.lock().get(index) {
            Some(Hook::State { value, .. }) => value.clone(),
            _ => return Ok(Value::Undefined),
        };
        let next = match arg(args, 0) {
            update @ Value::Function(_) => interp.call(&update, Value::Undefined, &[current.clone()])?,
            value => value,
        };
        if !next.same_value(&current) {
            if let Some(Hook::State { value, .. }) = store.lock().get_mut(index) {
                *value = next;
            }
            dirty.store(true, Ordering::SeqCst);
        }
        Ok(Value::Undefined)
    }))
}

fn use_reducer(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult {
    let slot = next_slot(interp)?;
    let reducer = arg(args, 0);
    if slot.fresh {
        let initial = match args.get(2) {
            Some(init @ Value::Function(_)) => interp.call(init, Value::Undefined, &[arg(args, 1)])?,
            _ => arg(args, 1),
        };
        let cell = Arc::new(Mutex::new(reducer.clone()));
        let dispatch = reducer_dispatch(Arc::downgrade(&slot.store), slot.index, slot.dirty, cell.clone());
        slot.store.lock().push(Hook::Reducer { value: initial, dispatch, reducer: cell });
    }
    match slot.store.lock().get(slot.index) {
        Some(Hook::Reducer { value, dispatch, reducer: cell }) => {
            if !slot.fresh {
                *cell.lock() = reducer;
            }
            Ok(Value::from(vec![value.clone(), dispatch.clone()]))
        }
        _ => Err(order_error("useReducer")),
    }
}

fn reducer_dispatch(
    store: Weak<Mutex<Vec<Hook>>>,
    index: usize,
    dirty: Arc<AtomicBool>,
    reducer: Arc<Mutex<Value>>,
) -> Value {
    Value::Function(Function::native("dispatch", move |interp, _, args| {
        let Some(store) = store.upgrade() else { return Ok(Value::Undefined) };
        let current = match store.lock().get(index) {
            Some(Hook::Reducer { value, .. }) => value.clone(),
            _ => return Ok(Value::Undefined),
        };
        let reduce = reducer.lock().clone();
        let next = interp.call(&reduce, Value::Undefined, &[current.clone(), arg(args, 0)])?;
        if !next.same_value(&current) {
            if let Some(Hook::Reducer { value, .. }) = store.lock().get_mut(index) {
                *value = next;
            }
            dirty.store(true, Ordering::SeqCst);
        }
        Ok(Value::Undefined)
    }))
}

fn use_effect(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult {
    let slot = next_slot(interp)?;
    let create = arg(args, 0);
    let deps = deps_of(&arg(args, 1));

    let scheduled = if slot.fresh {
        slot.store.lock().push(Hook::Effect { deps, cleanup: Value::Undefined });
        true
    } else {
        match slot.store.lock().get_mut(slot.index) {
            Some(Hook::Effect { deps: old, .. }) => {
                let changed = deps_changed(old.as_ref(), deps.as_ref());
                if changed {
                    *old = deps;
                }
                changed
            }
            _ => return Err(order_error("useEffect")),
        }
    };

    if scheduled && matches!(create, Value::Function(_)) {
        interp.frame_mut()?.effects.push(PendingEffect { store: slot.store, index: slot.index, create });
    }
    Ok(Value::Undefined)
}

fn use_memo(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult {
    let factory = arg(args, 0);
    memoize(interp, "useMemo", deps_of(&arg(args, 1)), |interp| interp.call(&factory, Value::Undefined, &[]))
}

fn use_callback(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult {
    let callback = arg(args, 0);
    memoize(interp, "useCallback", deps_of(&arg(args, 1)), |_| Ok(callback))
}

fn memoize(
    interp: &mut Interp,
    hook: &str,
    deps: Option<Vec<Value>>,
    compute: impl FnOnce(&mut Interp) -> JsResult,
) -> JsResult {
    let slot = next_slot(interp)?;
    if slot.fresh {
        let value = compute(interp)?;
        slot.store.lock().push(Hook::Memo { deps, value: value.clone() });
        return Ok(value);
    }

    let cached = match slot.store.lock().get(slot.index) {
        Some(Hook::Memo { deps: old, value }) => {
            if deps_changed(old.as_ref(), deps.as_ref()) {
                None
            } else {
                Some(value.clone())
            }
        }
        _ => return Err(order_error(hook)),
    };
    if let Some(value) = cached {
        return Ok(value);
    }

    let value = compute(interp)?;
    if let Some(Hook::Memo { deps: old, value: stored }) = slot.store.lock().get_mut(slot.index) {
        *old = deps;
        *stored = value.clone();
    }
    Ok(value)
}

fn use_ref(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult {
    let slot = next_slot(interp)?;
    if slot.fresh {
        let cell = Object::from_entries([("current".to_owned(), arg(args, 0))]);
        slot.store.lock().push(Hook::Ref(Value::Object(cell)));
    }
    match slot.store.lock().get(slot.index) {
        Some(Hook::Ref(cell)) => Ok(cell.clone()),
        _ => Err(order_error("useRef")),
    }
}

#[cfg(test)]
#[path = "capabilities_test.rs"]
mod tests;
