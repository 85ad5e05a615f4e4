//! Promises with eager settlement.
//!
//! DESIGN
//! ======
//! There is no microtask queue. Reactions registered with `then` run as soon
//! as the promise they wait on settles, inside whatever call settled it, and
//! `await` reads an already settled promise directly. Awaiting a promise that
//! is still pending throws: nothing could resume the suspended function later
//! because evaluation is a plain recursive walk.
//!
//! An `async` function therefore runs to completion when called and hands
//! back a promise that is fulfilled with its return value or rejected with
//! what it threw.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::interp::Interp;
use super::value::{Function, JsResult, Object, ObjectClass, Throw, Value};

const PENDING_AWAIT: &str = "await of a pending promise is not supported; only settled promises can be awaited";

enum State {
    Pending(Vec<Reaction>),
    Fulfilled(Value),
    Rejected(Value),
}

struct Reaction {
    on_fulfilled: Value,
    on_rejected: Value,
    derived: Promise,
}

#[derive(Clone)]
pub struct Promise(Arc<Mutex<State>>);

/// How a promise settled. `Err` carries the rejection reason.
pub type Outcome = Result<Value, Value>;

impl Promise {
    #[must_use]
    pub fn pending() -> Self {
        Self(Arc::new(Mutex::new(State::Pending(Vec::new()))))
    }

    #[must_use]
    pub fn rejected(reason: Value) -> Self {
        Self(Arc::new(Mutex::new(State::Rejected(reason))))
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(Object::with_class(ObjectClass::Promise(self)))
    }

    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(obj) => match obj.class() {
                ObjectClass::Promise(promise) => Some(promise),
                _ => None,
            },
            _ => None,
        }
    }

    /// `None` while pending.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        match &*self.0.lock() {
            State::Pending(_) => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Resolve with `value`, adopting its state when it is itself a promise.
    ///
    /// # Errors
    ///
    /// Only budget exhaustion inside a reaction propagates.
    pub fn resolve(&self, interp: &mut Interp, value: Value) -> JsResult<()> {
        match Self::from_value(&value) {
            Some(inner) if Arc::ptr_eq(&inner.0, &self.0) => {
                self.settle(interp, Err(Throw::type_error("Chaining cycle detected for promise").0))
            }
            Some(inner) => inner.subscribe(interp, Value::Undefined, Value::Undefined, self.clone()),
            None => self.settle(interp, Ok(value)),
        }
    }

    /// # Errors
    ///
    /// Only budget exhaustion inside a reaction propagates.
    pub fn reject(&self, interp: &mut Interp, reason: Value) -> JsResult<()> {
        self.settle(interp, Err(reason))
    }

    /// `promise.then(onFulfilled, onRejected)`.
    ///
    /// # Errors
    ///
    /// Only budget exhaustion inside a reaction propagates.
    pub fn then(&self, interp: &mut Interp, on_fulfilled: Value, on_rejected: Value) -> JsResult<Self> {
        let derived = Self::pending();
        self.subscribe(interp, on_fulfilled, on_rejected, derived.clone())?;
        Ok(derived)
    }

    fn subscribe(&self, interp: &mut Interp, on_fulfilled: Value, on_rejected: Value, derived: Self) -> JsResult<()> {
        let reaction = Reaction { on_fulfilled, on_rejected, derived };
        let settled = match &mut *self.0.lock() {
            State::Pending(reactions) => {
                reactions.push(reaction);
                return Ok(());
            }
            State::Fulfilled(value) => Ok(value.clone()),
            State::Rejected(reason) => Err(reason.clone()),
        };
        react(interp, reaction, &settled)
    }

    fn settle(&self, interp: &mut Interp, outcome: Outcome) -> JsResult<()> {
        let reactions = {
            let mut state = self.0.lock();
            let State::Pending(reactions) = &mut *state else {
                return Ok(());
            };
            let reactions = std::mem::take(reactions);
            *state = match &outcome {
                Ok(value) => State::Fulfilled(value.clone()),
                Err(reason) => State::Rejected(reason.clone()),
            };
            reactions
        };
        for reaction in reactions {
            react(interp, reaction, &outcome)?;
        }
        Ok(())
    }

    /// The `resolve` and `reject` functions handed to an executor.
    fn resolving_functions(&self) -> (Value, Value) {
        let promise = self.clone();
        let resolve = Function::native("resolve", move |interp, _, args| {
            promise.resolve(interp, args.first().cloned().unwrap_or_default())?;
            Ok(Value::Undefined)
        });
        let promise = self.clone();
        let reject = Function::native("reject", move |interp, _, args| {
            promise.reject(interp, args.first().cloned().unwrap_or_default())?;
            Ok(Value::Undefined)
        });
        (Value::Function(resolve), Value::Function(reject))
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome() {
            None => f.write_str("Promise { <pending> }"),
            Some(Ok(value)) => write!(f, "Promise {{ {value:?} }}"),
            Some(Err(reason)) => write!(f, "Promise {{ <rejected> {reason:?} }}"),
        }
    }
}

impl PartialEq for Promise {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn react(interp: &mut Interp, reaction: Reaction, outcome: &Outcome) -> JsResult<()> {
    interp.nested(|interp| {
        let (handler, input) = match outcome {
            Ok(value) => (&reaction.on_fulfilled, value),
            Err(reason) => (&reaction.on_rejected, reason),
        };
        if !matches!(handler, Value::Function(_)) {
            return match outcome {
                Ok(value) => reaction.derived.resolve(interp, value.clone()),
                Err(reason) => reaction.derived.reject(interp, reason.clone()),
            };
        }
        match interp.call(handler, Value::Undefined, std::slice::from_ref(input)) {
            Ok(result) => reaction.derived.resolve(interp, result),
            Err(thrown) if interp.is_exhausted() => Err(thrown),
            Err(Throw(reason)) => reaction.derived.reject(interp, reason),
        }
    })
}

/// Wrap what an `async` function body produced in a promise.
///
/// # Errors
///
/// Only budget exhaustion propagates; other throws become a rejection.
pub fn settle_async(interp: &mut Interp, result: JsResult) -> JsResult {
    match result {
        Ok(value) => {
            let promise = Promise::pending();
            promise.resolve(interp, value)?;
            Ok(promise.into_value())
        }
        Err(thrown) if interp.is_exhausted() => Err(thrown),
        Err(Throw(reason)) => Ok(Promise::rejected(reason).into_value()),
    }
}

/// `await value`.
///
/// # Errors
///
/// The rejection reason of a rejected promise, or an `Error` for a pending one.
pub fn await_value(value: Value) -> JsResult {
    let Some(promise) = Promise::from_value(&value) else {
        return Ok(value);
    };
    match promise.outcome() {
        Some(Ok(value)) => Ok(value),
        Some(Err(reason)) => Err(Throw(reason)),
        None => Err(Throw::error("Error", PENDING_AWAIT)),
    }
}

/// The rejection reason when `value` is a rejected promise.
#[must_use]
pub fn rejection(value: &Value) -> Option<Value> {
    Promise::from_value(value).and_then(|promise| promise.outcome()).and_then(Result::err)
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn to_promise(interp: &mut Interp, value: Value) -> JsResult<Promise> {
    if let Some(promise) = Promise::from_value(&value) {
        return Ok(promise);
    }
    let promise = Promise::pending();
    promise.resolve(interp, value)?;
    Ok(promise)
}

/// `then`, `catch` and `finally` on a promise object.
#[must_use]
pub fn method(promise: &Promise, key: &str) -> Option<Value> {
    let p = promise.clone();
    let f = match key {
        "then" => Function::native(key, move |interp, _, args| {
            p.then(interp, arg(args, 0), arg(args, 1)).map(Promise::into_value)
        }),
        "catch" => Function::native(key, move |interp, _, args| {
            p.then(interp, Value::Undefined, arg(args, 0)).map(Promise::into_value)
        }),
        "finally" => Function::native(key, move |interp, _, args| {
            let on_finally = arg(args, 0);
            let after = on_finally.clone();
            let pass = Function::native("", move |interp, _, args| {
                if matches!(on_finally, Value::Function(_)) {
                    interp.call(&on_finally, Value::Undefined, &[])?;
                }
                Ok(arg(args, 0))
            });
            let fail = Function::native("", move |interp, _, args| {
                if matches!(after, Value::Function(_)) {
                    interp.call(&after, Value::Undefined, &[])?;
                }
                Err(Throw(arg(args, 0)))
            });
            p.then(interp, Value::Function(pass), Value::Function(fail)).map(Promise::into_value)
        }),
        _ => return None,
    };
    Some(Value::Function(f))
}

/// The `Promise` global: constructor plus `resolve`, `reject` and `all`.
#[must_use]
pub fn constructor() -> Function {
    let resolve = Function::native("resolve", |interp, _, args| to_promise(interp, arg(args, 0)).map(Promise::into_value));
    let reject = Function::native("reject", |_, _, args| Ok(Promise::rejected(arg(args, 0)).into_value()));
    let all = Function::native("all", |interp, _, args| {
        let items = match arg(args, 0) {
            Value::Array(items) => items.snapshot(),
            other => return Err(Throw::type_error(format!("{} is not iterable", other.type_of()))),
        };
        let aggregate = Promise::pending();
        if items.is_empty() {
            aggregate.resolve(interp, Value::from(Vec::new()))?;
            return Ok(aggregate.into_value());
        }
        let results = Arc::new(Mutex::new((vec![Value::Undefined; items.len()], items.len())));
        for (i, item) in items.into_iter().enumerate() {
            let promise = to_promise(interp, item)?;
            let (done, slot) = (aggregate.clone(), results.clone());
            let fulfilled = Function::native("", move |interp, _, args| {
                let finished = {
                    let mut guard = slot.lock();
                    let (values, remaining) = &mut *guard;
                    values[i] = arg(args, 0);
                    *remaining -= 1;
                    (*remaining == 0).then(|| values.clone())
                };
                if let Some(values) = finished {
                    done.resolve(interp, Value::from(values))?;
                }
                Ok(Value::Undefined)
            });
            let failed = aggregate.clone();
            let rejected = Function::native("", move |interp, _, args| {
                failed.reject(interp, arg(args, 0))?;
                Ok(Value::Undefined)
            });
            promise.then(interp, Value::Function(fulfilled), Value::Function(rejected))?;
        }
        Ok(aggregate.into_value())
    });

    Function::native("Promise", |interp, _, args| {
        let executor = arg(args, 0);
        if !matches!(executor, Value::Function(_)) {
            return Err(Throw::type_error(format!("Promise resolver {} is not a function", executor.inspect())));
        }
        let promise = Promise::pending();
        let (resolve, reject) = promise.resolving_functions();
        match interp.call(&executor, Value::Undefined, &[resolve, reject]) {
            Ok(_) => {}
            Err(thrown) if interp.is_exhausted() => return Err(thrown),
            Err(Throw(reason)) => promise.reject(interp, reason)?,
        }
        Ok(promise.into_value())
    })
    .with("resolve", Value::Function(resolve))
    .with("reject", Value::Function(reject))
    .with("all", Value::Function(all))
}

#[cfg(test)]
#[path = "promise_test.rs"]
mod tests;
