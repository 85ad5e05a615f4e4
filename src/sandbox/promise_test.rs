use super::*;
use crate::sandbox::interp::{Env, Limits};
use crate::sandbox::intrinsics::install_globals;
use crate::sandbox::parse::parse;
use crate::sandbox::timers::TimerQueue;

fn run(src: &str) -> Env {
    let env = Env::root();
    install_globals(&env, &TimerQueue::default());
    let module = env.child(true);
    if let Err(thrown) = Interp::new(Limits::default()).run_program(&parse(src).unwrap(), &module) {
        panic!("program threw: {}", thrown.describe());
    }
    module
}

fn text(env: &Env, name: &str) -> String {
    env.lookup_own(name).unwrap_or_default().to_js_string()
}

#[test]
fn reactions_run_when_the_promise_settles() {
    let mut interp = Interp::new(Limits::default());
    let promise = Promise::pending();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let record = Function::native("record", move |_, _, args| {
        sink.lock().push(arg(args, 0).to_js_string());
        Ok(Value::Undefined)
    });
    let derived = promise.then(&mut interp, Value::Function(record), Value::Undefined).unwrap();
    assert!(seen.lock().is_empty());
    assert!(derived.outcome().is_none());

    promise.resolve(&mut interp, Value::from("done")).unwrap();
    assert_eq!(*seen.lock(), ["done"]);
    assert!(matches!(derived.outcome(), Some(Ok(Value::Undefined))));

    promise.reject(&mut interp, Value::from("late")).unwrap();
    assert!(matches!(promise.outcome(), Some(Ok(_))));
}

#[test]
fn resolving_with_itself_rejects() {
    let mut interp = Interp::new(Limits::default());
    let promise = Promise::pending();
    promise.resolve(&mut interp, promise.clone().into_value()).unwrap();
    let Some(Err(reason)) = promise.outcome() else { panic!("expected rejection") };
    assert_eq!(reason.to_js_string(), "TypeError: Chaining cycle detected for promise");
}

#[test]
fn async_functions_return_settled_promises() {
    let env = run(r"
const double = async (n) => (await n) * 2;
let result;
double(Promise.resolve(21)).then(v => { result = v; });
const fail = async () => { throw new Error('nope'); };
let caught;
fail().catch(e => { caught = e.message; });
");
    assert_eq!(text(&env, "result"), "42");
    assert_eq!(text(&env, "caught"), "nope");
}

#[test]
fn awaiting_a_rejection_throws_into_the_async_body() {
    let env = run(r"
let outcome;
const load = async () => {
  try { await Promise.reject(new Error('offline')); } catch (e) { return 'recovered: ' + e.message; }
};
load().then(v => { outcome = v; });
");
    assert_eq!(text(&env, "outcome"), "recovered: offline");
}

#[test]
fn awaiting_a_pending_promise_rejects_with_an_explanation() {
    let env = run(r"
let reason;
const wait = async () => { await new Promise(() => {}); };
wait().catch(e => { reason = e.message; });
");
    assert_eq!(text(&env, "reason"), PENDING_AWAIT);
}

#[test]
fn all_collects_in_input_order_and_fails_fast() {
    let env = run(r"
let values;
let failure;
Promise.all([1, Promise.resolve(2), async () => 3].map(x => typeof x === 'function' ? x() : x))
  .then(v => { values = v.join(','); });
Promise.all([Promise.resolve(1), Promise.reject('bad')]).catch(e => { failure = e; });
let empty;
Promise.all([]).then(v => { empty = v.length; });
");
    assert_eq!(text(&env, "values"), "1,2,3");
    assert_eq!(text(&env, "failure"), "bad");
    assert_eq!(text(&env, "empty"), "0");
}

#[test]
fn finally_passes_the_outcome_through() {
    let env = run(r"
const log = [];
let value;
Promise.resolve('v').finally(() => log.push('f')).then(v => { value = v; });
let reason;
Promise.reject('r').finally(() => log.push('g')).catch(e => { reason = e; });
const joined = log.join('');
");
    assert_eq!(text(&env, "value"), "v");
    assert_eq!(text(&env, "reason"), "r");
    assert_eq!(text(&env, "joined"), "fg");
}

#[test]
fn executor_throw_rejects_and_rejection_is_visible() {
    let env = run("const p = new Promise(() => { throw 'boom'; });");
    let promise = env.lookup_own("p").unwrap();
    assert_eq!(rejection(&promise).map(|r| r.to_js_string()).as_deref(), Some("boom"));
    assert!(rejection(&Value::from(1.0)).is_none());
}
