use super::*;
use crate::sandbox::interp::Limits;
use crate::sandbox::timers::TimerQueue;
use crate::sandbox::intrinsics::install_globals;
use crate::sandbox::parse::parse;

fn module(src: &str) -> Env {
    let globals = Env::root();
    install_globals(&globals, &TimerQueue::default());
    let capabilities = globals.child(true);
    install(&capabilities);
    let module = capabilities.child(true);
    Interp::new(Limits::default()).run_program(&parse(src).unwrap(), &module).unwrap();
    module
}

fn lookup(env: &Env, name: &str) -> Value {
    env.lookup(name).unwrap_or_default()
}

struct Harness {
    interp: Interp,
    store: HookStore,
    dirty: Arc<AtomicBool>,
    mounted: bool,
}

impl Harness {
    fn new() -> Self {
        Self {
            interp: Interp::new(Limits::default()),
            store: HookStore::default(),
            dirty: Arc::new(AtomicBool::new(false)),
            mounted: false,
        }
    }

    /// Call `component` as one render of a single instance.
    fn render(&mut self, component: &Value, props: Value) -> (JsResult, Vec<PendingEffect>) {
        self.interp.frame = Some(HookFrame::new(self.store.clone(), !self.mounted, self.dirty.clone()));
        let out = self.interp.call(component, Value::Undefined, &[props]);
        let frame = self.interp.frame.take();
        self.mounted = true;
        (out, frame.map(|f| f.effects).unwrap_or_default())
    }
}

fn props(n: f64) -> Value {
    Value::Object(Object::from_entries([("n".to_owned(), Value::from(n))]))
}

#[test]
fn factory_scope_binds_exactly_the_capabilities() {
    let env = module("const kinds = [typeof React, typeof useState, typeof useEffect, typeof useCallback, typeof useMemo, typeof useRef, typeof require, typeof fetch];");
    assert_eq!(
        lookup(&env, "kinds").to_js_string(),
        "object,function,function,function,function,function,undefined,undefined"
    );
    assert_eq!(CAPABILITY_NAMES.len(), 6);
}

#[test]
fn create_element_extracts_key_and_children() {
    let env = module("const el = React.createElement('li', { key: 7, id: 'a' }, 'x', 'y');");
    let Value::Element(element) = lookup(&env, "el") else { panic!("expected element") };
    assert_eq!(element.key.as_deref(), Some("7"));
    assert!(!element.props.has("key"));
    assert_eq!(element.props.get("id").unwrap().to_js_string(), "a");
    assert_eq!(element.props.get("children").unwrap().to_js_string(), "x,y");
    assert_eq!(element.type_name(), "li");
}

#[test]
fn single_child_is_not_wrapped() {
    let env = module("const el = React.createElement('p', null, 'only');");
    let Value::Element(element) = lookup(&env, "el") else { panic!("expected element") };
    assert!(matches!(element.props.get("children"), Some(Value::Str(s)) if &*s == "only"));
}

#[test]
fn invalid_element_type_throws() {
    let globals = Env::root();
    install_globals(&globals, &TimerQueue::default());
    install(&globals);
    let program = parse("React.createElement(undefined, null);").unwrap();
    let err = Interp::new(Limits::default()).run_program(&program, &globals).unwrap_err();
    assert!(err.message().starts_with("Element type is invalid"));
    assert!(err.message().ends_with("got: undefined"));
}

#[test]
fn state_setter_is_stable_and_marks_dirty_on_change() {
    let env = module("function C() { return useState(() => 1); }");
    let component = lookup(&env, "C");
    let mut harness = Harness::new();

    let (first, _) = harness.render(&component, Value::Undefined);
    let Value::Array(first) = first.unwrap() else { panic!("expected pair") };
    assert_eq!(first.get(0).to_number(), 1.0);
    let setter = first.get(1);

    harness.interp.call(&setter, Value::Undefined, &[Value::from(1.0)]).unwrap();
    assert!(!harness.dirty.load(Ordering::SeqCst));

    let add = Value::Function(Function::native("add", |_, _, args| Ok(Value::from(args[0].to_number() + 41.0))));
    harness.interp.call(&setter, Value::Undefined, &[add]).unwrap();
    assert!(harness.dirty.load(Ordering::SeqCst));

    let (second, _) = harness.render(&component, Value::Undefined);
    let Value::Array(second) = second.unwrap() else { panic!("expected pair") };
    assert_eq!(second.get(0).to_number(), 42.0);
    assert!(second.get(1).strict_equals(&setter));
}

#[test]
fn memo_recomputes_only_when_deps_change() {
    let env = module("let calls = 0; function C(props) { return useMemo(() => { calls++; return props.n * 2; }, [props.n]); }");
    let component = lookup(&env, "C");
    let mut harness = Harness::new();

    assert_eq!(harness.render(&component, props(1.0)).0.unwrap().to_number(), 2.0);
    assert_eq!(harness.render(&component, props(1.0)).0.unwrap().to_number(), 2.0);
    assert_eq!(lookup(&env, "calls").to_number(), 1.0);
    assert_eq!(harness.render(&component, props(2.0)).0.unwrap().to_number(), 4.0);
    assert_eq!(lookup(&env, "calls").to_number(), 2.0);
}

#[test]
fn callback_identity_follows_deps() {
    let env = module("function C(props) { return useCallback(() => props.n, [props.n]); }");
    let component = lookup(&env, "C");
    let mut harness = Harness::new();

    let a = harness.render(&component, props(1.0)).0.unwrap();
    let b = harness.render(&component, props(1.0)).0.unwrap();
    let c = harness.render(&component, props(2.0)).0.unwrap();
    assert!(a.strict_equals(&b));
    assert!(!b.strict_equals(&c));
}

#[test]
fn effects_schedule_on_mount_and_dep_change_only() {
    let env = module("function C(props) { useEffect(() => {}, [props.n]); useEffect(() => {}); return null; }");
    let component = lookup(&env, "C");
    let mut harness = Harness::new();

    assert_eq!(harness.render(&component, props(1.0)).1.len(), 2);
    assert_eq!(harness.render(&component, props(1.0)).1.len(), 1);
    assert_eq!(harness.render(&component, props(3.0)).1.len(), 2);
}

#[test]
fn ref_object_persists_across_renders() {
    let env = module("function C() { const r = useRef(0); r.current++; return r; }");
    let component = lookup(&env, "C");
    let mut harness = Harness::new();

    let first = harness.render(&component, Value::Undefined).0.unwrap();
    let second = harness.render(&component, Value::Undefined).0.unwrap();
    assert!(first.strict_equals(&second));
    let Value::Object(cell) = second else { panic!("expected ref object") };
    assert_eq!(cell.get("current").unwrap().to_number(), 2.0);
}

#[test]
fn reducer_dispatch_applies_latest_reducer() {
    let env = module("function C() { return React.useReducer((s, a) => s + a, 10); }");
    let component = lookup(&env, "C");
    let mut harness = Harness::new();

    let Value::Array(pair) = harness.render(&component, Value::Undefined).0.unwrap() else { panic!("expected pair") };
    harness.interp.call(&pair.get(1), Value::Undefined, &[Value::from(5.0)]).unwrap();
    assert!(harness.dirty.load(Ordering::SeqCst));
    let Value::Array(pair) = harness.render(&component, Value::Undefined).0.unwrap() else { panic!("expected pair") };
    assert_eq!(pair.get(0).to_number(), 15.0);
}

#[test]
fn extra_hook_after_mount_is_rejected() {
    let env = module("function C(props) { useState(0); if (props.n > 1) { useRef(null); } return null; }");
    let component = lookup(&env, "C");
    let mut harness = Harness::new();

    harness.render(&component, props(1.0)).0.unwrap();
    let err = harness.render(&component, props(2.0)).0.unwrap_err();
    assert_eq!(err.message(), "Rendered more hooks than during the previous render.");
}

#[test]
fn hook_kind_change_is_rejected() {
    let env = module("function C(props) { if (props.n > 1) { useRef(0); } else { useState(0); } return null; }");
    let component = lookup(&env, "C");
    let mut harness = Harness::new();

    harness.render(&component, props(1.0)).0.unwrap();
    let err = harness.render(&component, props(2.0)).0.unwrap_err();
    assert!(err.message().contains("change in the order of Hooks"));
}

#[test]
fn setter_outliving_its_instance_is_a_no_op() {
    let env = module("function C() { return useState(0)[1]; }");
    let component = lookup(&env, "C");
    let mut harness = Harness::new();
    let setter = harness.render(&component, Value::Undefined).0.unwrap();

    let dirty = harness.dirty.clone();
    let mut interp = Interp::new(Limits::default());
    drop(harness);
    interp.call(&setter, Value::Undefined, &[Value::from(5.0)]).unwrap();
    assert!(!dirty.load(Ordering::SeqCst));
}
