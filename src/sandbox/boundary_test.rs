use super::*;
use crate::sandbox::SandboxCompiler;

const COUNTER: &str = r"
const Component = () => {
  const [count, setCount] = useState(0);
  return <button onClick={() => setCount(count + 1)}>{count}</button>;
};
";

const CRASH_IN_EFFECT: &str = r"
const Component = () => {
  useEffect(() => { throw new Error('effect exploded'); }, []);
  return <p>never shown</p>;
};
";

fn displaying(compiler: &SandboxCompiler, src: &str) -> RecoveryBoundary {
    let mut boundary = RecoveryBoundary::new("primary");
    boundary.begin_compiling();
    boundary.render(&compiler.compile(src).unwrap()).unwrap();
    boundary
}

#[test]
fn new_boundary_is_empty() {
    let boundary = RecoveryBoundary::new("primary");
    let view = boundary.view();
    assert_eq!(view.state, SlotState::Empty);
    assert!(view.html.is_none());
    assert!(view.error.is_none());
}

#[test]
fn displays_compiled_unit() {
    let compiler = SandboxCompiler::default();
    let boundary = displaying(&compiler, COUNTER);
    let view = boundary.view();
    assert_eq!(view.state, SlotState::Displaying);
    assert_eq!(view.html.as_deref(), Some(r#"<button data-on-click="h0">0</button>"#));
    assert_eq!(view.tree.len(), 1);
}

#[test]
fn transform_failure_shows_compilation_surface() {
    let compiler = SandboxCompiler::default();
    let mut boundary = RecoveryBoundary::new("primary");
    boundary.begin_compiling();
    assert_eq!(boundary.state(), SlotState::Compiling);

    let err = compiler.compile("const Component = () => { return <div>;").unwrap_err();
    boundary.fail_compile(err);
    let view = boundary.view();
    assert_eq!(view.state, SlotState::TransformFailed);
    let surface = view.error.unwrap();
    assert_eq!(surface.title, "Compilation Error");
    assert!(surface.message.starts_with("Transform error: "));
    assert!(view.generation.is_none());
}

#[test]
fn execution_failure_shows_compilation_surface() {
    let compiler = SandboxCompiler::default();
    let mut boundary = RecoveryBoundary::new("primary");
    boundary.fail_compile(compiler.compile("const Widget = () => null;").unwrap_err());
    assert_eq!(boundary.state(), SlotState::ExecutionFailed);
    assert_eq!(boundary.view().error.unwrap().title, "Compilation Error");
}

#[test]
fn effect_error_is_confined_to_its_boundary() {
    let compiler = SandboxCompiler::default();
    let mut primary = displaying(&compiler, COUNTER);

    let mut visual = RecoveryBoundary::new("visual");
    let err = visual.render(&compiler.compile(CRASH_IN_EFFECT).unwrap()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);

    let view = visual.view();
    assert_eq!(view.state, SlotState::RuntimeFailed);
    assert!(view.html.is_none());
    let surface = view.error.unwrap();
    assert_eq!(surface.title, "Render Error");
    assert_eq!(surface.message, "effect exploded");

    primary.dispatch("h0", &serde_json::json!({})).unwrap();
    assert_eq!(primary.view().html.as_deref(), Some(r#"<button data-on-click="h0">1</button>"#));
}

#[test]
fn handler_error_is_captured() {
    let compiler = SandboxCompiler::default();
    let mut boundary = displaying(
        &compiler,
        "const Component = () => <button onClick={() => { throw new Error('click failed'); }}>go</button>;",
    );
    let err = boundary.dispatch("h0", &serde_json::json!({})).unwrap_err();
    assert!(matches!(err, SlotEventError::Runtime(ref e) if e.message == "click failed"));
    assert_eq!(boundary.state(), SlotState::RuntimeFailed);
    assert!(matches!(boundary.dispatch("h0", &serde_json::json!({})), Err(SlotEventError::NotDisplaying)));
}

#[test]
fn unknown_handler_leaves_slot_displaying() {
    let compiler = SandboxCompiler::default();
    let mut boundary = displaying(&compiler, COUNTER);
    assert!(matches!(boundary.dispatch("h7", &serde_json::json!({})), Err(SlotEventError::UnknownHandler(_))));
    assert_eq!(boundary.state(), SlotState::Displaying);
}

#[test]
fn same_generation_is_a_no_op() {
    let compiler = SandboxCompiler::default();
    let unit = compiler.compile(COUNTER).unwrap();
    let mut boundary = RecoveryBoundary::new("primary");
    boundary.render(&unit).unwrap();
    boundary.dispatch("h0", &serde_json::json!({})).unwrap();
    boundary.render(&unit).unwrap();
    assert_eq!(boundary.view().html.as_deref(), Some(r#"<button data-on-click="h0">1</button>"#));

    let crash = compiler.compile(CRASH_IN_EFFECT).unwrap();
    boundary.render(&crash).unwrap_err();
    let again = boundary.render(&crash).unwrap_err();
    assert_eq!(again.message, "effect exploded");
    assert_eq!(boundary.state(), SlotState::RuntimeFailed);
}

#[test]
fn new_generation_with_identical_source_mounts_fresh() {
    let compiler = SandboxCompiler::default();
    let mut boundary = displaying(&compiler, COUNTER);
    boundary.dispatch("h0", &serde_json::json!({})).unwrap();

    let next = compiler.compile(COUNTER).unwrap();
    boundary.render(&next).unwrap();
    let view = boundary.view();
    assert_eq!(view.generation, Some(next.key));
    assert_eq!(view.html.as_deref(), Some(r#"<button data-on-click="h0">0</button>"#));
}

#[test]
fn new_generation_clears_captured_error() {
    let compiler = SandboxCompiler::default();
    let mut boundary = RecoveryBoundary::new("visual");
    boundary.render(&compiler.compile(CRASH_IN_EFFECT).unwrap()).unwrap_err();
    boundary.render(&compiler.compile(COUNTER).unwrap()).unwrap();
    let view = boundary.view();
    assert_eq!(view.state, SlotState::Displaying);
    assert!(view.error.is_none());
}

#[test]
fn unmount_on_replace_runs_cleanups() {
    let compiler = SandboxCompiler::default();
    let unit = compiler
        .compile(
            r"
const seen = [];
const Component = () => {
  useEffect(() => () => seen.push('cleanup'), []);
  return <div>{seen.length}</div>;
};
",
        )
        .unwrap();
    let mut boundary = RecoveryBoundary::new("primary");
    boundary.render(&unit).unwrap();
    boundary.reset();
    assert_eq!(boundary.state(), SlotState::Empty);

    // Module state belongs to the unit, so a remount of the same unit sees the cleanup.
    let mut again = RecoveryBoundary::new("primary");
    again.render(&unit).unwrap();
    assert_eq!(again.view().html.as_deref(), Some("<div>1</div>"));
}

#[test]
fn moderate_recursion_renders() {
    let compiler = SandboxCompiler::default();
    let boundary = displaying(
        &compiler,
        "const f = n => n <= 0 ? 0 : 1 + f(n - 1);\nconst Component = () => <p>{f(200)}</p>;",
    );
    assert_eq!(boundary.view().html.as_deref(), Some("<p>200</p>"));
}

#[test]
fn unbounded_recursion_is_captured() {
    let compiler = SandboxCompiler::default();
    let unit = compiler.compile("const f = n => f(n + 1);\nconst Component = () => <p>{f(0)}</p>;").unwrap();
    let mut boundary = RecoveryBoundary::new("primary");
    let err = boundary.render(&unit).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.message, "Maximum call stack size exceeded");
    assert_eq!(boundary.state(), SlotState::RuntimeFailed);
}

#[test]
fn timers_advance_the_displayed_component() {
    let compiler = SandboxCompiler::default();
    let mut boundary = displaying(
        &compiler,
        r"
const Component = () => {
  const [done, setDone] = useState(false);
  useEffect(() => { setTimeout(() => setDone(true), 1500); }, []);
  return <p>{done ? 'done' : 'running'}</p>;
};
",
    );
    assert_eq!(boundary.view().pending_timers, 1);
    assert_eq!(boundary.advance(1000.0).unwrap(), 0);
    assert_eq!(boundary.advance(500.0).unwrap(), 1);
    let view = boundary.view();
    assert_eq!(view.html.as_deref(), Some("<p>done</p>"));
    assert_eq!(view.pending_timers, 0);
}

#[test]
fn throwing_timer_is_captured_as_runtime_error() {
    let compiler = SandboxCompiler::default();
    let mut boundary = displaying(
        &compiler,
        "const Component = () => { useEffect(() => { setInterval(() => { throw new Error('tick failed'); }, 10); }, []); return <p />; };",
    );
    let err = boundary.advance(10.0).unwrap_err();
    assert!(matches!(err, SlotEventError::Runtime(ref e) if e.message == "tick failed"));
    assert_eq!(boundary.state(), SlotState::RuntimeFailed);
    assert!(matches!(boundary.advance(10.0), Err(SlotEventError::NotDisplaying)));
}
