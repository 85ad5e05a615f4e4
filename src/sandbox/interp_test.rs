use super::*;
use crate::sandbox::timers::TimerQueue;
use crate::sandbox::parse::parse;

fn run_with(src: &str, limits: Limits) -> (JsResult<()>, Env) {
    crate::sandbox::on_sandbox_stack(|| {
        let program = parse(src).unwrap();
        let env = Env::root();
        intrinsics::install_globals(&env, &TimerQueue::default());
        let module = env.child(true);
        let result = Interp::new(limits).run_program(&program, &module);
        (result, module)
    })
    .unwrap()
}

fn result_of(src: &str) -> Value {
    let (outcome, env) = run_with(src, Limits::default());
    if let Err(thrown) = outcome {
        panic!("program threw: {}", thrown.describe());
    }
    env.lookup_own("result").unwrap_or_default()
}

fn thrown_by(src: &str) -> Throw {
    match run_with(src, Limits::default()).0 {
        Err(thrown) => thrown,
        Ok(()) => panic!("expected a throw"),
    }
}

#[test]
fn closures_capture_their_scope() {
    let result = result_of(
        "function counter() { let n = 0; return () => ++n; }
         const next = counter(); next(); next();
         const result = next();",
    );
    assert_eq!(result.to_number(), 3.0);
}

#[test]
fn function_declarations_are_hoisted() {
    assert_eq!(result_of("const result = twice(4); function twice(x) { return x * 2; }").to_number(), 8.0);
}

#[test]
fn let_in_for_loop_is_per_iteration() {
    let result = result_of(
        "const fns = [];
         for (let i = 0; i < 3; i++) { fns.push(() => i); }
         const result = fns.map(f => f()).join(',');",
    );
    assert_eq!(result.to_js_string(), "0,1,2");
}

#[test]
fn destructuring_with_defaults_and_rest() {
    let result = result_of(
        "const { a, b: { c = 5 } = {}, ...others } = { a: 1, d: 4, e: 5 };
         const [x, , y = 9, ...tail] = [10, 20, undefined, 30, 40];
         const result = [a, c, Object.keys(others).join(''), x, y, tail.length].join('|');",
    );
    assert_eq!(result.to_js_string(), "1|5|de|10|9|2");
}

#[test]
fn spread_in_calls_arrays_and_objects() {
    let result = result_of(
        "const parts = [1, 2];
         const merged = { ...{ a: 1, b: 2 }, b: 3 };
         const result = Math.max(...parts, 0) + [...parts, 3].length + merged.b;",
    );
    assert_eq!(result.to_number(), 8.0);
}

#[test]
fn optional_chaining_and_nullish_coalescing() {
    let result = result_of(
        "const user = { profile: null, greet() { return 'hi'; } };
         const result = [user.profile?.name ?? 'anon', user.missing?.(), user.greet?.()].join(',');",
    );
    assert_eq!(result.to_js_string(), "anon,,hi");
}

#[test]
fn template_literals_interpolate() {
    assert_eq!(result_of("const n = 3; const result = `n=${n + 1}!`;").to_js_string(), "n=4!");
}

#[test]
fn switch_falls_through_until_break() {
    let result = result_of(
        "const seen = [];
         switch (2) { case 1: seen.push(1); case 2: seen.push(2); case 3: seen.push(3); break; default: seen.push(0); }
         const result = seen.join('');",
    );
    assert_eq!(result.to_js_string(), "23");
}

#[test]
fn try_catch_finally_ordering() {
    let result = result_of(
        "const log = [];
         try { log.push('try'); throw new Error('boom'); }
         catch (e) { log.push(e.message); }
         finally { log.push('finally'); }
         const result = log.join(',');",
    );
    assert_eq!(result.to_js_string(), "try,boom,finally");
}

#[test]
fn assignment_to_const_throws_type_error() {
    let thrown = thrown_by("const a = 1; a = 2;");
    assert_eq!(thrown.describe(), "TypeError: Assignment to constant variable.");
}

#[test]
fn unknown_identifier_is_a_reference_error() {
    let thrown = thrown_by("missing + 1;");
    assert_eq!(thrown.describe(), "ReferenceError: missing is not defined");
    assert_eq!(result_of("const result = typeof missing;").to_js_string(), "undefined");
}

#[test]
fn calling_a_non_function_names_the_callee() {
    let thrown = thrown_by("const obj = {}; obj.run();");
    assert_eq!(thrown.message(), "obj.run is not a function");
}

#[test]
fn runaway_loop_exhausts_fuel_and_cannot_be_caught() {
    let (outcome, env) = run_with(
        "let caught = false; try { while (true) {} } catch (e) { caught = true; }",
        Limits { fuel: 10_000, max_call_depth: 64 },
    );
    let thrown = outcome.unwrap_err();
    assert_eq!(thrown.describe(), "RangeError: Execution budget exceeded (possible infinite loop)");
    assert!(!env.lookup_own("caught").unwrap_or_default().truthy());
}

#[test]
fn unbounded_recursion_hits_call_depth() {
    let thrown = thrown_by("function f() { return f(); } f();");
    assert_eq!(thrown.message(), "Maximum call stack size exceeded");
}

#[test]
fn deep_recursion_error_is_catchable() {
    assert!(result_of("function f() { return f(); } let result = false; try { f(); } catch (e) { result = true; }").truthy());
}

#[test]
fn anonymous_functions_take_their_binding_name() {
    let result = result_of("const handleClick = () => {}; const o = { onSave: function () {} }; const result = handleClick.name + o.onSave.name;");
    assert_eq!(result.to_js_string(), "handleClickonSave");
}

#[test]
fn constructors_bind_this() {
    let result = result_of("function Point(x) { this.x = x; } const result = new Point(7).x;");
    assert_eq!(result.to_number(), 7.0);
}

#[test]
fn arrow_functions_are_not_constructors() {
    let thrown = thrown_by("const A = () => {}; new A();");
    assert_eq!(thrown.describe(), "TypeError: A is not a constructor");
}

#[test]
fn compound_and_logical_assignment() {
    let result = result_of("let a = 1; a += 2; a **= 2; let b = null; b ??= 'x'; let c = 0; c ||= 5; const result = `${a}${b}${c}`;");
    assert_eq!(result.to_js_string(), "9x5");
}

#[test]
fn for_of_over_strings_and_arrays() {
    let result = result_of("let out = ''; for (const ch of 'ab') out += ch; for (const [k, v] of [['x', 1]]) out += k + v; const result = out;");
    assert_eq!(result.to_js_string(), "abx1");
}

#[test]
fn hooks_outside_render_are_rejected() {
    let mut interp = Interp::new(Limits::default());
    let err = interp.frame_mut().err().unwrap();
    assert!(err.message().starts_with("Invalid hook call"));
}

#[test]
fn binary_operators_follow_coercion_rules() {
    assert_eq!(binary(BinaryOp::Add, &Value::from("1"), &Value::from(2.0)).to_js_string(), "12");
    assert_eq!(binary(BinaryOp::Sub, &Value::from("5"), &Value::from(2.0)).to_number(), 3.0);
    assert!(binary(BinaryOp::Lt, &Value::from("a"), &Value::from("b")).truthy());
    assert_eq!(binary(BinaryOp::Rem, &Value::from(-7.0), &Value::from(3.0)).to_number(), -1.0);
}
