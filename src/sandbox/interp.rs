//! Tree-walking evaluator for the lowered plain dialect.
//!
//! DESIGN
//! ======
//! An [`Interp`] is a short-lived execution context: one per top-level entry
//! (factory evaluation, render pass, effect, event handler). It carries the
//! fuel and call-depth budget of that entry and the hook frame of the
//! component currently rendering. Lexical scopes ([`Env`]) outlive it inside
//! closures.
//!
//! Running out of fuel raises a `RangeError` that `try`/`catch` inside the
//! generated code cannot swallow.
//!
//! Evaluation recurses on the host stack. Besides the call-depth limit,
//! statement and expression nesting is capped at [`MAX_EVAL_NESTING`] so
//! that deep recursion surfaces as a `RangeError` instead of overflowing the
//! sandbox thread.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::ast::*;
use super::capabilities::HookFrame;
use super::intrinsics;
use super::promise;
use super::regexp::RegExp;
use super::value::{Function, FunctionKind, JsResult, Object, Throw, Value};

/// Nested `exec`/`eval` frames allowed at once, across all active calls.
pub const MAX_EVAL_NESTING: usize = 4096;

const STACK_EXCEEDED: &str = "Maximum call stack size exceeded";

/// Per-invocation execution budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Evaluation steps allowed per top-level entry.
    pub fuel: u64,
    pub max_call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { fuel: 1_000_000, max_call_depth: 256 }
    }
}

// =============================================================================
// ENVIRONMENT
// =============================================================================

struct Binding {
    value: Value,
    mutable: bool,
}

struct Scope {
    vars: Mutex<HashMap<String, Binding>>,
    parent: Option<Env>,
    function: bool,
}

/// A lexical scope chain.
#[derive(Clone)]
pub struct Env(Arc<Scope>);

impl Env {
    #[must_use]
    pub fn root() -> Self {
        Self(Arc::new(Scope { vars: Mutex::default(), parent: None, function: true }))
    }

    #[must_use]
    pub fn child(&self, function: bool) -> Self {
        Self(Arc::new(Scope { vars: Mutex::default(), parent: Some(self.clone()), function }))
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.0.vars.lock().insert(name.to_owned(), Binding { value, mutable });
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.0.vars.lock().get(name) {
                return Some(binding.value.clone());
            }
            scope = scope.0.parent.as_ref()?;
        }
    }

    /// Look up `name` in this scope only.
    #[must_use]
    pub fn lookup_own(&self, name: &str) -> Option<Value> {
        self.0.vars.lock().get(name).map(|b| b.value.clone())
    }

    /// # Errors
    ///
    /// `TypeError` for a `const` binding, `ReferenceError` for an unknown name.
    pub fn assign(&self, name: &str, value: Value) -> JsResult<()> {
        let mut scope = self;
        loop {
            {
                let mut vars = scope.0.vars.lock();
                if let Some(binding) = vars.get_mut(name) {
                    if !binding.mutable {
                        return Err(Throw::type_error("Assignment to constant variable."));
                    }
                    binding.value = value;
                    return Ok(());
                }
            }
            match &scope.0.parent {
                Some(parent) => scope = parent,
                None => return Err(Throw::reference_error(format!("{name} is not defined"))),
            }
        }
    }

    fn function_scope(&self) -> Env {
        let mut scope = self;
        while !scope.0.function {
            match &scope.0.parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope.clone()
    }
}

// =============================================================================
// INTERPRETER
// =============================================================================

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

enum Place {
    Var(String),
    Prop(Value, String),
}

pub struct Interp {
    limits: Limits,
    fuel: u64,
    depth: usize,
    nesting: usize,
    exhausted: bool,
    pub(crate) frame: Option<HookFrame>,
}

impl Interp {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self { limits, fuel: limits.fuel, depth: 0, nesting: 0, exhausted: false, frame: None }
    }

    #[must_use]
    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub(crate) fn frame_mut(&mut self) -> JsResult<&mut HookFrame> {
        self.frame.as_mut().ok_or_else(|| {
            Throw::error("Error", "Invalid hook call. Hooks can only be called inside the body of a function component.")
        })
    }

    fn tick(&mut self) -> JsResult<()> {
        if self.fuel == 0 {
            self.exhausted = true;
            return Err(Throw::range_error("Execution budget exceeded (possible infinite loop)"));
        }
        self.fuel -= 1;
        Ok(())
    }

    /// Whether the fuel ran out. Nothing may catch or convert the error
    /// once this is set.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Run `f` one evaluation level deeper, charging one unit of fuel.
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> JsResult<T>) -> JsResult<T> {
        self.tick()?;
        if self.nesting >= MAX_EVAL_NESTING {
            return Err(Throw::range_error(STACK_EXCEEDED));
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    /// Execute a program's top-level statements in `env`.
    ///
    /// # Errors
    ///
    /// Returns whatever the program throws.
    pub fn run_program(&mut self, program: &Program, env: &Env) -> JsResult<()> {
        self.exec_block(&program.body, env).map(|_| ())
    }

    /// Call `f` with the given receiver and arguments.
    ///
    /// # Errors
    ///
    /// `TypeError` when `f` is not callable, `RangeError` past the call-depth
    /// limit, otherwise whatever the callee throws.
    pub fn call(&mut self, f: &Value, this: Value, args: &[Value]) -> JsResult {
        let Value::Function(func) = f else {
            return Err(Throw::type_error(format!("{} is not a function", f.type_of())));
        };
        if self.depth >= self.limits.max_call_depth {
            return Err(Throw::range_error(STACK_EXCEEDED));
        }
        self.depth += 1;
        let result = match func.kind() {
            FunctionKind::Native { call, .. } => call(self, &this, args),
            FunctionKind::Closure { def, env } if def.is_async => {
                let completed = self.call_closure(def, env, this, args);
                promise::settle_async(self, completed)
            }
            FunctionKind::Closure { def, env } => self.call_closure(def, env, this, args),
        };
        self.depth -= 1;
        result
    }

    /// `new f(...args)`.
    ///
    /// # Errors
    ///
    /// `TypeError` when `f` is not a constructor.
    pub fn construct(&mut self, f: &Value, args: &[Value]) -> JsResult {
        let Value::Function(func) = f else {
            return Err(Throw::type_error(format!("{} is not a constructor", f.type_of())));
        };
        match func.kind() {
            FunctionKind::Native { .. } => self.call(f, Value::Undefined, args),
            FunctionKind::Closure { def, .. } if def.arrow => {
                Err(Throw::type_error(format!("{} is not a constructor", func.name())))
            }
            FunctionKind::Closure { .. } => {
                let instance = Value::Object(Object::new());
                let result = self.call(f, instance.clone(), args)?;
                Ok(match result {
                    Value::Object(_) | Value::Array(_) | Value::Function(_) => result,
                    _ => instance,
                })
            }
        }
    }

    fn call_closure(&mut self, def: &FunctionDef, env: &Env, this: Value, args: &[Value]) -> JsResult {
        let scope = env.child(true);
        if !def.arrow {
            scope.declare("this", this, false);
        }
        for (i, param) in def.params.iter().enumerate() {
            let value = if param.rest {
                Value::from(args.get(i..).map(<[Value]>::to_vec).unwrap_or_default())
            } else {
                args.get(i).cloned().unwrap_or_default()
            };
            let value = match (&param.default, value) {
                (Some(default), Value::Undefined) => self.eval(default, &scope)?,
                (_, value) => value,
            };
            self.bind_pattern(&param.target, value, &scope, true)?;
        }
        match &def.body {
            FunctionBody::Expr(e) => self.eval(e, &scope),
            FunctionBody::Block(body) => match self.exec_block(body, &scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    fn exec_block(&mut self, body: &[Stmt], env: &Env) -> JsResult<Flow> {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    env.declare(name, Value::Function(Function::closure(def.clone(), env.clone())), true);
                }
            }
        }
        for stmt in body {
            let flow = self.exec(stmt, env)?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, env: &Env) -> JsResult<Flow> {
        self.nested(|interp| interp.exec_stmt(stmt, env))
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> JsResult<Flow> {
        match stmt {
            Stmt::Var { kind, decls } => {
                let target_env = if *kind == VarKind::Var { env.function_scope() } else { env.clone() };
                for decl in decls {
                    let value = match &decl.init {
                        Some(init) => self.eval_named(init, &decl.target, env)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(&decl.target, value, &target_env, *kind != VarKind::Const)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Return(arg) => {
                let value = match arg {
                    Some(e) => self.eval(e, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If { test, then, otherwise } => {
                if self.eval(test, env)?.truthy() {
                    self.exec(then, env)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Block(body) => self.exec_block(body, &env.child(false)),
            Stmt::For { init, test, update, body } => {
                self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, env)
            }
            Stmt::ForOf { kind, target, iter, body } => {
                let iterable = self.eval(iter, env)?;
                for item in iterate(&iterable, iter)? {
                    let scope = env.child(false);
                    self.bind_pattern(target, item, &scope, *kind != VarKind::Const)?;
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Continue | Flow::Normal => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::While { test, body } => {
                while self.eval(test, env)?.truthy() {
                    match self.exec(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Continue | Flow::Normal => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Throw(arg) => Err(Throw(self.eval(arg, env)?)),
            Stmt::Try { block, param, handler, finalizer } => {
                self.exec_try(block, param.as_ref(), handler.as_deref(), finalizer.as_deref(), env)
            }
            Stmt::Switch { discriminant, cases } => self.exec_switch(discriminant, cases, env),
            Stmt::Expr(e) => {
                self.eval(e, env)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        env: &Env,
    ) -> JsResult<Flow> {
        let mut scope = env.child(false);
        // `let` loop variables get a fresh binding per iteration so closures
        // created in the body capture that iteration's value.
        let mut per_iteration = Vec::new();
        if let Some(init) = init {
            if let Stmt::Var { kind: VarKind::Let | VarKind::Const, decls } = init {
                for decl in decls {
                    pattern_names(&decl.target, &mut per_iteration);
                }
            }
            self.exec(init, &scope)?;
        }
        loop {
            if let Some(test) = test {
                if !self.eval(test, &scope)?.truthy() {
                    break;
                }
            }
            match self.exec(body, &scope)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Continue | Flow::Normal => {}
            }
            if !per_iteration.is_empty() {
                let next = env.child(false);
                for name in &per_iteration {
                    next.declare(name, scope.lookup_own(name).unwrap_or_default(), true);
                }
                scope = next;
            }
            if let Some(update) = update {
                self.eval(update, &scope)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        param: Option<&Pattern>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
        env: &Env,
    ) -> JsResult<Flow> {
        let result = match (self.exec_block(block, &env.child(false)), handler) {
            (Err(thrown), Some(handler)) if !self.exhausted => {
                let scope = env.child(false);
                match param.map(|p| self.bind_pattern(p, thrown.0, &scope, true)).transpose() {
                    Ok(_) => self.exec_block(handler, &scope),
                    Err(e) => Err(e),
                }
            }
            (result, _) => result,
        };
        if let Some(finalizer) = finalizer {
            if !self.exhausted {
                let flow = self.exec_block(finalizer, &env.child(false))?;
                if !matches!(flow, Flow::Normal) {
                    return Ok(flow);
                }
            }
        }
        result
    }

    fn exec_switch(&mut self, discriminant: &Expr, cases: &[SwitchCase], env: &Env) -> JsResult<Flow> {
        let value = self.eval(discriminant, env)?;
        let scope = env.child(false);
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval(test, &scope)?.strict_equals(&value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let Some(start) = start.or_else(|| cases.iter().position(|c| c.test.is_none())) else {
            return Ok(Flow::Normal);
        };
        for case in &cases[start..] {
            match self.exec_block(&case.body, &scope)? {
                Flow::Normal => {}
                Flow::Break => break,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn bind_pattern(&mut self, pattern: &Pattern, value: Value, env: &Env, mutable: bool) -> JsResult<()> {
        match pattern {
            Pattern::Ident(name) => {
                env.declare(name, value, mutable);
                Ok(())
            }
            Pattern::Array { items, rest } => {
                let values = match &value {
                    Value::Array(a) => a.snapshot(),
                    Value::Str(s) => s.chars().map(|c| Value::from(c.to_string())).collect(),
                    other => return Err(Throw::type_error(format!("{} is not iterable", other.to_js_string()))),
                };
                for (i, item) in items.iter().enumerate() {
                    let Some(item) = item else { continue };
                    let element = values.get(i).cloned().unwrap_or_default();
                    let element = self.apply_default(item, element, env)?;
                    self.bind_pattern(&item.target, element, env, mutable)?;
                }
                if let Some(rest) = rest {
                    let remaining = values.get(items.len()..).map(<[Value]>::to_vec).unwrap_or_default();
                    self.bind_pattern(rest, Value::from(remaining), env, mutable)?;
                }
                Ok(())
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    let first = props.first().map(|(k, _)| k.as_str()).unwrap_or_default();
                    let shown = value.to_js_string();
                    return Err(Throw::type_error(format!(
                        "Cannot destructure property '{first}' of '{shown}' as it is {shown}."
                    )));
                }
                for (key, item) in props {
                    let prop = intrinsics::get_property(&value, key)?;
                    let prop = self.apply_default(item, prop, env)?;
                    self.bind_pattern(&item.target, prop, env, mutable)?;
                }
                if let Some(rest) = rest {
                    let remaining = Object::from_entries(
                        intrinsics::own_entries(&value).into_iter().filter(|(k, _)| !props.iter().any(|(p, _)| p == k)),
                    );
                    self.bind_pattern(rest, Value::Object(remaining), env, mutable)?;
                }
                Ok(())
            }
        }
    }

    fn apply_default(&mut self, item: &PatternItem, value: Value, env: &Env) -> JsResult {
        match (&item.default, value) {
            (Some(default), Value::Undefined) => self.eval(default, env),
            (_, value) => Ok(value),
        }
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    /// Evaluate `expr` in `env`.
    ///
    /// # Errors
    ///
    /// Returns whatever the expression throws.
    pub fn eval(&mut self, expr: &Expr, env: &Env) -> JsResult {
        self.nested(|interp| interp.eval_expr(expr, env))
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Env) -> JsResult {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::from(s.as_str())),
            Expr::Regex { pattern, flags } => RegExp::new(pattern, flags).map(RegExp::into_value),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(e) = exprs.get(i) {
                        out.push_str(&self.eval(e, env)?.to_js_string());
                    }
                }
                Ok(Value::from(out))
            }
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Ident(name) if name == "this" => Ok(env.lookup("this").unwrap_or_default()),
            Expr::Ident(name) => env.lookup(name).ok_or_else(|| Throw::reference_error(format!("{name} is not defined"))),
            Expr::Array(items) => Ok(Value::from(self.eval_spreadables(items, env)?)),
            Expr::Object(props) => self.eval_object(props, env),
            Expr::Function(def) => Ok(Value::Function(Function::closure(def.clone(), env.clone()))),
            Expr::Unary { op, arg } => self.eval_unary(*op, arg, env),
            Expr::Await(arg) => {
                let value = self.eval(arg, env)?;
                promise::await_value(value)
            }
            Expr::Update { op, prefix, target } => {
                let place = self.resolve_place(target, env)?;
                let old = self.read_place(&place, env)?.to_number();
                let new = if *op == UpdateOp::Inc { old + 1.0 } else { old - 1.0 };
                self.write_place(place, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, env)?;
                if short_circuits(*op, &left) { Ok(left) } else { self.eval(right, env) }
            }
            Expr::Conditional { test, consequent, alternate } => {
                if self.eval(test, env)?.truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternate, env)
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value, env),
            Expr::Call { .. } | Expr::Member { .. } => Ok(self.eval_chain(expr, env)?.map(|(_, v)| v).unwrap_or_default()),
            Expr::New { callee, args } => {
                let f = self.eval(callee, env)?;
                let args = self.eval_spreadables(args, env)?;
                if !matches!(f, Value::Function(_)) {
                    return Err(Throw::type_error(format!("{} is not a constructor", describe(callee))));
                }
                self.construct(&f, &args)
            }
            Expr::Jsx(_) => Err(Throw::error("SyntaxError", "JSX must be lowered before evaluation")),
        }
    }

    /// Evaluate an initializer, naming anonymous functions after their binding.
    fn eval_named(&mut self, init: &Expr, target: &Pattern, env: &Env) -> JsResult {
        let value = self.eval(init, env)?;
        if let (Expr::Function(def), Pattern::Ident(name), Value::Function(f)) = (init, target, &value) {
            if def.name.is_none() {
                f.set("name", Value::from(name.as_str()));
            }
        }
        Ok(value)
    }

    fn eval_spreadables(&mut self, items: &[Spreadable], env: &Env) -> JsResult<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Spreadable::Item(e) => out.push(self.eval(e, env)?),
                Spreadable::Spread(e) => {
                    let value = self.eval(e, env)?;
                    out.extend(iterate(&value, e)?);
                }
            }
        }
        Ok(out)
    }

    fn eval_object(&mut self, props: &[PropDef], env: &Env) -> JsResult {
        let obj = Object::new();
        for prop in props {
            match prop {
                PropDef::KeyValue(key, value_expr) => {
                    let key = match key {
                        PropKey::Static(k) => k.clone(),
                        PropKey::Computed(e) => self.eval(e, env)?.to_property_key(),
                    };
                    let value = self.eval(value_expr, env)?;
                    if let (Value::Function(f), Expr::Function(def)) = (&value, value_expr) {
                        if def.name.is_none() {
                            f.set("name", Value::from(key.as_str()));
                        }
                    }
                    obj.set(key, value);
                }
                PropDef::Spread(e) => {
                    let source = self.eval(e, env)?;
                    for (k, v) in intrinsics::own_entries(&source) {
                        obj.set(k, v);
                    }
                }
            }
        }
        Ok(Value::Object(obj))
    }

    fn eval_unary(&mut self, op: UnaryOp, arg: &Expr, env: &Env) -> JsResult {
        if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, arg) {
            if name != "this" && env.lookup(name).is_none() {
                return Ok(Value::from("undefined"));
            }
        }
        let value = self.eval(arg, env)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::TypeOf => Value::from(value.type_of()),
            UnaryOp::Void => Value::Undefined,
        })
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, env: &Env) -> JsResult {
        let place = self.resolve_place(target, env)?;
        let result = match op {
            AssignOp::Assign => {
                let result = self.eval(value, env)?;
                if let (Place::Var(name), Value::Function(f), Expr::Function(def)) = (&place, &result, value) {
                    if def.name.is_none() && f.get("name").is_none() {
                        f.set("name", Value::from(name.as_str()));
                    }
                }
                result
            }
            AssignOp::Compound(bin) => {
                let current = self.read_place(&place, env)?;
                let rhs = self.eval(value, env)?;
                binary(bin, &current, &rhs)
            }
            AssignOp::Logical(logical) => {
                let current = self.read_place(&place, env)?;
                if short_circuits(logical, &current) {
                    return Ok(current);
                }
                self.eval(value, env)?
            }
        };
        self.write_place(place, result.clone(), env)?;
        Ok(result)
    }

    fn resolve_place(&mut self, target: &Expr, env: &Env) -> JsResult<Place> {
        match target {
            Expr::Ident(name) => Ok(Place::Var(name.clone())),
            Expr::Member { object, property, .. } => {
                let object = self.eval(object, env)?;
                let key = self.property_key(property, env)?;
                Ok(Place::Prop(object, key))
            }
            _ => Err(Throw::error("SyntaxError", "Invalid left-hand side in assignment")),
        }
    }

    fn read_place(&mut self, place: &Place, env: &Env) -> JsResult {
        match place {
            Place::Var(name) => env.lookup(name).ok_or_else(|| Throw::reference_error(format!("{name} is not defined"))),
            Place::Prop(object, key) => intrinsics::get_property(object, key),
        }
    }

    fn write_place(&mut self, place: Place, value: Value, env: &Env) -> JsResult<()> {
        match place {
            Place::Var(name) => env.assign(&name, value),
            Place::Prop(object, key) => intrinsics::set_property(&object, &key, value),
        }
    }

    fn property_key(&mut self, property: &MemberProp, env: &Env) -> JsResult<String> {
        match property {
            MemberProp::Static(name) => Ok(name.clone()),
            MemberProp::Computed(e) => Ok(self.eval(e, env)?.to_property_key()),
        }
    }

    /// Evaluate a member/call chain, returning `(receiver, value)`.
    /// `None` means an optional link short-circuited the whole chain.
    fn eval_chain(&mut self, expr: &Expr, env: &Env) -> JsResult<Option<(Value, Value)>> {
        match expr {
            Expr::Member { object, property, optional } => {
                let Some(object) = self.eval_link(object, env)? else { return Ok(None) };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.property_key(property, env)?;
                let value = intrinsics::get_property(&object, &key)?;
                Ok(Some((object, value)))
            }
            Expr::Call { callee, args, optional } => {
                let (this, f) = match &**callee {
                    Expr::Member { .. } | Expr::Call { .. } => match self.eval_chain(callee, env)? {
                        Some(pair) => pair,
                        None => return Ok(None),
                    },
                    other => (Value::Undefined, self.eval(other, env)?),
                };
                if *optional && f.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_spreadables(args, env)?;
                if !matches!(f, Value::Function(_)) {
                    return Err(Throw::type_error(format!("{} is not a function", describe(callee))));
                }
                let result = self.call(&f, this, &args)?;
                Ok(Some((Value::Undefined, result)))
            }
            other => Ok(Some((Value::Undefined, self.eval(other, env)?))),
        }
    }

    fn eval_link(&mut self, expr: &Expr, env: &Env) -> JsResult<Option<Value>> {
        match expr {
            Expr::Member { .. } | Expr::Call { .. } => Ok(self.eval_chain(expr, env)?.map(|(_, v)| v)),
            other => self.eval(other, env).map(Some),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn short_circuits(op: LogicalOp, left: &Value) -> bool {
    match op {
        LogicalOp::And => !left.truthy(),
        LogicalOp::Or => left.truthy(),
        LogicalOp::Nullish => !left.is_nullish(),
    }
}

/// Spread/iteration source as a list of values.
fn iterate(value: &Value, source: &Expr) -> JsResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.snapshot()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        _ => Err(Throw::type_error(format!("{} is not iterable", describe(source)))),
    }
}

fn pattern_names(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Ident(name) => out.push(name.clone()),
        Pattern::Array { items, rest } => {
            for item in items.iter().flatten() {
                pattern_names(&item.target, out);
            }
            if let Some(rest) = rest {
                pattern_names(rest, out);
            }
        }
        Pattern::Object { props, rest } => {
            for (_, item) in props {
                pattern_names(&item.target, out);
            }
            if let Some(rest) = rest {
                pattern_names(rest, out);
            }
        }
    }
}

/// Source-ish rendering of an expression for error messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member { object, property: MemberProp::Static(name), .. } => format!("{}.{name}", describe(object)),
        Expr::Member { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        Expr::Str(_) | Expr::Template { .. } => "string".into(),
        Expr::Number(_) => "number".into(),
        Expr::Null => "null".into(),
        Expr::Undefined => "undefined".into(),
        _ => "expression".into(),
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Element(_) => Value::from(value.to_js_string()),
        other => other.clone(),
    }
}

/// Apply a binary operator.
#[must_use]
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    use std::cmp::Ordering;

    let compare = || -> Option<Ordering> {
        match (left, right) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => left.to_number().partial_cmp(&right.to_number()),
        }
    };
    match op {
        BinaryOp::Add => {
            let (l, r) = (to_primitive(left), to_primitive(right));
            if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
                Value::from(format!("{}{}", l.to_js_string(), r.to_js_string()))
            } else {
                Value::Number(l.to_number() + r.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Pow => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt => Value::Bool(compare() == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare() == Some(Ordering::Greater)),
        BinaryOp::LtEq => Value::Bool(matches!(compare(), Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::GtEq => Value::Bool(matches!(compare(), Some(Ordering::Greater | Ordering::Equal))),
    }
}

#[cfg(test)]
#[path = "interp_test.rs"]
mod tests;
