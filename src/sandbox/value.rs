//! Runtime values of the sandbox interpreter.
//!
//! DESIGN
//! ======
//! Compiled units are stored in shared session state and cross `.await`
//! points, so every value is `Send + Sync`: reference types are
//! `Arc<parking_lot::Mutex<_>>` and native functions are boxed
//! `dyn Fn + Send + Sync` behind the function's `Arc`.
//! Identity comparisons (`===` on objects, hook dependency checks) use
//! pointer equality of the shared allocation.
//!
//! Locks are never held across a call back into the interpreter.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::ast::FunctionDef;
use super::interp::{Env, Interp};
use super::promise::Promise;
use super::regexp::RegExp;

// =============================================================================
// THROW
// =============================================================================

/// A thrown value unwinding through the interpreter.
#[derive(Clone)]
pub struct Throw(pub Value);

pub type JsResult<T = Value> = Result<T, Throw>;

impl Throw {
    #[must_use]
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        Self(error_value(name, message))
    }

    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::error("TypeError", message)
    }

    #[must_use]
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::error("ReferenceError", message)
    }

    #[must_use]
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::error("RangeError", message)
    }

    /// Human-readable message: an error object's `message`, otherwise the
    /// thrown value converted to a string.
    #[must_use]
    pub fn message(&self) -> String {
        if let Value::Object(obj) = &self.0 {
            if obj.class() == ObjectClass::Error {
                return obj.get("message").map(|m| m.to_js_string()).unwrap_or_default();
            }
        }
        self.0.to_js_string()
    }

    /// `Name: message` for error objects, same as [`Throw::message`] otherwise.
    #[must_use]
    pub fn describe(&self) -> String {
        if let Value::Object(obj) = &self.0 {
            if obj.class() == ObjectClass::Error {
                return self.0.to_js_string();
            }
        }
        self.message()
    }
}

impl fmt::Debug for Throw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Throw({})", self.describe())
    }
}

/// Build an error object with `name` and `message` properties.
#[must_use]
pub fn error_value(name: &str, message: impl Into<String>) -> Value {
    let message: String = message.into();
    let obj = Object::with_class(ObjectClass::Error);
    obj.set("name", Value::from(name));
    obj.set("message", Value::from(message));
    Value::Object(obj)
}

// =============================================================================
// VALUE
// =============================================================================

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Array(Array),
    Object(Object),
    Function(Function),
    Element(Arc<Element>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(Array::new(items))
    }
}

#[allow(clippy::cast_precision_loss)]
impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl Value {
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    #[must_use]
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Function(_) => "function",
            Self::Null | Self::Array(_) | Self::Object(_) | Self::Element(_) => "object",
        }
    }

    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Str(s) => string_to_number(s),
            Self::Array(_) => string_to_number(&self.to_js_string()),
            Self::Object(obj) => match obj.class() {
                ObjectClass::Date(t) => t,
                _ => f64::NAN,
            },
            Self::Function(_) | Self::Element(_) => f64::NAN,
        }
    }

    #[must_use]
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Str(s) => s.to_string(),
            Self::Array(items) => items
                .snapshot()
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(obj) => match obj.class() {
                ObjectClass::Error => {
                    let name = obj.get("name").map_or_else(|| "Error".into(), |n| n.to_js_string());
                    let message = obj.get("message").map(|m| m.to_js_string()).unwrap_or_default();
                    if message.is_empty() { name } else { format!("{name}: {message}") }
                }
                ObjectClass::Date(t) => super::intrinsics::iso_string(t),
                ObjectClass::RegExp(re) => format!("/{}/{}", re.source(), re.flags()),
                ObjectClass::Promise(_) => "[object Promise]".into(),
                ObjectClass::Plain => "[object Object]".into(),
            },
            Self::Function(f) => format!("function {}() {{ [code] }}", f.name()),
            Self::Element(_) => "[object Object]".into(),
        }
    }

    /// Object property key for this value.
    #[must_use]
    pub fn to_property_key(&self) -> String {
        self.to_js_string()
    }

    /// `===`.
    #[must_use]
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a.id() == b.id(),
            (Self::Object(a), Self::Object(b)) => a.id() == b.id(),
            (Self::Function(a), Self::Function(b)) => a.id() == b.id(),
            (Self::Element(a), Self::Element(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`.
    #[must_use]
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Self::Number(_), Self::Str(_) | Self::Bool(_)) | (Self::Str(_) | Self::Bool(_), Self::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Self::Bool(_), Self::Str(_)) | (Self::Str(_), Self::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }

    /// `Object.is`: like `===` except `NaN` equals itself.
    #[must_use]
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    // =========================================================================
    // JSON
    // =========================================================================

    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s.as_str()),
            serde_json::Value::Array(items) => Self::from(items.iter().map(Self::from_json).collect::<Vec<_>>()),
            serde_json::Value::Object(map) => {
                let obj = Object::new();
                for (k, v) in map {
                    obj.set(k, Self::from_json(v));
                }
                Self::Object(obj)
            }
        }
    }

    /// `JSON.stringify` semantics: `None` for values JSON cannot represent.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        self.to_json_depth(0)
    }

    fn to_json_depth(&self, depth: usize) -> Option<serde_json::Value> {
        if depth > 64 {
            return Some(serde_json::Value::Null);
        }
        match self {
            Self::Undefined | Self::Function(_) => None,
            Self::Null => Some(serde_json::Value::Null),
            Self::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Self::Number(n) => Some(serde_json::Number::from_f64(*n).map_or(serde_json::Value::Null, |num| {
                if n.fract() == 0.0 && n.abs() < 9e15 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Value::Number(num)
                }
            })),
            Self::Str(s) => Some(serde_json::Value::String(s.to_string())),
            Self::Array(items) => Some(serde_json::Value::Array(
                items
                    .snapshot()
                    .iter()
                    .map(|v| v.to_json_depth(depth + 1).unwrap_or(serde_json::Value::Null))
                    .collect(),
            )),
            Self::Object(obj) => {
                if let ObjectClass::Date(t) = obj.class() {
                    return Some(serde_json::Value::String(super::intrinsics::iso_string(t)));
                }
                let mut map = serde_json::Map::new();
                for (k, v) in obj.entries() {
                    if let Some(json) = v.to_json_depth(depth + 1) {
                        map.insert(k, json);
                    }
                }
                Some(serde_json::Value::Object(map))
            }
            Self::Element(_) => Some(serde_json::Value::Object(serde_json::Map::new())),
        }
    }

    /// Short developer-facing rendering used by `console.*`.
    #[must_use]
    pub fn inspect(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            Self::Array(_) | Self::Object(_) => {
                self.to_json().map_or_else(|| self.to_js_string(), |json| json.to_string())
            }
            _ => self.to_js_string(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Function(func) => write!(f, "[Function {}]", func.name()),
            Self::Element(el) => write!(f, "<{}>", el.type_name()),
            other => f.write_str(&other.inspect()),
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Format a number the way `String(n)` does.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n == 0.0 {
        return "0".into();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let exp = format!("{n:e}");
        return match exp.split_once('e') {
            Some((mantissa, e)) if !e.starts_with('-') => format!("{mantissa}e+{e}"),
            _ => exp,
        };
    }
    if n.fract() == 0.0 {
        return format!("{n:.0}");
    }
    format!("{n}")
}

// =============================================================================
// REFERENCE TYPES
// =============================================================================

#[derive(Clone, Default)]
pub struct Array(Arc<Mutex<Vec<Value>>>);

impl Array {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self(Arc::new(Mutex::new(items)))
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Value {
        self.0.lock().get(index).cloned().unwrap_or_default()
    }

    pub fn set(&self, index: usize, value: Value) {
        let mut items = self.0.lock();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
    }

    pub fn push(&self, value: Value) {
        self.0.lock().push(value);
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        f(&mut self.0.lock())
    }

    #[must_use]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectClass {
    Plain,
    Error,
    /// Milliseconds since the Unix epoch.
    Date(f64),
    RegExp(Arc<RegExp>),
    Promise(Promise),
}

struct ObjectData {
    props: IndexMap<String, Value>,
    class: ObjectClass,
}

#[derive(Clone)]
pub struct Object(Arc<Mutex<ObjectData>>);

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Object {
    #[must_use]
    pub fn new() -> Self {
        Self::with_class(ObjectClass::Plain)
    }

    #[must_use]
    pub fn with_class(class: ObjectClass) -> Self {
        Self(Arc::new(Mutex::new(ObjectData { props: IndexMap::new(), class })))
    }

    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        let obj = Self::new();
        obj.0.lock().props.extend(entries);
        obj
    }

    #[must_use]
    pub fn class(&self) -> ObjectClass {
        self.0.lock().class.clone()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().props.get(key).cloned()
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.0.lock().props.contains_key(key)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.lock().props.insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.lock().props.shift_remove(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.lock().props.keys().cloned().collect()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0.lock().props.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    #[must_use]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

// =============================================================================
// FUNCTIONS
// =============================================================================

pub type NativeFn = dyn Fn(&mut Interp, &Value, &[Value]) -> JsResult + Send + Sync;

pub enum FunctionKind {
    Closure { def: Arc<FunctionDef>, env: Env },
    Native { name: String, call: Box<NativeFn> },
}

pub struct FunctionData {
    pub kind: FunctionKind,
    props: Mutex<IndexMap<String, Value>>,
}

/// A callable value. Functions carry their own property bag so statics
/// like `Date.now` or `Component.displayName` work.
#[derive(Clone)]
pub struct Function(Arc<FunctionData>);

impl Function {
    #[must_use]
    pub fn closure(def: Arc<FunctionDef>, env: Env) -> Self {
        Self(Arc::new(FunctionData { kind: FunctionKind::Closure { def, env }, props: Mutex::default() }))
    }

    pub fn native(
        name: impl Into<String>,
        call: impl Fn(&mut Interp, &Value, &[Value]) -> JsResult + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(FunctionData {
            kind: FunctionKind::Native { name: name.into(), call: Box::new(call) },
            props: Mutex::default(),
        }))
    }

    #[must_use]
    pub fn kind(&self) -> &FunctionKind {
        &self.0.kind
    }

    #[must_use]
    pub fn name(&self) -> String {
        if let Some(Value::Str(name)) = self.get("name") {
            return name.to_string();
        }
        match &self.0.kind {
            FunctionKind::Closure { def, .. } => def.name.clone().unwrap_or_default(),
            FunctionKind::Native { name, .. } => name.clone(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.props.lock().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.props.lock().insert(key.into(), value);
    }

    /// Attach a static property and return `self`.
    #[must_use]
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

// =============================================================================
// ELEMENTS
// =============================================================================

/// Result of `React.createElement`.
pub struct Element {
    pub kind: ElementType,
    pub props: Object,
    pub key: Option<String>,
}

pub enum ElementType {
    Host(String),
    Component(Function),
}

impl Element {
    #[must_use]
    pub fn type_name(&self) -> String {
        match &self.kind {
            ElementType::Host(tag) => tag.clone(),
            ElementType::Component(f) => {
                let name = f.name();
                if name.is_empty() { "Anonymous".into() } else { name }
            }
        }
    }
}

#[cfg(test)]
#[path = "value_test.rs"]
mod tests;
