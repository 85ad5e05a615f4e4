//! Built-in objects and methods available to generated code.
//!
//! The language runtime generated components lean on: property access on
//! primitives, array and string methods, `Math`, `JSON`, `Object`, `Array`,
//! `Number`, `String`, `Date`, `RegExp`, `Promise`, error constructors,
//! `console`. Timers register on the unit's [`TimerQueue`] and fire only
//! when the host advances its virtual clock.
//!
//! Dates use UTC throughout.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use super::interp::{Env, Interp};
use super::promise;
use super::regexp::RegExp;
use super::timers::{FRAME_MS, TimerQueue};
use super::value::*;

const MAX_ARRAY_GROWTH: usize = 1 << 20;

// =============================================================================
// PROPERTY ACCESS
// =============================================================================

/// Read `target[key]`.
///
/// # Errors
///
/// `TypeError` when reading from `null` or `undefined`.
pub fn get_property(target: &Value, key: &str) -> JsResult {
    match target {
        Value::Undefined | Value::Null => Err(Throw::type_error(format!(
            "Cannot read properties of {} (reading '{key}')",
            target.to_js_string()
        ))),
        Value::Array(items) => Ok(match key {
            "length" => Value::from(items.len()),
            _ => match key.parse::<usize>() {
                Ok(i) => items.get(i),
                Err(_) => array_method(items, key).unwrap_or_default(),
            },
        }),
        Value::Str(s) => Ok(match key {
            "length" => Value::from(s.chars().count()),
            _ => match key.parse::<usize>() {
                Ok(i) => s.chars().nth(i).map(|c| Value::from(c.to_string())).unwrap_or_default(),
                Err(_) => string_method(s, key).unwrap_or_default(),
            },
        }),
        Value::Number(n) => Ok(number_method(*n, key).unwrap_or_default()),
        Value::Bool(b) => {
            let b = *b;
            Ok(if key == "toString" { method(key, move |_, _| Ok(Value::from(b.to_string()))) } else { Value::Undefined })
        }
        Value::Object(obj) => Ok(match obj.get(key) {
            Some(value) => value,
            None => object_method(obj, key).unwrap_or_default(),
        }),
        Value::Function(f) => Ok(match f.get(key) {
            Some(value) => value,
            None if key == "name" => Value::from(f.name()),
            None => Value::Undefined,
        }),
        Value::Element(el) => Ok(match key {
            "props" => Value::Object(el.props.clone()),
            "type" => match &el.kind {
                ElementType::Host(tag) => Value::from(tag.as_str()),
                ElementType::Component(f) => Value::Function(f.clone()),
            },
            "key" => el.key.clone().map_or(Value::Null, Value::from),
            _ => Value::Undefined,
        }),
    }
}

/// Write `target[key] = value`.
///
/// # Errors
///
/// `TypeError` on `null`/`undefined`, `RangeError` for absurd array growth.
pub fn set_property(target: &Value, key: &str, value: Value) -> JsResult<()> {
    match target {
        Value::Undefined | Value::Null => Err(Throw::type_error(format!(
            "Cannot set properties of {} (setting '{key}')",
            target.to_js_string()
        ))),
        Value::Array(items) => {
            if key == "length" {
                let len = value.to_number();
                let len = checked_index(len, items.len()).ok_or_else(|| Throw::range_error("Invalid array length"))?;
                items.with_mut(|v| v.resize(len, Value::Undefined));
            } else if let Ok(i) = key.parse::<usize>() {
                if i > items.len() + MAX_ARRAY_GROWTH {
                    return Err(Throw::range_error("Invalid array length"));
                }
                items.set(i, value);
            }
            Ok(())
        }
        Value::Object(obj) => {
            if key == "lastIndex" {
                if let ObjectClass::RegExp(re) = obj.class() {
                    re.set_last_index(value.to_number().max(0.0) as usize);
                    return Ok(());
                }
            }
            obj.set(key, value);
            Ok(())
        }
        Value::Function(f) => {
            f.set(key, value);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn checked_index(n: f64, current: usize) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0 && n <= (current + MAX_ARRAY_GROWTH) as f64).then_some(n as usize)
}

/// Enumerable own `(key, value)` pairs, as used by spread and `Object.*`.
#[must_use]
pub fn own_entries(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(obj) => obj.entries(),
        Value::Array(items) => items.snapshot().into_iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
        Value::Str(s) => s.chars().enumerate().map(|(i, c)| (i.to_string(), Value::from(c.to_string()))).collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn method(name: &str, f: impl Fn(&mut Interp, &[Value]) -> JsResult + Send + Sync + 'static) -> Value {
    Value::Function(Function::native(name, move |interp, _this, args| f(interp, args)))
}

fn native(name: &str, f: impl Fn(&mut Interp, &[Value]) -> JsResult + Send + Sync + 'static) -> Function {
    Function::native(name, move |interp, _this, args| f(interp, args))
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn callback(args: &[Value], i: usize) -> JsResult {
    let f = arg(args, i);
    if matches!(f, Value::Function(_)) {
        Ok(f)
    } else {
        Err(Throw::type_error(format!("{} is not a function", f.inspect())))
    }
}

/// Resolve a relative index argument (`slice`, `splice`, `at`) against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 { (len as f64 + n).max(0.0) as usize } else { n.min(len as f64) as usize }
}

fn char_index(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

fn as_regexp(value: &Value) -> Option<Arc<RegExp>> {
    match value {
        Value::Object(obj) => match obj.class() {
            ObjectClass::RegExp(re) => Some(re),
            _ => None,
        },
        _ => None,
    }
}

/// A `RegExp` argument as-is, anything else compiled as a pattern.
fn coerce_regexp(value: &Value, flags: &str) -> JsResult<Arc<RegExp>> {
    match as_regexp(value) {
        Some(re) => Ok(re),
        None => {
            let source = match value {
                Value::Undefined => "(?:)".to_owned(),
                other => other.to_js_string(),
            };
            RegExp::new(&source, flags).map(Arc::new)
        }
    }
}

// =============================================================================
// ARRAY METHODS
// =============================================================================

#[allow(clippy::too_many_lines)]
fn array_method(arr: &Array, key: &str) -> Option<Value> {
    let a = arr.clone();
    let this = Value::Array(arr.clone());
    let call_each = move |interp: &mut Interp, f: &Value, v: Value, i: usize, this: &Value| {
        interp.call(f, Value::Undefined, &[v, Value::from(i), this.clone()])
    };
    Some(match key {
        "map" => method(key, move |interp, args| {
            let f = callback(args, 0)?;
            let mut out = Vec::with_capacity(a.len());
            for (i, v) in a.snapshot().into_iter().enumerate() {
                out.push(call_each(interp, &f, v, i, &this)?);
            }
            Ok(Value::from(out))
        }),
        "filter" => method(key, move |interp, args| {
            let f = callback(args, 0)?;
            let mut out = Vec::new();
            for (i, v) in a.snapshot().into_iter().enumerate() {
                if call_each(interp, &f, v.clone(), i, &this)?.truthy() {
                    out.push(v);
                }
            }
            Ok(Value::from(out))
        }),
        "forEach" => method(key, move |interp, args| {
            let f = callback(args, 0)?;
            for (i, v) in a.snapshot().into_iter().enumerate() {
                call_each(interp, &f, v, i, &this)?;
            }
            Ok(Value::Undefined)
        }),
        "flatMap" => method(key, move |interp, args| {
            let f = callback(args, 0)?;
            let mut out = Vec::new();
            for (i, v) in a.snapshot().into_iter().enumerate() {
                match call_each(interp, &f, v, i, &this)? {
                    Value::Array(inner) => out.extend(inner.snapshot()),
                    other => out.push(other),
                }
            }
            Ok(Value::from(out))
        }),
        "reduce" | "reduceRight" => {
            let right = key == "reduceRight";
            method(key, move |interp, args| {
                let f = callback(args, 0)?;
                let mut items: Vec<(usize, Value)> = a.snapshot().into_iter().enumerate().collect();
                if right {
                    items.reverse();
                }
                let mut items = items.into_iter();
                let mut acc = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => match items.next() {
                        Some((_, first)) => first,
                        None => return Err(Throw::type_error("Reduce of empty array with no initial value")),
                    },
                };
                for (i, v) in items {
                    acc = interp.call(&f, Value::Undefined, &[acc, v, Value::from(i), this.clone()])?;
                }
                Ok(acc)
            })
        }
        "find" | "findIndex" | "findLast" | "findLastIndex" => {
            let last = key.starts_with("findLast");
            let want_index = key.ends_with("Index");
            method(key, move |interp, args| {
                let f = callback(args, 0)?;
                let mut items: Vec<(usize, Value)> = a.snapshot().into_iter().enumerate().collect();
                if last {
                    items.reverse();
                }
                for (i, v) in items {
                    if call_each(interp, &f, v.clone(), i, &this)?.truthy() {
                        return Ok(if want_index { Value::from(i) } else { v });
                    }
                }
                Ok(if want_index { Value::Number(-1.0) } else { Value::Undefined })
            })
        }
        "some" | "every" => {
            let every = key == "every";
            method(key, move |interp, args| {
                let f = callback(args, 0)?;
                for (i, v) in a.snapshot().into_iter().enumerate() {
                    if call_each(interp, &f, v, i, &this)?.truthy() != every {
                        return Ok(Value::Bool(!every));
                    }
                }
                Ok(Value::Bool(every))
            })
        }
        "includes" => method(key, move |_, args| {
            let needle = arg(args, 0);
            Ok(Value::Bool(a.snapshot().iter().any(|v| v.same_value(&needle))))
        }),
        "indexOf" | "lastIndexOf" => {
            let last = key == "lastIndexOf";
            method(key, move |_, args| {
                let needle = arg(args, 0);
                let items = a.snapshot();
                let found = if last {
                    items.iter().rposition(|v| v.strict_equals(&needle))
                } else {
                    items.iter().position(|v| v.strict_equals(&needle))
                };
                Ok(found.map_or(Value::Number(-1.0), Value::from))
            })
        }
        "join" => method(key, move |_, args| {
            let sep = match arg(args, 0) {
                Value::Undefined => ",".to_owned(),
                other => other.to_js_string(),
            };
            let parts: Vec<String> =
                a.snapshot().iter().map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() }).collect();
            Ok(Value::from(parts.join(&sep)))
        }),
        "toString" => method(key, move |_, _| Ok(Value::from(Value::Array(a.clone()).to_js_string()))),
        "slice" => method(key, move |_, args| {
            let items = a.snapshot();
            let start = relative_index(&arg(args, 0), items.len(), 0);
            let end = relative_index(&arg(args, 1), items.len(), items.len());
            Ok(Value::from(if start < end { items[start..end].to_vec() } else { Vec::new() }))
        }),
        "concat" => method(key, move |_, args| {
            let mut items = a.snapshot();
            for extra in args {
                match extra {
                    Value::Array(more) => items.extend(more.snapshot()),
                    other => items.push(other.clone()),
                }
            }
            Ok(Value::from(items))
        }),
        "push" => method(key, move |_, args| {
            Ok(Value::from(a.with_mut(|items| {
                items.extend(args.iter().cloned());
                items.len()
            })))
        }),
        "pop" => method(key, move |_, _| Ok(a.with_mut(Vec::pop).unwrap_or_default())),
        "shift" => method(key, move |_, _| {
            Ok(a.with_mut(|items| if items.is_empty() { Value::Undefined } else { items.remove(0) }))
        }),
        "unshift" => method(key, move |_, args| {
            Ok(Value::from(a.with_mut(|items| {
                items.splice(0..0, args.iter().cloned());
                items.len()
            })))
        }),
        "splice" => method(key, move |_, args| {
            let removed = a.with_mut(|items| {
                let len = items.len();
                let start = relative_index(&arg(args, 0), len, 0);
                let count = match args.get(1) {
                    None => len - start,
                    Some(n) => {
                        let n = n.to_number();
                        if n.is_nan() || n <= 0.0 { 0 } else { (n.trunc() as usize).min(len - start) }
                    }
                };
                let insert: Vec<Value> = args.iter().skip(2).cloned().collect();
                items.splice(start..start + count, insert).collect::<Vec<_>>()
            });
            Ok(Value::from(removed))
        }),
        "reverse" => method(key, move |_, _| {
            a.with_mut(|items| items.reverse());
            Ok(Value::Array(a.clone()))
        }),
        "toReversed" => method(key, move |_, _| {
            let mut items = a.snapshot();
            items.reverse();
            Ok(Value::from(items))
        }),
        "sort" | "toSorted" => {
            let in_place = key == "sort";
            method(key, move |interp, args| {
                let cmp = arg(args, 0);
                let sorted = merge_sort(interp, a.snapshot(), &cmp)?;
                if in_place {
                    a.with_mut(|items| *items = sorted);
                    Ok(Value::Array(a.clone()))
                } else {
                    Ok(Value::from(sorted))
                }
            })
        }
        "flat" => method(key, move |_, args| {
            let depth = match arg(args, 0) {
                Value::Undefined => 1,
                d => d.to_number().max(0.0).min(32.0) as usize,
            };
            Ok(Value::from(flatten(a.snapshot(), depth)))
        }),
        "fill" => method(key, move |_, args| {
            let value = arg(args, 0);
            a.with_mut(|items| {
                let len = items.len();
                let start = relative_index(&arg(args, 1), len, 0);
                let end = relative_index(&arg(args, 2), len, len);
                for slot in items.iter_mut().take(end).skip(start) {
                    *slot = value.clone();
                }
            });
            Ok(Value::Array(a.clone()))
        }),
        "at" => method(key, move |_, args| {
            let len = a.len();
            let n = arg(args, 0).to_number();
            let i = if n < 0.0 { len as f64 + n.trunc() } else { n.trunc() };
            Ok(if i >= 0.0 && !i.is_nan() { a.get(i as usize) } else { Value::Undefined })
        }),
        "keys" => method(key, move |_, _| Ok(Value::from((0..a.len()).map(Value::from).collect::<Vec<_>>()))),
        "entries" => method(key, move |_, _| {
            Ok(Value::from(
                a.snapshot()
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| Value::from(vec![Value::from(i), v]))
                    .collect::<Vec<_>>(),
            ))
        }),
        _ => return None,
    })
}

fn flatten(items: Vec<Value>, depth: usize) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => out.extend(flatten(inner.snapshot(), depth - 1)),
            other => out.push(other),
        }
    }
    out
}

fn compare_values(interp: &mut Interp, cmp: &Value, a: &Value, b: &Value) -> JsResult<Ordering> {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => return Ok(Ordering::Equal),
        (Value::Undefined, _) => return Ok(Ordering::Greater),
        (_, Value::Undefined) => return Ok(Ordering::Less),
        _ => {}
    }
    if matches!(cmp, Value::Undefined) {
        return Ok(a.to_js_string().cmp(&b.to_js_string()));
    }
    let n = interp.call(cmp, Value::Undefined, &[a.clone(), b.clone()])?.to_number();
    Ok(if n < 0.0 {
        Ordering::Less
    } else if n > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    })
}

/// Stable merge sort with a comparator that may throw.
fn merge_sort(interp: &mut Interp, mut items: Vec<Value>, cmp: &Value) -> JsResult<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interp, items, cmp)?;
    let right = merge_sort(interp, right, cmp)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (l.peek(), r.peek()) {
        if compare_values(interp, cmp, a, b)? == Ordering::Greater {
            out.extend(r.next());
        } else {
            out.extend(l.next());
        }
    }
    out.extend(l);
    out.extend(r);
    Ok(out)
}

// =============================================================================
// STRING METHODS
// =============================================================================

#[allow(clippy::too_many_lines)]
fn string_method(s: &Arc<str>, key: &str) -> Option<Value> {
    let s = s.clone();
    Some(match key {
        "toUpperCase" | "toLocaleUpperCase" => method(key, move |_, _| Ok(Value::from(s.to_uppercase()))),
        "toLowerCase" | "toLocaleLowerCase" => method(key, move |_, _| Ok(Value::from(s.to_lowercase()))),
        "trim" => method(key, move |_, _| Ok(Value::from(s.trim()))),
        "trimStart" => method(key, move |_, _| Ok(Value::from(s.trim_start()))),
        "trimEnd" => method(key, move |_, _| Ok(Value::from(s.trim_end()))),
        "toString" | "valueOf" => method(key, move |_, _| Ok(Value::Str(s.clone()))),
        "split" => method(key, move |_, args| {
            if let Some(re) = as_regexp(&arg(args, 0)) {
                let limit = match arg(args, 1) {
                    Value::Undefined => None,
                    limit => Some(limit.to_number().max(0.0) as usize),
                };
                return Ok(Value::from(re.split(&s, limit)));
            }
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::Str(s.clone())],
                sep => {
                    let sep = sep.to_js_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Value::from(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::from).collect()
                    }
                }
            };
            let parts = match arg(args, 1) {
                Value::Undefined => parts,
                limit => parts.into_iter().take(limit.to_number().max(0.0) as usize).collect(),
            };
            Ok(Value::from(parts))
        }),
        "includes" => method(key, move |_, args| Ok(Value::Bool(s.contains(arg(args, 0).to_js_string().as_str())))),
        "startsWith" => method(key, move |_, args| Ok(Value::Bool(s.starts_with(arg(args, 0).to_js_string().as_str())))),
        "endsWith" => method(key, move |_, args| Ok(Value::Bool(s.ends_with(arg(args, 0).to_js_string().as_str())))),
        "indexOf" => method(key, move |_, args| {
            let needle = arg(args, 0).to_js_string();
            Ok(s.find(needle.as_str()).map_or(Value::Number(-1.0), |b| Value::from(char_index(&s, b))))
        }),
        "lastIndexOf" => method(key, move |_, args| {
            let needle = arg(args, 0).to_js_string();
            Ok(s.rfind(needle.as_str()).map_or(Value::Number(-1.0), |b| Value::from(char_index(&s, b))))
        }),
        "slice" | "substring" => {
            let substring = key == "substring";
            method(key, move |_, args| {
                let len = s.chars().count();
                let (mut start, mut end) = if substring {
                    let clamp = |v: Value, d: usize| {
                        if matches!(v, Value::Undefined) { d } else { relative_index(&Value::Number(v.to_number().max(0.0)), len, d) }
                    };
                    (clamp(arg(args, 0), 0), clamp(arg(args, 1), len))
                } else {
                    (relative_index(&arg(args, 0), len, 0), relative_index(&arg(args, 1), len, len))
                };
                if substring && start > end {
                    std::mem::swap(&mut start, &mut end);
                }
                Ok(Value::from(if start < end { s.chars().skip(start).take(end - start).collect::<String>() } else { String::new() }))
            })
        }
        "charAt" => method(key, move |_, args| {
            let i = arg(args, 0).to_number().max(0.0) as usize;
            Ok(Value::from(s.chars().nth(i).map(String::from).unwrap_or_default()))
        }),
        "charCodeAt" => method(key, move |_, args| {
            let i = arg(args, 0).to_number().max(0.0) as usize;
            Ok(s.chars().nth(i).map_or(Value::Number(f64::NAN), |c| Value::Number(f64::from(u32::from(c)))))
        }),
        "at" => method(key, move |_, args| {
            let chars: Vec<char> = s.chars().collect();
            let i = relative_index(&arg(args, 0), chars.len(), 0);
            Ok(chars.get(i).map(|c| Value::from(c.to_string())).unwrap_or_default())
        }),
        "repeat" => method(key, move |_, args| {
            let n = arg(args, 0).to_number();
            if !(0.0..=10_000.0).contains(&n) {
                return Err(Throw::range_error(format!("Invalid count value: {}", format_number(n))));
            }
            Ok(Value::from(s.repeat(n as usize)))
        }),
        "padStart" | "padEnd" => {
            let start = key == "padStart";
            method(key, move |_, args| {
                let target = arg(args, 0).to_number().clamp(0.0, 10_000.0) as usize;
                let fill = match arg(args, 1) {
                    Value::Undefined => " ".to_owned(),
                    f => f.to_js_string(),
                };
                let len = s.chars().count();
                if target <= len || fill.is_empty() {
                    return Ok(Value::Str(s.clone()));
                }
                let pad: String = fill.chars().cycle().take(target - len).collect();
                Ok(Value::from(if start { format!("{pad}{s}") } else { format!("{s}{pad}") }))
            })
        }
        "replace" | "replaceAll" => {
            let all = key == "replaceAll";
            method(key, move |interp, args| {
                let replacement = arg(args, 1);
                if let Some(re) = as_regexp(&arg(args, 0)) {
                    if all && !re.global() {
                        return Err(Throw::type_error("replaceAll must be called with a global RegExp"));
                    }
                    return re.replace(interp, &s, &replacement).map(Value::from);
                }
                let pattern = arg(args, 0).to_js_string();
                let positions: Vec<usize> = match (pattern.is_empty(), all) {
                    (true, true) => (0..=s.len()).filter(|i| s.is_char_boundary(*i)).collect(),
                    (true, false) => vec![0],
                    (false, true) => s.match_indices(pattern.as_str()).map(|(i, _)| i).collect(),
                    (false, false) => s.find(pattern.as_str()).into_iter().collect(),
                };
                let mut out = String::new();
                let mut last = 0;
                for at in positions {
                    out.push_str(&s[last..at]);
                    let piece = match &replacement {
                        Value::Function(_) => {
                            let found = [Value::from(pattern.as_str()), Value::from(char_index(&s, at)), Value::Str(s.clone())];
                            interp.call(&replacement, Value::Undefined, &found)?.to_js_string()
                        }
                        other => other.to_js_string(),
                    };
                    out.push_str(&piece);
                    last = at + pattern.len();
                }
                out.push_str(&s[last..]);
                Ok(Value::from(out))
            })
        }
        "match" => method(key, move |_, args| Ok(coerce_regexp(&arg(args, 0), "")?.match_in(&s))),
        "matchAll" => method(key, move |_, args| coerce_regexp(&arg(args, 0), "g")?.match_all(&s)),
        "search" => method(key, move |_, args| Ok(Value::Number(coerce_regexp(&arg(args, 0), "")?.search(&s)))),
        "concat" => method(key, move |_, args| {
            let mut out = s.to_string();
            for a in args {
                out.push_str(&a.to_js_string());
            }
            Ok(Value::from(out))
        }),
        "localeCompare" => method(key, move |_, args| {
            let other = arg(args, 0).to_js_string();
            Ok(Value::Number(match s.as_ref().cmp(other.as_str()) {
                Ordering::Less => -1.0,
                Ordering::Equal => 0.0,
                Ordering::Greater => 1.0,
            }))
        }),
        _ => return None,
    })
}

// =============================================================================
// NUMBER AND OBJECT METHODS
// =============================================================================

fn number_method(n: f64, key: &str) -> Option<Value> {
    Some(match key {
        "toFixed" => method(key, move |_, args| {
            let digits = arg(args, 0).to_number();
            if !(0.0..=100.0).contains(&digits) && !digits.is_nan() {
                return Err(Throw::range_error("toFixed() digits argument must be between 0 and 100"));
            }
            if !n.is_finite() {
                return Ok(Value::from(format_number(n)));
            }
            let digits = if digits.is_nan() { 0 } else { digits as usize };
            Ok(Value::from(format!("{n:.digits$}")))
        }),
        "toString" => method(key, move |_, args| {
            let radix = match arg(args, 0) {
                Value::Undefined => 10,
                r => r.to_number() as u32,
            };
            Ok(Value::from(to_radix_string(n, radix)))
        }),
        "toLocaleString" => method(key, move |_, _| Ok(Value::from(locale_number(n)))),
        "toPrecision" => method(key, move |_, args| {
            let p = arg(args, 0).to_number().clamp(1.0, 100.0) as i32;
            if !n.is_finite() || n == 0.0 {
                return Ok(Value::from(format_number(n)));
            }
            let exp = n.abs().log10().floor() as i32;
            let decimals = (p - 1 - exp).max(0) as usize;
            Ok(Value::from(format!("{n:.decimals$}")))
        }),
        "valueOf" => method(key, move |_, _| Ok(Value::Number(n))),
        _ => return None,
    })
}

fn to_radix_string(n: f64, radix: u32) -> String {
    if radix == 10 || !(2..=36).contains(&radix) || n.fract() != 0.0 || !n.is_finite() || n.abs() > 9e15 {
        return format_number(n);
    }
    let mut value = n.abs() as u64;
    if value == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let d = (value % u64::from(radix)) as u32;
        digits.push(char::from_digit(d, radix).unwrap_or('0'));
        value /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/// `en-US` grouping with at most three fraction digits.
fn locale_number(n: f64) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let fixed = format!("{:.3}", n.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let frac = frac.trim_end_matches('0');
    let mut grouped = String::new();
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if n < 0.0 && (int != "0" || !frac.is_empty()) { "-" } else { "" };
    if frac.is_empty() { format!("{sign}{grouped}") } else { format!("{sign}{grouped}.{frac}") }
}

fn object_method(obj: &Object, key: &str) -> Option<Value> {
    match obj.class() {
        ObjectClass::Date(t) => return date_method(t, key),
        ObjectClass::RegExp(re) => return regexp_member(re, key),
        ObjectClass::Promise(p) => return promise::method(&p, key),
        ObjectClass::Plain | ObjectClass::Error => {}
    }
    let o = obj.clone();
    Some(match key {
        "hasOwnProperty" => method(key, move |_, args| Ok(Value::Bool(o.has(&arg(args, 0).to_property_key())))),
        "toString" => method(key, move |_, _| Ok(Value::from(Value::Object(o.clone()).to_js_string()))),
        _ => return None,
    })
}

fn regexp_member(re: Arc<RegExp>, key: &str) -> Option<Value> {
    Some(match key {
        "source" => Value::from(re.source()),
        "flags" => Value::from(re.flags()),
        "global" => Value::Bool(re.global()),
        "ignoreCase" => Value::Bool(re.flags().contains('i')),
        "multiline" => Value::Bool(re.flags().contains('m')),
        "lastIndex" => Value::from(re.last_index()),
        "test" => method(key, move |_, args| Ok(Value::Bool(re.test(&arg(args, 0).to_js_string())))),
        "exec" => method(key, move |_, args| Ok(re.exec(&arg(args, 0).to_js_string()))),
        "toString" => method(key, move |_, _| Ok(Value::from(format!("/{}/{}", re.source(), re.flags())))),
        _ => return None,
    })
}

// =============================================================================
// DATES
// =============================================================================

struct Civil {
    year: i64,
    month: u32,
    day: u32,
    weekday: u32,
    hour: u32,
    minute: u32,
    second: u32,
    millis: u32,
}

fn civil(t: f64) -> Civil {
    let ms = t as i64;
    let days = ms.div_euclid(86_400_000);
    let in_day = ms.rem_euclid(86_400_000) as u32;
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    Civil {
        year,
        month,
        day,
        weekday: (days + 4).rem_euclid(7) as u32,
        hour: in_day / 3_600_000,
        minute: in_day / 60_000 % 60,
        second: in_day / 1000 % 60,
        millis: in_day % 1000,
    }
}

fn days_from_civil(year: i64, month: i64, day: i64) -> f64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    (era * 146_097 + doe - 719_468) as f64
}

/// `Date.prototype.toISOString` output, or `Invalid Date`.
#[must_use]
pub fn iso_string(t: f64) -> String {
    if !t.is_finite() {
        return "Invalid Date".into();
    }
    let c = civil(t);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        c.year, c.month, c.day, c.hour, c.minute, c.second, c.millis
    )
}

fn twelve_hour(c: &Civil) -> String {
    let hour = match c.hour % 12 {
        0 => 12,
        h => h,
    };
    let meridiem = if c.hour < 12 { "AM" } else { "PM" };
    format!("{hour}:{:02}:{:02} {meridiem}", c.minute, c.second)
}

fn now_millis() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0.0, |d| d.as_millis() as f64)
}

fn date_value(t: f64) -> Value {
    Value::Object(Object::with_class(ObjectClass::Date(t)))
}

fn parse_date(text: &str) -> f64 {
    let text = text.trim();
    let (date, time) = text.split_once(['T', ' ']).unwrap_or((text, ""));
    let mut parts = date.splitn(3, '-').map(str::parse::<i64>);
    let (Some(Ok(year)), Some(Ok(month)), Some(Ok(day))) = (parts.next(), parts.next(), parts.next()) else {
        return f64::NAN;
    };
    let time = time.trim_end_matches('Z');
    let mut hms = time.split(':').map(|p| p.parse::<f64>().unwrap_or(0.0));
    let (h, m, s) = (hms.next().unwrap_or(0.0), hms.next().unwrap_or(0.0), hms.next().unwrap_or(0.0));
    days_from_civil(year, month, day) * 86_400_000.0 + h * 3_600_000.0 + m * 60_000.0 + (s * 1000.0).round()
}

fn construct_date(args: &[Value]) -> f64 {
    match args {
        [] => now_millis(),
        [Value::Str(s)] => parse_date(s),
        [single] => single.to_number(),
        [year, month, rest @ ..] => {
            let field = |i: usize, default: f64| rest.get(i).map_or(default, Value::to_number);
            let (year, month) = (year.to_number(), month.to_number());
            if !year.is_finite() || !month.is_finite() {
                return f64::NAN;
            }
            let y = year as i64 + (month as i64).div_euclid(12);
            let m = (month as i64).rem_euclid(12) + 1;
            days_from_civil(y, m, 1) * 86_400_000.0
                + (field(0, 1.0) - 1.0) * 86_400_000.0
                + field(1, 0.0) * 3_600_000.0
                + field(2, 0.0) * 60_000.0
                + field(3, 0.0) * 1000.0
                + field(4, 0.0)
        }
    }
}

fn date_method(t: f64, key: &str) -> Option<Value> {
    let field = move |f: fn(&Civil) -> f64| -> Value {
        if t.is_finite() { Value::Number(f(&civil(t))) } else { Value::Number(f64::NAN) }
    };
    let text = move |f: fn(&Civil) -> String| -> Value {
        if t.is_finite() { Value::from(f(&civil(t))) } else { Value::from("Invalid Date") }
    };
    let value = match key {
        "getTime" | "valueOf" => Value::Number(t),
        "getFullYear" | "getUTCFullYear" => field(|c| c.year as f64),
        "getMonth" | "getUTCMonth" => field(|c| f64::from(c.month - 1)),
        "getDate" | "getUTCDate" => field(|c| f64::from(c.day)),
        "getDay" | "getUTCDay" => field(|c| f64::from(c.weekday)),
        "getHours" | "getUTCHours" => field(|c| f64::from(c.hour)),
        "getMinutes" | "getUTCMinutes" => field(|c| f64::from(c.minute)),
        "getSeconds" | "getUTCSeconds" => field(|c| f64::from(c.second)),
        "getMilliseconds" | "getUTCMilliseconds" => field(|c| f64::from(c.millis)),
        "toISOString" | "toJSON" | "toString" => Value::from(iso_string(t)),
        "toLocaleDateString" | "toDateString" => text(|c| format!("{}/{}/{}", c.month, c.day, c.year)),
        "toLocaleTimeString" | "toTimeString" => text(twelve_hour),
        "toLocaleString" => text(|c| format!("{}/{}/{}, {}", c.month, c.day, c.year, twelve_hour(c))),
        _ => return None,
    };
    Some(method(key, move |_, _| Ok(value.clone())))
}

// =============================================================================
// GLOBALS
// =============================================================================

fn math_object() -> Object {
    let unary = |name: &str, f: fn(f64) -> f64| -> (String, Value) {
        (name.to_owned(), method(name, move |_, args| Ok(Value::Number(f(arg(args, 0).to_number())))))
    };
    let math = Object::from_entries([
        unary("abs", f64::abs),
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        unary("round", |x| (x + 0.5).floor()),
        unary("trunc", f64::trunc),
        unary("sign", |x| if x == 0.0 || x.is_nan() { x } else { x.signum() }),
        unary("sqrt", f64::sqrt),
        unary("cbrt", f64::cbrt),
        unary("sin", f64::sin),
        unary("cos", f64::cos),
        unary("tan", f64::tan),
        unary("asin", f64::asin),
        unary("acos", f64::acos),
        unary("atan", f64::atan),
        unary("log", f64::ln),
        unary("log2", f64::log2),
        unary("log10", f64::log10),
        unary("exp", f64::exp),
    ]);
    math.set("PI", Value::Number(std::f64::consts::PI));
    math.set("E", Value::Number(std::f64::consts::E));
    math.set("pow", method("pow", |_, args| Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())))));
    math.set("atan2", method("atan2", |_, args| Ok(Value::Number(arg(args, 0).to_number().atan2(arg(args, 1).to_number())))));
    math.set(
        "hypot",
        method("hypot", |_, args| Ok(Value::Number(args.iter().map(|a| a.to_number().powi(2)).sum::<f64>().sqrt()))),
    );
    math.set(
        "min",
        method("min", |_, args| {
            Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::INFINITY, |a, b| if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) })))
        }),
    );
    math.set(
        "max",
        method("max", |_, args| {
            Ok(Value::Number(
                args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |a, b| if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) }),
            ))
        }),
    );
    math.set(
        "random",
        method("random", |_, _| {
            let bits = (uuid::Uuid::new_v4().as_u128() >> 75) as u64;
            Ok(Value::Number(bits as f64 / (1u64 << 53) as f64))
        }),
    );
    math
}

fn json_object() -> Object {
    let json = Object::new();
    json.set(
        "stringify",
        method("stringify", |_, args| {
            let Some(tree) = arg(args, 0).to_json() else { return Ok(Value::Undefined) };
            let indent = match arg(args, 2) {
                Value::Number(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
                Value::Str(s) => s.chars().take(10).collect(),
                _ => String::new(),
            };
            if indent.is_empty() {
                return Ok(Value::from(tree.to_string()));
            }
            let mut out = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
            serde::Serialize::serialize(&tree, &mut serializer).map_err(|e| Throw::type_error(e.to_string()))?;
            Ok(Value::from(String::from_utf8_lossy(&out).into_owned()))
        }),
    );
    json.set(
        "parse",
        method("parse", |_, args| {
            let text = arg(args, 0).to_js_string();
            serde_json::from_str::<serde_json::Value>(&text)
                .map(|tree| Value::from_json(&tree))
                .map_err(|e| Throw::error("SyntaxError", e.to_string()))
        }),
    );
    json
}

fn object_constructor() -> Function {
    native("Object", |_, args| {
        Ok(match arg(args, 0) {
            v @ (Value::Object(_) | Value::Array(_) | Value::Function(_)) => v,
            _ => Value::Object(Object::new()),
        })
    })
    .with("keys", method("keys", |_, args| {
        Ok(Value::from(own_entries(&arg(args, 0)).into_iter().map(|(k, _)| Value::from(k)).collect::<Vec<_>>()))
    }))
    .with("values", method("values", |_, args| {
        Ok(Value::from(own_entries(&arg(args, 0)).into_iter().map(|(_, v)| v).collect::<Vec<_>>()))
    }))
    .with("entries", method("entries", |_, args| {
        Ok(Value::from(
            own_entries(&arg(args, 0))
                .into_iter()
                .map(|(k, v)| Value::from(vec![Value::from(k), v]))
                .collect::<Vec<_>>(),
        ))
    }))
    .with("assign", method("assign", |_, args| {
        let target = arg(args, 0);
        for source in args.iter().skip(1) {
            for (k, v) in own_entries(source) {
                set_property(&target, &k, v)?;
            }
        }
        Ok(target)
    }))
    .with("fromEntries", method("fromEntries", |_, args| {
        let Value::Array(pairs) = arg(args, 0) else {
            return Err(Throw::type_error("Object.fromEntries requires an iterable"));
        };
        let obj = Object::new();
        for pair in pairs.snapshot() {
            obj.set(get_property(&pair, "0")?.to_property_key(), get_property(&pair, "1")?);
        }
        Ok(Value::Object(obj))
    }))
    .with("freeze", method("freeze", |_, args| Ok(arg(args, 0))))
    .with("is", method("is", |_, args| Ok(Value::Bool(arg(args, 0).same_value(&arg(args, 1))))))
}

fn array_constructor() -> Function {
    native("Array", |_, args| {
        Ok(match args {
            [Value::Number(n)] => {
                let len = checked_index(*n, 0).ok_or_else(|| Throw::range_error("Invalid array length"))?;
                Value::from(vec![Value::Undefined; len])
            }
            _ => Value::from(args.to_vec()),
        })
    })
    .with("isArray", method("isArray", |_, args| Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))))
    .with("of", method("of", |_, args| Ok(Value::from(args.to_vec()))))
    .with("from", method("from", |interp, args| {
        let source = arg(args, 0);
        let items = match &source {
            Value::Array(items) => items.snapshot(),
            Value::Str(s) => s.chars().map(|c| Value::from(c.to_string())).collect(),
            Value::Object(obj) => {
                let len = obj.get("length").map_or(0.0, |l| l.to_number());
                let len = checked_index(len.max(0.0).trunc(), 0).ok_or_else(|| Throw::range_error("Invalid array length"))?;
                (0..len).map(|i| obj.get(&i.to_string()).unwrap_or_default()).collect()
            }
            _ => Vec::new(),
        };
        let map = arg(args, 1);
        if matches!(map, Value::Undefined) {
            return Ok(Value::from(items));
        }
        let mut out = Vec::with_capacity(items.len());
        for (i, v) in items.into_iter().enumerate() {
            out.push(interp.call(&map, Value::Undefined, &[v, Value::from(i)])?);
        }
        Ok(Value::from(out))
    }))
}

fn parse_int(text: &str, radix: &Value) -> f64 {
    let t = text.trim_start();
    let (negative, t) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let mut radix = match radix {
        Value::Undefined => 0,
        r => r.to_number() as u32,
    };
    let mut t = t;
    if (radix == 0 || radix == 16) && (t.starts_with("0x") || t.starts_with("0X")) {
        t = &t[2..];
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: Vec<u32> = t.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits.iter().fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(*d));
    if negative { -value } else { value }
}

fn parse_float(text: &str) -> f64 {
    let t = text.trim_start();
    let bytes = t.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end = 1;
    }
    if t[end..].starts_with("Infinity") {
        return if t.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &t[digits_start..end] == "." {
        return f64::NAN;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'-' | b'+')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    t[..end].parse::<f64>().unwrap_or(f64::NAN)
}

fn number_constructor() -> Function {
    native("Number", |_, args| Ok(Value::Number(args.first().map_or(0.0, Value::to_number))))
        .with("isInteger", method("isInteger", |_, args| {
            Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0)))
        }))
        .with("isFinite", method("isFinite", |_, args| Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite())))))
        .with("isNaN", method("isNaN", |_, args| Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_nan())))))
        .with("parseFloat", method("parseFloat", |_, args| Ok(Value::Number(parse_float(&arg(args, 0).to_js_string())))))
        .with("parseInt", method("parseInt", |_, args| Ok(Value::Number(parse_int(&arg(args, 0).to_js_string(), &arg(args, 1))))))
        .with("MAX_SAFE_INTEGER", 9_007_199_254_740_991.0)
        .with("MIN_SAFE_INTEGER", -9_007_199_254_740_991.0)
        .with("EPSILON", f64::EPSILON)
        .with("MAX_VALUE", f64::MAX)
}

fn console_object() -> Object {
    let console = Object::new();
    for level in ["log", "info", "warn", "error", "debug"] {
        console.set(
            level,
            method(level, move |_, args| {
                let line = args.iter().map(Value::inspect).collect::<Vec<_>>().join(" ");
                match level {
                    "warn" | "error" => warn!(target: "sandbox::console", %line, "console.{level}"),
                    "info" => info!(target: "sandbox::console", %line, "console.info"),
                    _ => debug!(target: "sandbox::console", %line, "console.{level}"),
                }
                Ok(Value::Undefined)
            }),
        );
    }
    console
}

fn regexp_constructor() -> Function {
    native("RegExp", |_, args| {
        let pattern = arg(args, 0);
        let (source, own_flags) = match as_regexp(&pattern) {
            Some(re) => (re.source().to_owned(), re.flags().to_owned()),
            None if matches!(pattern, Value::Undefined) => ("(?:)".to_owned(), String::new()),
            None => (pattern.to_js_string(), String::new()),
        };
        let flags = match arg(args, 1) {
            Value::Undefined => own_flags,
            flags => flags.to_js_string(),
        };
        RegExp::new(&source, &flags).map(RegExp::into_value)
    })
}

fn install_timers(env: &Env, timers: &TimerQueue) {
    for name in ["setTimeout", "setInterval", "requestAnimationFrame"] {
        let timers = timers.clone();
        env.declare(
            name,
            method(name, move |_, args| {
                let callback = callback(args, 0)?;
                let (delay, extra) = match name {
                    "requestAnimationFrame" => (FRAME_MS, Vec::new()),
                    _ => (arg(args, 1).to_number(), args.get(2..).map(<[Value]>::to_vec).unwrap_or_default()),
                };
                let id = timers.schedule(callback, delay, name == "setInterval", extra);
                debug!(target: "sandbox::timers", timer = id, delay, at = timers.now(), "{name} registered");
                Ok(Value::Number(id as f64))
            }),
            false,
        );
    }
    for name in ["clearTimeout", "clearInterval", "cancelAnimationFrame"] {
        let timers = timers.clone();
        env.declare(
            name,
            method(name, move |_, args| {
                let id = arg(args, 0).to_number();
                if id.is_finite() && id >= 1.0 {
                    timers.clear(id as u64);
                }
                Ok(Value::Undefined)
            }),
            false,
        );
    }
}

/// Declare the language built-ins in `env`. Timer globals register on
/// `timers`.
pub fn install_globals(env: &Env, timers: &TimerQueue) {
    env.declare("Math", Value::Object(math_object()), false);
    env.declare("JSON", Value::Object(json_object()), false);
    env.declare("console", Value::Object(console_object()), false);
    env.declare("Object", Value::Function(object_constructor()), false);
    env.declare("Array", Value::Function(array_constructor()), false);
    env.declare("Number", Value::Function(number_constructor()), false);
    env.declare("NaN", Value::Number(f64::NAN), false);
    env.declare("Infinity", Value::Number(f64::INFINITY), false);

    let string = native("String", |_, args| Ok(Value::from(args.first().map(Value::to_js_string).unwrap_or_default())))
        .with("fromCharCode", method("fromCharCode", |_, args| {
            let text: String = args.iter().filter_map(|a| char::from_u32(a.to_number() as u32)).collect();
            Ok(Value::from(text))
        }));
    env.declare("String", Value::Function(string), false);
    env.declare("Boolean", method("Boolean", |_, args| Ok(Value::Bool(arg(args, 0).truthy()))), false);
    env.declare(
        "parseInt",
        method("parseInt", |_, args| Ok(Value::Number(parse_int(&arg(args, 0).to_js_string(), &arg(args, 1))))),
        false,
    );
    env.declare("parseFloat", method("parseFloat", |_, args| Ok(Value::Number(parse_float(&arg(args, 0).to_js_string())))), false);
    env.declare("isNaN", method("isNaN", |_, args| Ok(Value::Bool(arg(args, 0).to_number().is_nan()))), false);
    env.declare("isFinite", method("isFinite", |_, args| Ok(Value::Bool(arg(args, 0).to_number().is_finite()))), false);

    for name in ["Error", "TypeError", "RangeError", "SyntaxError", "ReferenceError"] {
        env.declare(
            name,
            method(name, move |_, args| {
                let message = match arg(args, 0) {
                    Value::Undefined => String::new(),
                    m => m.to_js_string(),
                };
                Ok(error_value(name, message))
            }),
            false,
        );
    }

    let date = native("Date", |_, args| Ok(date_value(construct_date(args))))
        .with("now", method("now", |_, _| Ok(Value::Number(now_millis()))))
        .with("UTC", method("UTC", |_, args| {
            Ok(Value::Number(match args {
                [year] => construct_date(&[year.clone(), Value::Number(0.0)]),
                _ => construct_date(args),
            }))
        }));
    env.declare("Date", Value::Function(date), false);
    env.declare("RegExp", Value::Function(regexp_constructor()), false);
    env.declare("Promise", Value::Function(promise::constructor()), false);
    install_timers(env, timers);
}

#[cfg(test)]
#[path = "intrinsics_test.rs"]
mod tests;
