//! `RegExp` values backed by the `regex` crate.
//!
//! DESIGN
//! ======
//! Patterns are rewritten from ECMAScript spelling where the two dialects
//! only differ in syntax (`\d` and `\w` are ASCII, `\/` is a plain slash,
//! `[^]` is any character). Features the engine does not have, such as
//! look-around and back-references, fail at construction with a
//! `SyntaxError` like any other invalid pattern.
//!
//! Offsets visible to generated code (`lastIndex`, match offsets) count
//! characters, the same unit the string built-ins use.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use regex::{Captures, Regex, RegexBuilder};

use super::interp::Interp;
use super::value::{JsResult, Object, ObjectClass, Throw, Value};

/// Compiled programs larger than this are rejected.
const SIZE_LIMIT: usize = 1 << 20;

pub struct RegExp {
    source: String,
    flags: String,
    regex: Regex,
    last_index: AtomicUsize,
}

impl RegExp {
    /// # Errors
    ///
    /// `SyntaxError` for unknown flags or a pattern the engine rejects.
    pub fn new(source: &str, flags: &str) -> JsResult<Self> {
        if let Some(bad) = flags.chars().find(|f| !"dgimsuvy".contains(*f)) {
            return Err(Throw::error("SyntaxError", format!("Invalid flags supplied to RegExp constructor '{bad}'")));
        }
        let regex = RegexBuilder::new(&translate(source))
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .size_limit(SIZE_LIMIT)
            .build()
            .map_err(|err| {
                let reason = match err {
                    regex::Error::Syntax(_) => "unsupported or malformed pattern",
                    _ => "pattern too large",
                };
                Throw::error("SyntaxError", format!("Invalid regular expression: /{source}/{flags}: {reason}"))
            })?;
        Ok(Self { source: source.to_owned(), flags: flags.to_owned(), regex, last_index: AtomicUsize::new(0) })
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(Object::with_class(ObjectClass::RegExp(Arc::new(self))))
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn flags(&self) -> &str {
        &self.flags
    }

    #[must_use]
    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }

    fn sticky(&self) -> bool {
        self.flags.contains('y')
    }

    #[must_use]
    pub fn last_index(&self) -> usize {
        self.last_index.load(Ordering::Relaxed)
    }

    pub fn set_last_index(&self, index: usize) {
        self.last_index.store(index, Ordering::Relaxed);
    }

    /// `re.exec(s)`: the match and its groups, or `null`. Global and sticky
    /// patterns resume from `lastIndex` and advance it.
    #[must_use]
    pub fn exec(&self, s: &str) -> Value {
        let stateful = self.global() || self.sticky();
        let from = if stateful {
            match byte_offset(s, self.last_index()) {
                Some(b) => b,
                None => {
                    self.set_last_index(0);
                    return Value::Null;
                }
            }
        } else {
            0
        };
        let found = self.regex.captures_at(s, from).filter(|caps| !self.sticky() || whole(caps).0 == from);
        match found {
            Some(caps) => {
                if stateful {
                    self.set_last_index(char_offset(s, whole(&caps).1));
                }
                match_array(&caps)
            }
            None => {
                if stateful {
                    self.set_last_index(0);
                }
                Value::Null
            }
        }
    }

    #[must_use]
    pub fn test(&self, s: &str) -> bool {
        !matches!(self.exec(s), Value::Null)
    }

    /// `s.match(re)`.
    #[must_use]
    pub fn match_in(&self, s: &str) -> Value {
        if !self.global() {
            return self.exec(s);
        }
        self.set_last_index(0);
        let all: Vec<Value> = self.regex.find_iter(s).map(|m| Value::from(m.as_str())).collect();
        if all.is_empty() { Value::Null } else { Value::from(all) }
    }

    /// `s.matchAll(re)` as an array of match arrays.
    ///
    /// # Errors
    ///
    /// `TypeError` for a non-global pattern.
    pub fn match_all(&self, s: &str) -> JsResult {
        if !self.global() {
            return Err(Throw::type_error("String.prototype.matchAll called with a non-global RegExp argument"));
        }
        Ok(Value::from(self.regex.captures_iter(s).map(|caps| match_array(&caps)).collect::<Vec<_>>()))
    }

    /// `s.search(re)`: character offset of the first match or -1.
    #[must_use]
    pub fn search(&self, s: &str) -> f64 {
        self.regex.find(s).map_or(-1.0, |m| char_offset(s, m.start()) as f64)
    }

    /// `s.split(re, limit)`. Capture groups are spliced into the result.
    #[must_use]
    pub fn split(&self, s: &str, limit: Option<usize>) -> Vec<Value> {
        let limit = limit.unwrap_or(usize::MAX);
        if s.is_empty() {
            return if self.regex.is_match(s) { Vec::new() } else { vec![Value::from("")] };
        }
        let mut parts = Vec::new();
        let mut last = 0;
        for caps in self.regex.captures_iter(s) {
            let (start, end) = whole(&caps);
            if start == end && (start == 0 || start == s.len() || start == last) {
                continue;
            }
            parts.push(Value::from(&s[last..start]));
            parts.extend(caps.iter().skip(1).map(|g| g.map_or(Value::Undefined, |g| Value::from(g.as_str()))));
            last = end;
        }
        parts.push(Value::from(&s[last..]));
        parts.truncate(limit);
        parts
    }

    /// `s.replace(re, replacement)` and `s.replaceAll(re, replacement)`.
    /// A function replacement is called with the match, its groups, the
    /// character offset and the whole string.
    ///
    /// # Errors
    ///
    /// Whatever a replacement function throws.
    pub fn replace(&self, interp: &mut Interp, s: &str, replacement: &Value) -> JsResult<String> {
        let matches: Vec<Captures<'_>> = if self.global() {
            self.set_last_index(0);
            self.regex.captures_iter(s).collect()
        } else {
            self.regex.captures(s).into_iter().collect()
        };
        let mut out = String::with_capacity(s.len());
        let mut last = 0;
        for caps in &matches {
            let (start, end) = whole(caps);
            out.push_str(&s[last..start]);
            match replacement {
                Value::Function(_) => {
                    let mut args: Vec<Value> =
                        caps.iter().map(|g| g.map_or(Value::Undefined, |g| Value::from(g.as_str()))).collect();
                    args.push(Value::from(char_offset(s, start)));
                    args.push(Value::from(s));
                    out.push_str(&interp.call(replacement, Value::Undefined, &args)?.to_js_string());
                }
                template => expand(&template.to_js_string(), caps, s, &mut out),
            }
            last = end;
        }
        out.push_str(&s[last..]);
        Ok(out)
    }
}

impl fmt::Debug for RegExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl PartialEq for RegExp {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

fn whole(caps: &Captures<'_>) -> (usize, usize) {
    caps.get(0).map_or((0, 0), |m| (m.start(), m.end()))
}

fn match_array(caps: &Captures<'_>) -> Value {
    Value::from(caps.iter().map(|g| g.map_or(Value::Undefined, |g| Value::from(g.as_str()))).collect::<Vec<_>>())
}

fn char_offset(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

fn byte_offset(s: &str, chars: usize) -> Option<usize> {
    if chars == 0 {
        return Some(0);
    }
    s.char_indices().map(|(b, c)| b + c.len_utf8()).nth(chars - 1)
}

/// Expand `$$`, `$&`, `` $` ``, `$'`, `$n`, `$nn` and `$<name>` in a
/// replacement template.
fn expand(template: &str, caps: &Captures<'_>, s: &str, out: &mut String) {
    let (start, end) = whole(caps);
    let group = |i: usize| caps.get(i).map_or("", |g| g.as_str());
    let mut rest = template;
    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        let mut chars = tail.chars();
        let consumed = match chars.next() {
            Some('$') => {
                out.push('$');
                1
            }
            Some('&') => {
                out.push_str(&s[start..end]);
                1
            }
            Some('`') => {
                out.push_str(&s[..start]);
                1
            }
            Some('\'') => {
                out.push_str(&s[end..]);
                1
            }
            Some(d) if d.is_ascii_digit() => {
                let two = tail.get(..2).filter(|t| t.bytes().all(|b| b.is_ascii_digit())).and_then(|t| t.parse().ok());
                let one = d.to_digit(10).map(|n| n as usize);
                match (two, one) {
                    (Some(n), _) if n >= 1 && n < caps.len() => {
                        out.push_str(group(n));
                        2
                    }
                    (_, Some(n)) if n >= 1 && n < caps.len() => {
                        out.push_str(group(n));
                        1
                    }
                    _ => {
                        out.push('$');
                        0
                    }
                }
            }
            Some('<') => match tail.find('>') {
                Some(close) => {
                    out.push_str(caps.name(&tail[1..close]).map_or("", |g| g.as_str()));
                    close + 1
                }
                None => {
                    out.push('$');
                    0
                }
            },
            _ => {
                out.push('$');
                0
            }
        };
        rest = &tail[consumed..];
    }
    out.push_str(rest);
}

/// Rewrite an ECMAScript pattern into `regex` syntax.
fn translate(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 8);
    let mut chars = source.chars().peekable();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('d') => out.push_str(if in_class { "0-9" } else { "[0-9]" }),
                Some('w') => out.push_str(if in_class { "0-9A-Za-z_" } else { "[0-9A-Za-z_]" }),
                Some('D') => out.push_str("[^0-9]"),
                Some('W') => out.push_str("[^0-9A-Za-z_]"),
                Some('b') if in_class => out.push_str("\\x08"),
                Some('/') => out.push('/'),
                Some('0') => out.push_str("\\x00"),
                Some(e) => {
                    out.push('\\');
                    out.push(e);
                }
                None => out.push('\\'),
            },
            '[' if in_class => out.push_str("\\["),
            '[' => {
                let mut ahead = chars.clone();
                if ahead.next() == Some('^') && ahead.next() == Some(']') {
                    chars.next();
                    chars.next();
                    out.push_str("[\\s\\S]");
                } else {
                    in_class = true;
                    out.push('[');
                    if chars.peek() == Some(&'^') {
                        chars.next();
                        out.push('^');
                    }
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "regexp_test.rs"]
mod tests;
