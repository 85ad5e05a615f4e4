//! Source-to-source step: extended dialect in, plain dialect out.
//!
//! `transpile` normalizes the text, parses it, rewrites every JSX node into a
//! `React.createElement(type, props, ...children)` call and prints the result.
//! The printed text is what a reader inspects; the lowered tree is what the
//! factory evaluates.

use std::fmt::Write;
use std::sync::Arc;

use super::ast::*;
use super::parse::{ParseError, parse};
use super::value::format_number;

/// Output of a successful transpilation.
#[derive(Debug, Clone)]
pub struct Transpiled {
    pub program: Program,
    pub code: String,
}

/// Normalize, parse and lower `source`.
///
/// # Errors
///
/// Returns the parser's [`ParseError`] unchanged.
pub fn transpile(source: &str) -> Result<Transpiled, ParseError> {
    let normalized = normalize_source(source);
    let program = lower(parse(&normalized)?);
    let code = print(&program);
    Ok(Transpiled { program, code })
}

/// Drop zero-width characters, normalize line endings, trim each line's end.
#[must_use]
pub fn normalize_source(source: &str) -> String {
    let stripped: String = source
        .chars()
        .filter(|c| !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}'))
        .collect();
    stripped
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}

// =============================================================================
// LOWERING
// =============================================================================

#[must_use]
pub fn lower(program: Program) -> Program {
    Program { body: program.body.into_iter().map(lower_stmt).collect() }
}

fn lower_block(body: Vec<Stmt>) -> Vec<Stmt> {
    body.into_iter().map(lower_stmt).collect()
}

fn lower_boxed(stmt: Box<Stmt>) -> Box<Stmt> {
    Box::new(lower_stmt(*stmt))
}

fn lower_stmt(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Var { kind, decls } => Stmt::Var {
            kind,
            decls: decls
                .into_iter()
                .map(|d| Declarator { target: lower_pattern(d.target), init: d.init.map(lower_expr) })
                .collect(),
        },
        Stmt::Function(def) => Stmt::Function(lower_function(&def)),
        Stmt::Return(arg) => Stmt::Return(arg.map(lower_expr)),
        Stmt::If { test, then, otherwise } => {
            Stmt::If { test: lower_expr(test), then: lower_boxed(then), otherwise: otherwise.map(lower_boxed) }
        }
        Stmt::Block(body) => Stmt::Block(lower_block(body)),
        Stmt::For { init, test, update, body } => Stmt::For {
            init: init.map(lower_boxed),
            test: test.map(lower_expr),
            update: update.map(lower_expr),
            body: lower_boxed(body),
        },
        Stmt::ForOf { kind, target, iter, body } => {
            Stmt::ForOf { kind, target: lower_pattern(target), iter: lower_expr(iter), body: lower_boxed(body) }
        }
        Stmt::While { test, body } => Stmt::While { test: lower_expr(test), body: lower_boxed(body) },
        Stmt::Throw(arg) => Stmt::Throw(lower_expr(arg)),
        Stmt::Try { block, param, handler, finalizer } => Stmt::Try {
            block: lower_block(block),
            param: param.map(lower_pattern),
            handler: handler.map(lower_block),
            finalizer: finalizer.map(lower_block),
        },
        Stmt::Switch { discriminant, cases } => Stmt::Switch {
            discriminant: lower_expr(discriminant),
            cases: cases
                .into_iter()
                .map(|c| SwitchCase { test: c.test.map(lower_expr), body: lower_block(c.body) })
                .collect(),
        },
        Stmt::Expr(e) => Stmt::Expr(lower_expr(e)),
        other @ (Stmt::Break | Stmt::Continue | Stmt::Empty) => other,
    }
}

fn lower_pattern(pattern: Pattern) -> Pattern {
    let lower_item = |item: PatternItem| PatternItem { target: lower_pattern(item.target), default: item.default.map(lower_expr) };
    match pattern {
        Pattern::Ident(_) => pattern,
        Pattern::Array { items, rest } => Pattern::Array {
            items: items.into_iter().map(|i| i.map(lower_item)).collect(),
            rest: rest.map(|r| Box::new(lower_pattern(*r))),
        },
        Pattern::Object { props, rest } => Pattern::Object {
            props: props.into_iter().map(|(k, i)| (k, lower_item(i))).collect(),
            rest: rest.map(|r| Box::new(lower_pattern(*r))),
        },
    }
}

fn lower_function(def: &FunctionDef) -> Arc<FunctionDef> {
    let params = def
        .params
        .iter()
        .cloned()
        .map(|p| Param { target: lower_pattern(p.target), default: p.default.map(lower_expr), rest: p.rest })
        .collect();
    let body = match &def.body {
        FunctionBody::Block(stmts) => FunctionBody::Block(lower_block(stmts.clone())),
        FunctionBody::Expr(e) => FunctionBody::Expr(Box::new(lower_expr((**e).clone()))),
    };
    Arc::new(FunctionDef { name: def.name.clone(), params, body, arrow: def.arrow, is_async: def.is_async })
}

fn lower_spreadable(item: Spreadable) -> Spreadable {
    match item {
        Spreadable::Item(e) => Spreadable::Item(lower_expr(e)),
        Spreadable::Spread(e) => Spreadable::Spread(lower_expr(e)),
    }
}

fn lower_box(e: Box<Expr>) -> Box<Expr> {
    Box::new(lower_expr(*e))
}

fn lower_expr(expr: Expr) -> Expr {
    match expr {
        Expr::Template { quasis, exprs } => Expr::Template { quasis, exprs: exprs.into_iter().map(lower_expr).collect() },
        Expr::Array(items) => Expr::Array(items.into_iter().map(lower_spreadable).collect()),
        Expr::Object(props) => Expr::Object(
            props
                .into_iter()
                .map(|p| match p {
                    PropDef::KeyValue(PropKey::Computed(k), v) => {
                        PropDef::KeyValue(PropKey::Computed(lower_box(k)), lower_expr(v))
                    }
                    PropDef::KeyValue(k, v) => PropDef::KeyValue(k, lower_expr(v)),
                    PropDef::Spread(e) => PropDef::Spread(lower_expr(e)),
                })
                .collect(),
        ),
        Expr::Function(def) => Expr::Function(lower_function(&def)),
        Expr::Unary { op, arg } => Expr::Unary { op, arg: lower_box(arg) },
        Expr::Await(arg) => Expr::Await(lower_box(arg)),
        Expr::Update { op, prefix, target } => Expr::Update { op, prefix, target: lower_box(target) },
        Expr::Binary { op, left, right } => Expr::Binary { op, left: lower_box(left), right: lower_box(right) },
        Expr::Logical { op, left, right } => Expr::Logical { op, left: lower_box(left), right: lower_box(right) },
        Expr::Conditional { test, consequent, alternate } => Expr::Conditional {
            test: lower_box(test),
            consequent: lower_box(consequent),
            alternate: lower_box(alternate),
        },
        Expr::Assign { op, target, value } => Expr::Assign { op, target: lower_box(target), value: lower_box(value) },
        Expr::Call { callee, args, optional } => {
            Expr::Call { callee: lower_box(callee), args: args.into_iter().map(lower_spreadable).collect(), optional }
        }
        Expr::New { callee, args } => {
            Expr::New { callee: lower_box(callee), args: args.into_iter().map(lower_spreadable).collect() }
        }
        Expr::Member { object, property, optional } => {
            let property = match property {
                MemberProp::Computed(p) => MemberProp::Computed(lower_box(p)),
                MemberProp::Static(_) => property,
            };
            Expr::Member { object: lower_box(object), property, optional }
        }
        Expr::Jsx(element) => lower_jsx(*element),
        leaf => leaf,
    }
}

fn react_member(name: &str) -> Expr {
    Expr::Member {
        object: Box::new(Expr::Ident("React".into())),
        property: MemberProp::Static(name.into()),
        optional: false,
    }
}

fn lower_jsx(element: JsxElement) -> Expr {
    let kind = match element.name {
        None => react_member("Fragment"),
        Some(JsxName::Intrinsic(tag)) => Expr::Str(tag),
        Some(JsxName::Component(parts)) => {
            let mut parts = parts.into_iter();
            let head = Expr::Ident(parts.next().unwrap_or_default());
            parts.fold(head, |object, name| Expr::Member {
                object: Box::new(object),
                property: MemberProp::Static(name),
                optional: false,
            })
        }
    };

    let props = if element.attrs.is_empty() {
        Expr::Null
    } else {
        Expr::Object(
            element
                .attrs
                .into_iter()
                .map(|attr| match attr {
                    JsxAttr::Named { name, value } => {
                        PropDef::KeyValue(PropKey::Static(name), value.map_or(Expr::Bool(true), lower_expr))
                    }
                    JsxAttr::Spread(e) => PropDef::Spread(lower_expr(e)),
                })
                .collect(),
        )
    };

    let mut args = vec![Spreadable::Item(kind), Spreadable::Item(props)];
    args.extend(element.children.into_iter().map(|child| {
        Spreadable::Item(match child {
            JsxChild::Text(t) => Expr::Str(t),
            JsxChild::Expr(e) => lower_expr(e),
            JsxChild::Element(el) => lower_jsx(el),
        })
    }));

    Expr::Call { callee: Box::new(react_member("createElement")), args, optional: false }
}

// =============================================================================
// PRINTING
// =============================================================================

/// Print a plain-dialect program as source text.
#[must_use]
pub fn print(program: &Program) -> String {
    let mut printer = Printer { out: String::new(), indent: 0 };
    for stmt in &program.body {
        printer.stmt(stmt);
    }
    printer.out.trim_end().to_owned()
}

struct Printer {
    out: String,
    indent: usize,
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Assign { .. } => 1,
        Expr::Function(def) if def.arrow => 1,
        Expr::Conditional { .. } => 2,
        Expr::Logical { op: LogicalOp::Nullish, .. } => 3,
        Expr::Logical { op: LogicalOp::Or, .. } => 4,
        Expr::Logical { op: LogicalOp::And, .. } => 5,
        Expr::Binary { op, .. } => match op {
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 8,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => 9,
            BinaryOp::Add | BinaryOp::Sub => 11,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 12,
            BinaryOp::Pow => 13,
        },
        Expr::Unary { .. } | Expr::Await(_) | Expr::Update { prefix: true, .. } => 14,
        Expr::Update { prefix: false, .. } => 15,
        Expr::Call { .. } | Expr::New { .. } | Expr::Member { .. } => 16,
        _ => 17,
    }
}

fn quote(s: &str, delim: char) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, head: &str, body: &[Stmt], tail: &str) {
        self.line(&format!("{head}{{"));
        self.indent += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.line(&format!("}}{tail}"));
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var { kind, decls } => {
                let text = format!("{} {};", kind.as_str(), self.declarators(decls));
                self.line(&text);
            }
            Stmt::Function(def) => {
                let head = format!("function {}({}) ", def.name.as_deref().unwrap_or(""), self.params(&def.params));
                self.function_body(&head, &def.body);
            }
            Stmt::Return(None) => self.line("return;"),
            Stmt::Return(Some(e)) => {
                let text = format!("return {};", self.expr(e));
                self.line(&text);
            }
            Stmt::If { test, then, otherwise } => {
                let head = format!("if ({}) ", self.expr(test));
                self.nested(&head, then);
                if let Some(otherwise) = otherwise {
                    self.nested("else ", otherwise);
                }
            }
            Stmt::Block(body) => self.block("", body, ""),
            Stmt::For { init, test, update, body } => {
                let init = match init.as_deref() {
                    Some(Stmt::Var { kind, decls }) => format!("{} {}", kind.as_str(), self.declarators(decls)),
                    Some(Stmt::Expr(e)) => self.expr(e),
                    _ => String::new(),
                };
                let test = test.as_ref().map(|e| self.expr(e)).unwrap_or_default();
                let update = update.as_ref().map(|e| self.expr(e)).unwrap_or_default();
                self.nested(&format!("for ({init}; {test}; {update}) "), body);
            }
            Stmt::ForOf { kind, target, iter, body } => {
                let head = format!("for ({} {} of {}) ", kind.as_str(), self.pattern(target), self.expr(iter));
                self.nested(&head, body);
            }
            Stmt::While { test, body } => {
                let head = format!("while ({}) ", self.expr(test));
                self.nested(&head, body);
            }
            Stmt::Break => self.line("break;"),
            Stmt::Continue => self.line("continue;"),
            Stmt::Throw(e) => {
                let text = format!("throw {};", self.expr(e));
                self.line(&text);
            }
            Stmt::Try { block, param, handler, finalizer } => {
                self.block("try ", block, "");
                if let Some(handler) = handler {
                    let head = match param {
                        Some(p) => format!("catch ({}) ", self.pattern(p)),
                        None => "catch ".to_owned(),
                    };
                    self.block(&head, handler, "");
                }
                if let Some(finalizer) = finalizer {
                    self.block("finally ", finalizer, "");
                }
            }
            Stmt::Switch { discriminant, cases } => {
                let head = format!("switch ({}) {{", self.expr(discriminant));
                self.line(&head);
                self.indent += 1;
                for case in cases {
                    let label = match &case.test {
                        Some(test) => format!("case {}:", self.expr(test)),
                        None => "default:".to_owned(),
                    };
                    self.line(&label);
                    self.indent += 1;
                    for stmt in &case.body {
                        self.stmt(stmt);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Expr(e) => {
                let mut text = self.expr(e);
                if text.starts_with('{') || text.starts_with("function") {
                    text = format!("({text})");
                }
                self.line(&format!("{text};"));
            }
            Stmt::Empty => {}
        }
    }

    fn nested(&mut self, head: &str, body: &Stmt) {
        match body {
            Stmt::Block(stmts) => self.block(head, stmts, ""),
            other => self.block(head, std::slice::from_ref(other), ""),
        }
    }

    fn function_body(&mut self, head: &str, body: &FunctionBody) {
        match body {
            FunctionBody::Block(stmts) => self.block(head, stmts, ""),
            FunctionBody::Expr(e) => {
                let text = format!("{head}{}", self.expr(e));
                self.line(&text);
            }
        }
    }

    fn declarators(&mut self, decls: &[Declarator]) -> String {
        decls
            .iter()
            .map(|d| match &d.init {
                Some(init) => format!("{} = {}", self.pattern(&d.target), self.expr(init)),
                None => self.pattern(&d.target),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn params(&mut self, params: &[Param]) -> String {
        params
            .iter()
            .map(|p| {
                let mut text = if p.rest { format!("...{}", self.pattern(&p.target)) } else { self.pattern(&p.target) };
                if let Some(d) = &p.default {
                    let _ = write!(text, " = {}", self.expr(d));
                }
                text
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn pattern(&mut self, pattern: &Pattern) -> String {
        let item = |this: &mut Self, item: &PatternItem| match &item.default {
            Some(d) => format!("{} = {}", this.pattern(&item.target), this.expr(d)),
            None => this.pattern(&item.target),
        };
        match pattern {
            Pattern::Ident(name) => name.clone(),
            Pattern::Array { items, rest } => {
                let mut parts: Vec<String> = items.iter().map(|i| i.as_ref().map(|i| item(self, i)).unwrap_or_default()).collect();
                if let Some(rest) = rest {
                    parts.push(format!("...{}", self.pattern(rest)));
                }
                format!("[{}]", parts.join(", "))
            }
            Pattern::Object { props, rest } => {
                let mut parts: Vec<String> = props
                    .iter()
                    .map(|(key, i)| match (&i.target, &i.default) {
                        (Pattern::Ident(n), None) if n == key => key.clone(),
                        _ => format!("{key}: {}", item(self, i)),
                    })
                    .collect();
                if let Some(rest) = rest {
                    parts.push(format!("...{}", self.pattern(rest)));
                }
                format!("{{ {} }}", parts.join(", "))
            }
        }
    }

    fn operand(&mut self, expr: &Expr, min: u8) -> String {
        let text = self.expr(expr);
        if precedence(expr) < min { format!("({text})") } else { text }
    }

    fn spreadables(&mut self, items: &[Spreadable]) -> String {
        items
            .iter()
            .map(|i| match i {
                Spreadable::Item(e) => self.operand(e, 2),
                Spreadable::Spread(e) => format!("...{}", self.operand(e, 2)),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn member_prop(&mut self, property: &MemberProp, optional: bool) -> String {
        match (property, optional) {
            (MemberProp::Static(name), false) => format!(".{name}"),
            (MemberProp::Static(name), true) => format!("?.{name}"),
            (MemberProp::Computed(e), false) => format!("[{}]", self.expr(e)),
            (MemberProp::Computed(e), true) => format!("?.[{}]", self.expr(e)),
        }
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Number(n) => format_number(*n),
            Expr::Str(s) => quote(s, '"'),
            Expr::Regex { pattern, flags } => format!("/{pattern}/{flags}"),
            Expr::Template { quasis, exprs } => {
                let mut out = String::from("`");
                for (i, q) in quasis.iter().enumerate() {
                    out.push_str(&q.replace('\\', "\\\\").replace('`', "\\`").replace("${", "\\${"));
                    if let Some(e) = exprs.get(i) {
                        let _ = write!(out, "${{{}}}", self.expr(e));
                    }
                }
                out.push('`');
                out
            }
            Expr::Bool(b) => b.to_string(),
            Expr::Null => "null".into(),
            Expr::Undefined => "undefined".into(),
            Expr::Ident(name) => name.clone(),
            Expr::Array(items) => format!("[{}]", self.spreadables(items)),
            Expr::Object(props) if props.is_empty() => "{}".into(),
            Expr::Object(props) => {
                let parts: Vec<String> = props
                    .iter()
                    .map(|p| match p {
                        PropDef::KeyValue(PropKey::Static(k), v) => {
                            let key = if is_identifier(k) { k.clone() } else { quote(k, '"') };
                            format!("{key}: {}", self.operand(v, 2))
                        }
                        PropDef::KeyValue(PropKey::Computed(k), v) => {
                            format!("[{}]: {}", self.expr(k), self.operand(v, 2))
                        }
                        PropDef::Spread(e) => format!("...{}", self.operand(e, 2)),
                    })
                    .collect();
                format!("{{ {} }}", parts.join(", "))
            }
            Expr::Function(def) => self.function_expr(def),
            Expr::Unary { op, arg } => {
                let op = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                    UnaryOp::TypeOf => "typeof ",
                    UnaryOp::Void => "void ",
                };
                format!("{op}{}", self.operand(arg, 14))
            }
            Expr::Await(arg) => format!("await {}", self.operand(arg, 14)),
            Expr::Update { op, prefix, target } => {
                let op = if *op == UpdateOp::Inc { "++" } else { "--" };
                let target = self.operand(target, 16);
                if *prefix { format!("{op}{target}") } else { format!("{target}{op}") }
            }
            Expr::Binary { op, left, right } => {
                let prec = precedence(expr);
                let (lmin, rmin) = if *op == BinaryOp::Pow { (prec + 1, prec) } else { (prec, prec + 1) };
                format!("{} {} {}", self.operand(left, lmin), op.as_str(), self.operand(right, rmin))
            }
            Expr::Logical { op, left, right } => {
                let prec = precedence(expr);
                // `??` may not mix with `||`/`&&` unparenthesized.
                let min = if matches!(op, LogicalOp::Nullish) { 6 } else { prec };
                let rmin = if matches!(op, LogicalOp::Nullish) { 6 } else { prec + 1 };
                format!("{} {} {}", self.operand(left, min), op.as_str(), self.operand(right, rmin))
            }
            Expr::Conditional { test, consequent, alternate } => format!(
                "{} ? {} : {}",
                self.operand(test, 3),
                self.operand(consequent, 2),
                self.operand(alternate, 2)
            ),
            Expr::Assign { op, target, value } => {
                let op = match op {
                    AssignOp::Assign => "=".to_owned(),
                    AssignOp::Compound(b) => format!("{}=", b.as_str()),
                    AssignOp::Logical(l) => format!("{}=", l.as_str()),
                };
                format!("{} {op} {}", self.expr(target), self.operand(value, 1))
            }
            Expr::Call { callee, args, optional } => {
                let callee = self.operand(callee, 16);
                let args = self.spreadables(args);
                if *optional { format!("{callee}?.({args})") } else { format!("{callee}({args})") }
            }
            Expr::New { callee, args } => format!("new {}({})", self.operand(callee, 16), self.spreadables(args)),
            Expr::Member { object, property, optional } => {
                let object = self.operand(object, 16);
                format!("{object}{}", self.member_prop(property, *optional))
            }
            Expr::Jsx(_) => "/* jsx */".into(),
        }
    }

    fn function_expr(&mut self, def: &FunctionDef) -> String {
        let params = self.params(&def.params);
        let prefix = if def.is_async { "async " } else { "" };
        let head = if def.arrow {
            format!("{prefix}({params}) => ")
        } else {
            format!("{prefix}function {}({params}) ", def.name.as_deref().unwrap_or(""))
        };
        match &def.body {
            FunctionBody::Expr(e) => {
                let body = self.expr(e);
                if matches!(**e, Expr::Object(_)) { format!("{head}({body})") } else { format!("{head}{body}") }
            }
            FunctionBody::Block(stmts) => {
                let mut inner = Printer { out: String::new(), indent: self.indent + 1 };
                for stmt in stmts {
                    inner.stmt(stmt);
                }
                let pad = "  ".repeat(self.indent);
                format!("{head}{{\n{}{pad}}}", inner.out)
            }
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c == '_' || c == '$' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
}

#[cfg(test)]
#[path = "transpile_test.rs"]
mod tests;
