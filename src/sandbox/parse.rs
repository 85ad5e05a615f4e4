//! Recursive descent parser for the component dialect.
//!
//! Accepts a JavaScript subset extended with JSX and the TypeScript
//! annotations generated components commonly carry (parameter and binding
//! annotations, `as` casts, generic call arguments, `interface`/`type`
//! declarations). Type syntax is skipped, never represented.

use std::sync::Arc;

use super::ast::*;
use super::lexer::{Lexer, TemplatePiece, Tok, Token};

/// A transpilation failure with a 1-based line and 0-based column.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({line}:{column})")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub(crate) fn at(src: &str, message: impl Into<String>, offset: usize) -> Self {
        let before = &src[..offset.min(src.len())];
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count());
        Self { message: message.into(), line, column }
    }
}

type PResult<T> = Result<T, ParseError>;

/// Recursion budget shared by statements, expressions, patterns and JSX
/// elements. Deeper input is rejected before it can exhaust the stack.
pub const MAX_NESTING_DEPTH: usize = 256;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do", "else", "export",
    "extends", "finally", "for", "if", "import", "in", "instanceof", "let", "return", "super", "switch", "throw", "try",
    "var", "while", "with", "yield",
];

/// Parse source text into a [`Program`].
///
/// # Errors
///
/// Returns a [`ParseError`] naming the first offending token.
pub fn parse(src: &str) -> PResult<Program> {
    let mut parser = Parser::new(Lexer::new(src))?;
    let mut body = Vec::new();
    while parser.tok.tok != Tok::Eof {
        body.push(parser.parse_statement()?);
    }
    Ok(Program { body })
}

struct Parser<'a> {
    lex: Lexer<'a>,
    tok: Token,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(mut lex: Lexer<'a>) -> PResult<Self> {
        let tok = lex.next_token()?;
        Ok(Self { lex, tok, depth: 0 })
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error_here("Code is nested too deeply"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // =========================================================================
    // TOKEN PLUMBING
    // =========================================================================

    fn bump(&mut self) -> PResult<Token> {
        let next = self.lex.next_token()?;
        Ok(std::mem::replace(&mut self.tok, next))
    }

    fn eat(&mut self, p: &str) -> PResult<bool> {
        if self.tok.is_punct(p) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, p: &str) -> PResult<()> {
        if self.eat(p)? { Ok(()) } else { Err(self.error_here(format!("Unexpected token, expected \"{p}\""))) }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(self.lex.source(), message, self.tok.start)
    }

    fn unexpected(&self) -> ParseError {
        match &self.tok.tok {
            Tok::Eof => self.error_here("Unexpected token"),
            Tok::Ident(name) if RESERVED.contains(&name.as_str()) => {
                self.error_here(format!("Unexpected keyword '{name}'"))
            }
            _ => self.error_here("Unexpected token"),
        }
    }

    fn snapshot(&self) -> (Lexer<'a>, Token) {
        (self.lex.clone(), self.tok.clone())
    }

    fn restore(&mut self, (lex, tok): (Lexer<'a>, Token)) {
        self.lex = lex;
        self.tok = tok;
    }

    fn peek_token(&self) -> PResult<Token> {
        self.lex.clone().next_token()
    }

    fn ident_name(&mut self) -> PResult<String> {
        match &self.tok.tok {
            Tok::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.bump()?;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Property names may be any identifier including reserved words.
    fn property_name(&mut self) -> PResult<String> {
        match &self.tok.tok {
            Tok::Ident(name) => {
                let name = name.clone();
                self.bump()?;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn consume_semicolon(&mut self) -> PResult<()> {
        if self.eat(";")? || self.tok.is_punct("}") || self.tok.tok == Tok::Eof || self.tok.newline_before {
            Ok(())
        } else {
            Err(self.error_here("Missing semicolon."))
        }
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    fn parse_statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> PResult<Stmt> {
        if self.tok.is_punct("{") {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        if self.eat(";")? {
            return Ok(Stmt::Empty);
        }
        let Tok::Ident(word) = &self.tok.tok else {
            return self.parse_expression_statement();
        };
        let word = word.clone();
        match word.as_str() {
            "const" => self.parse_var_statement(VarKind::Const),
            "let" => self.parse_var_statement(VarKind::Let),
            "var" => self.parse_var_statement(VarKind::Var),
            "function" => {
                self.bump()?;
                let def = self.parse_function_rest(true)?;
                Ok(Stmt::Function(Arc::new(def)))
            }
            "async" if self.async_function_ahead()? => {
                self.bump()?;
                self.bump()?;
                let mut def = self.parse_function_rest(true)?;
                def.is_async = true;
                Ok(Stmt::Function(Arc::new(def)))
            }
            "return" => {
                self.bump()?;
                let arg = if self.tok.is_punct(";")
                    || self.tok.is_punct("}")
                    || self.tok.tok == Tok::Eof
                    || self.tok.newline_before
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(arg))
            }
            "if" => {
                self.bump()?;
                self.expect("(")?;
                let test = self.parse_expression()?;
                self.expect(")")?;
                let then = Box::new(self.parse_statement()?);
                let otherwise = if self.tok.is_ident("else") {
                    self.bump()?;
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If { test, then, otherwise })
            }
            "for" => self.parse_for(),
            "while" => {
                self.bump()?;
                self.expect("(")?;
                let test = self.parse_expression()?;
                self.expect(")")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While { test, body })
            }
            "break" => {
                self.bump()?;
                self.consume_semicolon()?;
                Ok(Stmt::Break)
            }
            "continue" => {
                self.bump()?;
                self.consume_semicolon()?;
                Ok(Stmt::Continue)
            }
            "throw" => {
                self.bump()?;
                if self.tok.newline_before {
                    return Err(self.error_here("Illegal newline after throw"));
                }
                let arg = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(arg))
            }
            "try" => self.parse_try(),
            "switch" => self.parse_switch(),
            "import" | "export" => {
                Err(self.error_here(format!("'{word}' statements are not allowed in generated components")))
            }
            "interface" | "type" if matches!(self.peek_token()?.tok, Tok::Ident(_)) => {
                self.skip_type_declaration()?;
                Ok(Stmt::Empty)
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        self.bump()?;
        self.expect("(")?;
        let discriminant = self.parse_expression()?;
        self.expect(")")?;
        self.expect("{")?;
        let mut cases = Vec::new();
        while !self.eat("}")? {
            let test = if self.tok.is_ident("case") {
                self.bump()?;
                Some(self.parse_expression()?)
            } else if self.tok.is_ident("default") {
                self.bump()?;
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect(":")?;
            let mut body = Vec::new();
            while !(self.tok.is_ident("case") || self.tok.is_ident("default") || self.tok.is_punct("}")) {
                if self.tok.tok == Tok::Eof {
                    return Err(self.error_here("Unexpected token, expected \"}\""));
                }
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(Stmt::Switch { discriminant, cases })
    }

    fn parse_expression_statement(&mut self) -> PResult<Stmt> {
        let expr = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect("{")?;
        let mut body = Vec::new();
        while !self.tok.is_punct("}") {
            if self.tok.tok == Tok::Eof {
                return Err(self.error_here("Unexpected token, expected \"}\""));
            }
            body.push(self.parse_statement()?);
        }
        self.bump()?;
        Ok(body)
    }

    fn parse_var_statement(&mut self, kind: VarKind) -> PResult<Stmt> {
        self.bump()?;
        let decls = self.parse_declarators(kind, true)?;
        self.consume_semicolon()?;
        Ok(Stmt::Var { kind, decls })
    }

    fn parse_declarators(&mut self, kind: VarKind, require_const_init: bool) -> PResult<Vec<Declarator>> {
        let mut decls = Vec::new();
        loop {
            let target = self.parse_binding_pattern()?;
            if self.eat(":")? {
                self.skip_type()?;
            }
            let init = if self.eat("=")? { Some(self.parse_assign()?) } else { None };
            if init.is_none() && require_const_init && kind == VarKind::Const {
                return Err(self.error_here("Missing initializer in const declaration."));
            }
            decls.push(Declarator { target, init });
            if !self.eat(",")? {
                break;
            }
        }
        Ok(decls)
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        self.bump()?;
        self.expect("(")?;

        let kind = match &self.tok.tok {
            Tok::Ident(w) if w == "const" => Some(VarKind::Const),
            Tok::Ident(w) if w == "let" => Some(VarKind::Let),
            Tok::Ident(w) if w == "var" => Some(VarKind::Var),
            _ => None,
        };

        let init = if let Some(kind) = kind {
            self.bump()?;
            let target = self.parse_binding_pattern()?;
            if self.tok.is_ident("of") {
                self.bump()?;
                let iter = self.parse_assign()?;
                self.expect(")")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Stmt::ForOf { kind, target, iter, body });
            }
            if self.eat(":")? {
                self.skip_type()?;
            }
            let init = if self.eat("=")? { Some(self.parse_assign()?) } else { None };
            let mut decls = vec![Declarator { target, init }];
            if self.eat(",")? {
                decls.extend(self.parse_declarators(kind, false)?);
            }
            Some(Box::new(Stmt::Var { kind, decls }))
        } else if self.tok.is_punct(";") {
            None
        } else {
            Some(Box::new(Stmt::Expr(self.parse_expression()?)))
        };

        self.expect(";")?;
        let test = if self.tok.is_punct(";") { None } else { Some(self.parse_expression()?) };
        self.expect(";")?;
        let update = if self.tok.is_punct(")") { None } else { Some(self.parse_expression()?) };
        self.expect(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For { init, test, update, body })
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        self.bump()?;
        let block = self.parse_block()?;
        let mut param = None;
        let mut handler = None;
        if self.tok.is_ident("catch") {
            self.bump()?;
            if self.eat("(")? {
                param = Some(self.parse_binding_pattern()?);
                if self.eat(":")? {
                    self.skip_type()?;
                }
                self.expect(")")?;
            }
            handler = Some(self.parse_block()?);
        }
        let finalizer = if self.tok.is_ident("finally") {
            self.bump()?;
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error_here("Missing catch or finally clause"));
        }
        Ok(Stmt::Try { block, param, handler, finalizer })
    }

    // =========================================================================
    // TYPE SKIPPING
    // =========================================================================

    /// Skip a type annotation. Stops before the first token at nesting depth
    /// zero that cannot continue a type.
    fn skip_type(&mut self) -> PResult<()> {
        let mut depth = 0usize;
        let mut consumed = false;
        let mut after_group = false;
        loop {
            if self.tok.tok == Tok::Eof {
                return Ok(());
            }
            if depth == 0 {
                // `(x: T) => R` is a function type, not the end of the annotation.
                if self.tok.is_punct("=>") && after_group {
                    self.bump()?;
                    after_group = false;
                    continue;
                }
                let stop = [",", ")", "=", ";", "=>", "]", "}", ">"].iter().any(|p| self.tok.is_punct(p));
                if stop || (consumed && self.tok.is_punct("{")) {
                    return Ok(());
                }
            }
            let closes = match &self.tok.tok {
                Tok::Punct("(" | "[" | "{" | "<") => {
                    depth += 1;
                    false
                }
                Tok::Punct(")" | "]" | "}" | ">") => {
                    depth = depth.saturating_sub(1);
                    self.tok.is_punct(")")
                }
                _ => false,
            };
            after_group = closes && depth == 0;
            self.bump()?;
            consumed = true;
        }
    }

    fn skip_type_declaration(&mut self) -> PResult<()> {
        let is_interface = self.tok.is_ident("interface");
        self.bump()?;
        if is_interface {
            while !self.tok.is_punct("{") {
                if self.tok.tok == Tok::Eof {
                    return Err(self.unexpected());
                }
                self.bump()?;
            }
            self.skip_balanced("{", "}")?;
            return Ok(());
        }
        let mut depth = 0usize;
        let mut consumed = false;
        loop {
            if self.tok.tok == Tok::Eof {
                return Ok(());
            }
            if depth == 0 {
                if self.eat(";")? {
                    return Ok(());
                }
                let continues = self.tok.is_punct("|") || self.tok.is_punct("&");
                if consumed && self.tok.newline_before && !continues {
                    return Ok(());
                }
            }
            match &self.tok.tok {
                Tok::Punct("(" | "[" | "{" | "<") => depth += 1,
                Tok::Punct(")" | "]" | "}" | ">") => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.bump()?;
            consumed = true;
        }
    }

    fn skip_balanced(&mut self, open: &str, close: &str) -> PResult<()> {
        let mut depth = 0usize;
        loop {
            if self.tok.tok == Tok::Eof {
                return Err(self.error_here(format!("Unexpected token, expected \"{close}\"")));
            }
            if self.tok.is_punct(open) {
                depth += 1;
            } else if self.tok.is_punct(close) {
                depth -= 1;
                if depth == 0 {
                    self.bump()?;
                    return Ok(());
                }
            }
            self.bump()?;
        }
    }

    /// Skip `<...>` generic arguments when directly followed by `(`.
    fn try_skip_type_args(&mut self) -> bool {
        let saved = self.snapshot();
        let ok = (|| -> PResult<bool> {
            self.bump()?;
            let mut depth = 1usize;
            while depth > 0 {
                match &self.tok.tok {
                    Tok::Eof | Tok::Punct(";" | "=>" | "&&" | "||") => return Ok(false),
                    Tok::Punct("<") => depth += 1,
                    Tok::Punct(">") => depth -= 1,
                    _ => {}
                }
                self.bump()?;
            }
            Ok(self.tok.is_punct("("))
        })();
        if matches!(ok, Ok(true)) {
            true
        } else {
            self.restore(saved);
            false
        }
    }

    // =========================================================================
    // PATTERNS
    // =========================================================================

    fn parse_binding_pattern(&mut self) -> PResult<Pattern> {
        self.nested(Self::parse_binding_pattern_inner)
    }

    fn parse_binding_pattern_inner(&mut self) -> PResult<Pattern> {
        if self.eat("[")? {
            let mut items = Vec::new();
            let mut rest = None;
            while !self.eat("]")? {
                if self.eat(",")? {
                    items.push(None);
                    continue;
                }
                if self.eat("...")? {
                    rest = Some(Box::new(self.parse_binding_pattern()?));
                    self.expect("]")?;
                    break;
                }
                let target = self.parse_binding_pattern()?;
                let default = if self.eat("=")? { Some(self.parse_assign()?) } else { None };
                items.push(Some(PatternItem { target, default }));
                if !self.tok.is_punct("]") {
                    self.expect(",")?;
                }
            }
            return Ok(Pattern::Array { items, rest });
        }

        if self.eat("{")? {
            let mut props = Vec::new();
            let mut rest = None;
            while !self.eat("}")? {
                if self.eat("...")? {
                    rest = Some(Box::new(Pattern::Ident(self.ident_name()?)));
                    self.expect("}")?;
                    break;
                }
                let key = match &self.tok.tok {
                    Tok::Str(s) => {
                        let s = s.clone();
                        self.bump()?;
                        s
                    }
                    _ => self.property_name()?,
                };
                let target = if self.eat(":")? { self.parse_binding_pattern()? } else { Pattern::Ident(key.clone()) };
                let default = if self.eat("=")? { Some(self.parse_assign()?) } else { None };
                props.push((key, PatternItem { target, default }));
                if !self.tok.is_punct("}") {
                    self.expect(",")?;
                }
            }
            return Ok(Pattern::Object { props, rest });
        }

        Ok(Pattern::Ident(self.ident_name()?))
    }

    // =========================================================================
    // FUNCTIONS
    // =========================================================================

    /// Parse after the `function` keyword.
    fn parse_function_rest(&mut self, require_name: bool) -> PResult<FunctionDef> {
        let name = if matches!(self.tok.tok, Tok::Ident(_)) {
            Some(self.ident_name()?)
        } else if require_name {
            return Err(self.unexpected());
        } else {
            None
        };
        if self.tok.is_punct("<") {
            self.skip_balanced("<", ">")?;
        }
        let params = self.parse_params()?;
        if self.eat(":")? {
            self.skip_type()?;
        }
        let body = FunctionBody::Block(self.parse_block()?);
        Ok(FunctionDef { name, params, body, arrow: false, is_async: false })
    }

    /// `async` under the cursor starts `async function` on the same line.
    fn async_function_ahead(&self) -> PResult<bool> {
        let next = self.peek_token()?;
        Ok(next.is_ident("function") && !next.newline_before)
    }

    /// Parse `async x => ...` or `async (...) => ...` if the cursor is on
    /// such an arrow. Otherwise leaves the cursor untouched.
    fn try_parse_async_arrow(&mut self) -> PResult<Option<Expr>> {
        let next = self.peek_token()?;
        if next.newline_before {
            return Ok(None);
        }
        let saved = self.snapshot();
        self.bump()?;
        if let Tok::Ident(name) = &self.tok.tok {
            if !RESERVED.contains(&name.as_str()) && self.peek_token()?.is_punct("=>") {
                let name = self.ident_name()?;
                let param = Param { target: Pattern::Ident(name), default: None, rest: false };
                return self.parse_arrow_body(vec![param], true).map(Some);
            }
        } else if self.tok.is_punct("(") && self.is_arrow_ahead() {
            let params = self.parse_params()?;
            return self.parse_arrow_body(params, true).map(Some);
        }
        self.restore(saved);
        Ok(None)
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect("(")?;
        let mut params = Vec::new();
        while !self.eat(")")? {
            let rest = self.eat("...")?;
            let target = self.parse_binding_pattern()?;
            self.eat("?")?;
            if self.eat(":")? {
                self.skip_type()?;
            }
            let default = if self.eat("=")? { Some(self.parse_assign()?) } else { None };
            params.push(Param { target, default, rest });
            if !self.tok.is_punct(")") {
                self.expect(",")?;
            }
        }
        Ok(params)
    }

    /// Whether the `(` under the cursor opens an arrow function's parameters.
    fn is_arrow_ahead(&mut self) -> bool {
        let saved = self.snapshot();
        let found = (|| -> PResult<bool> {
            if self.peek_token()?.is_punct("<") {
                return Ok(false);
            }
            self.skip_balanced("(", ")")?;
            if self.tok.is_punct("=>") {
                return Ok(!self.tok.newline_before);
            }
            if self.eat(":")? {
                self.skip_type()?;
                return Ok(self.tok.is_punct("=>"));
            }
            Ok(false)
        })();
        self.restore(saved);
        matches!(found, Ok(true))
    }

    fn parse_arrow_body(&mut self, params: Vec<Param>, is_async: bool) -> PResult<Expr> {
        if self.eat(":")? {
            self.skip_type()?;
        }
        self.expect("=>")?;
        let body = if self.tok.is_punct("{") {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assign()?))
        };
        Ok(Expr::Function(Arc::new(FunctionDef { name: None, params, body, arrow: true, is_async })))
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_assign_inner)
    }

    fn parse_assign_inner(&mut self) -> PResult<Expr> {
        if let Tok::Ident(name) = &self.tok.tok {
            if !RESERVED.contains(&name.as_str()) && self.peek_token()?.is_punct("=>") {
                let name = self.ident_name()?;
                let param = Param { target: Pattern::Ident(name), default: None, rest: false };
                return self.parse_arrow_body(vec![param], false);
            }
        }
        if self.tok.is_ident("async") {
            if let Some(arrow) = self.try_parse_async_arrow()? {
                return Ok(arrow);
            }
        }
        if self.tok.is_punct("(") && self.is_arrow_ahead() {
            let params = self.parse_params()?;
            return self.parse_arrow_body(params, false);
        }

        let left = self.parse_conditional()?;
        let op = match &self.tok.tok {
            Tok::Punct(p) => match *p {
                "=" => Some(AssignOp::Assign),
                "+=" => Some(AssignOp::Compound(BinaryOp::Add)),
                "-=" => Some(AssignOp::Compound(BinaryOp::Sub)),
                "*=" => Some(AssignOp::Compound(BinaryOp::Mul)),
                "/=" => Some(AssignOp::Compound(BinaryOp::Div)),
                "%=" => Some(AssignOp::Compound(BinaryOp::Rem)),
                "**=" => Some(AssignOp::Compound(BinaryOp::Pow)),
                "&&=" => Some(AssignOp::Logical(LogicalOp::And)),
                "||=" => Some(AssignOp::Logical(LogicalOp::Or)),
                "??=" => Some(AssignOp::Logical(LogicalOp::Nullish)),
                _ => None,
            },
            _ => None,
        };
        let Some(op) = op else {
            return Ok(left);
        };
        if !matches!(left, Expr::Ident(_) | Expr::Member { .. }) {
            return Err(self.error_here("Invalid left-hand side in assignment expression."));
        }
        self.bump()?;
        let value = self.parse_assign()?;
        Ok(Expr::Assign { op, target: Box::new(left), value: Box::new(value) })
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let test = self.parse_binary(0)?;
        if !self.eat("?")? {
            return Ok(test);
        }
        let consequent = self.parse_assign()?;
        self.expect(":")?;
        let alternate = self.parse_assign()?;
        Ok(Expr::Conditional { test: Box::new(test), consequent: Box::new(consequent), alternate: Box::new(alternate) })
    }

    fn binary_op(&self) -> Option<(u8, Result<BinaryOp, LogicalOp>)> {
        let Tok::Punct(p) = &self.tok.tok else {
            return None;
        };
        Some(match *p {
            "??" => (1, Err(LogicalOp::Nullish)),
            "||" => (2, Err(LogicalOp::Or)),
            "&&" => (3, Err(LogicalOp::And)),
            "==" => (7, Ok(BinaryOp::Eq)),
            "!=" => (7, Ok(BinaryOp::NotEq)),
            "===" => (7, Ok(BinaryOp::StrictEq)),
            "!==" => (7, Ok(BinaryOp::StrictNotEq)),
            "<" => (8, Ok(BinaryOp::Lt)),
            ">" => (8, Ok(BinaryOp::Gt)),
            "<=" => (8, Ok(BinaryOp::LtEq)),
            ">=" => (8, Ok(BinaryOp::GtEq)),
            "+" => (10, Ok(BinaryOp::Add)),
            "-" => (10, Ok(BinaryOp::Sub)),
            "*" => (11, Ok(BinaryOp::Mul)),
            "/" => (11, Ok(BinaryOp::Div)),
            "%" => (11, Ok(BinaryOp::Rem)),
            "**" => (12, Ok(BinaryOp::Pow)),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some((prec, op)) = self.binary_op() {
            if prec <= min_prec {
                break;
            }
            self.bump()?;
            // `**` is right-associative.
            let next_min = if prec == 12 { prec - 1 } else { prec };
            let right = self.nested(|p| p.parse_binary(next_min))?;
            left = match op {
                Ok(op) => Expr::Binary { op, left: Box::new(left), right: Box::new(right) },
                Err(op) => Expr::Logical { op, left: Box::new(left), right: Box::new(right) },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match &self.tok.tok {
            Tok::Punct("!") => Some(UnaryOp::Not),
            Tok::Punct("-") => Some(UnaryOp::Neg),
            Tok::Punct("+") => Some(UnaryOp::Plus),
            Tok::Ident(w) if w == "typeof" => Some(UnaryOp::TypeOf),
            Tok::Ident(w) if w == "void" => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.bump()?;
            let arg = self.nested(Self::parse_unary)?;
            return Ok(Expr::Unary { op, arg: Box::new(arg) });
        }
        if self.tok.is_ident("await") && self.operand_follows()? {
            self.bump()?;
            let arg = self.nested(Self::parse_unary)?;
            return Ok(Expr::Await(Box::new(arg)));
        }
        for (p, op) in [("++", UpdateOp::Inc), ("--", UpdateOp::Dec)] {
            if self.tok.is_punct(p) {
                self.bump()?;
                let target = self.nested(Self::parse_unary)?;
                self.check_update_target(&target)?;
                return Ok(Expr::Update { op, prefix: true, target: Box::new(target) });
            }
        }

        let expr = self.parse_postfix()?;
        while self.tok.is_ident("as") && !self.tok.newline_before {
            self.bump()?;
            self.skip_type()?;
        }
        Ok(expr)
    }

    /// The token after the cursor can start an operand, so a preceding
    /// `await` is the operator rather than a plain identifier.
    fn operand_follows(&self) -> PResult<bool> {
        let next = self.peek_token()?;
        let ends = [")", "]", "}", ";", ",", ":", "=", "=>", ".", "?."].iter().any(|p| next.is_punct(p));
        Ok(!ends && next.tok != Tok::Eof)
    }

    fn check_update_target(&self, target: &Expr) -> PResult<()> {
        if matches!(target, Expr::Ident(_) | Expr::Member { .. }) {
            Ok(())
        } else {
            Err(self.error_here("Invalid left-hand side in postfix operation"))
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let expr = self.parse_call_member()?;
        for (p, op) in [("++", UpdateOp::Inc), ("--", UpdateOp::Dec)] {
            if self.tok.is_punct(p) && !self.tok.newline_before {
                self.check_update_target(&expr)?;
                self.bump()?;
                return Ok(Expr::Update { op, prefix: false, target: Box::new(expr) });
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> PResult<Vec<Spreadable>> {
        self.expect("(")?;
        let mut args = Vec::new();
        while !self.eat(")")? {
            if self.eat("...")? {
                args.push(Spreadable::Spread(self.parse_assign()?));
            } else {
                args.push(Spreadable::Item(self.parse_assign()?));
            }
            if !self.tok.is_punct(")") {
                self.expect(",")?;
            }
        }
        Ok(args)
    }

    fn parse_call_member(&mut self) -> PResult<Expr> {
        let mut expr = if self.tok.is_ident("new") {
            self.bump()?;
            let mut callee = self.parse_primary()?;
            while self.tok.is_punct(".") {
                self.bump()?;
                let name = self.property_name()?;
                callee = Expr::Member { object: Box::new(callee), property: MemberProp::Static(name), optional: false };
            }
            let args = if self.tok.is_punct("(") { self.parse_args()? } else { Vec::new() };
            Expr::New { callee: Box::new(callee), args }
        } else {
            self.parse_primary()?
        };

        loop {
            if self.eat(".")? {
                let name = self.property_name()?;
                expr = Expr::Member { object: Box::new(expr), property: MemberProp::Static(name), optional: false };
            } else if self.eat("?.")? {
                if self.tok.is_punct("(") {
                    let args = self.parse_args()?;
                    expr = Expr::Call { callee: Box::new(expr), args, optional: true };
                } else if self.eat("[")? {
                    let prop = self.parse_expression()?;
                    self.expect("]")?;
                    expr =
                        Expr::Member { object: Box::new(expr), property: MemberProp::Computed(Box::new(prop)), optional: true };
                } else {
                    let name = self.property_name()?;
                    expr = Expr::Member { object: Box::new(expr), property: MemberProp::Static(name), optional: true };
                }
            } else if self.tok.is_punct("[") && !self.tok.newline_before {
                self.bump()?;
                let prop = self.parse_expression()?;
                self.expect("]")?;
                expr = Expr::Member { object: Box::new(expr), property: MemberProp::Computed(Box::new(prop)), optional: false };
            } else if self.tok.is_punct("(") {
                let args = self.parse_args()?;
                expr = Expr::Call { callee: Box::new(expr), args, optional: false };
            } else if self.tok.is_punct("<")
                && matches!(expr, Expr::Ident(_) | Expr::Member { .. })
                && self.try_skip_type_args()
            {
                // Generic arguments skipped; the call itself is parsed next turn.
            } else if self.tok.is_punct("!") && !self.tok.newline_before && self.is_non_null_assertion()? {
                self.bump()?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn is_non_null_assertion(&self) -> PResult<bool> {
        let next = self.peek_token()?;
        Ok([".", ")", ",", ";", "]", "}", "?."].iter().any(|p| next.is_punct(p)) || next.tok == Tok::Eof)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        match self.tok.tok.clone() {
            Tok::Num(n) => {
                self.bump()?;
                Ok(Expr::Number(n))
            }
            Tok::Str(s) => {
                self.bump()?;
                Ok(Expr::Str(s))
            }
            Tok::Template(pieces) => {
                self.bump()?;
                self.build_template(pieces)
            }
            Tok::Ident(name) => match name.as_str() {
                "true" => self.bump().map(|_| Expr::Bool(true)),
                "false" => self.bump().map(|_| Expr::Bool(false)),
                "null" => self.bump().map(|_| Expr::Null),
                "undefined" => self.bump().map(|_| Expr::Undefined),
                "this" => self.bump().map(|_| Expr::Ident("this".into())),
                "function" => {
                    self.bump()?;
                    let def = self.parse_function_rest(false)?;
                    Ok(Expr::Function(Arc::new(def)))
                }
                "async" if self.async_function_ahead()? => {
                    self.bump()?;
                    self.bump()?;
                    let mut def = self.parse_function_rest(false)?;
                    def.is_async = true;
                    Ok(Expr::Function(Arc::new(def)))
                }
                _ => Ok(Expr::Ident(self.ident_name()?)),
            },
            Tok::Punct("(") => {
                self.bump()?;
                let expr = self.parse_expression()?;
                self.expect(")")?;
                Ok(expr)
            }
            Tok::Punct("/" | "/=") => {
                let (pattern, flags) = self.lex.read_regex(self.tok.start)?;
                self.tok = self.lex.next_token()?;
                Ok(Expr::Regex { pattern, flags })
            }
            Tok::Punct("[") => self.parse_array_literal(),
            Tok::Punct("{") => self.parse_object_literal(),
            Tok::Punct("<") => {
                let element = self.parse_jsx_after_lt()?;
                self.tok = self.lex.next_token()?;
                Ok(Expr::Jsx(Box::new(element)))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn build_template(&mut self, pieces: Vec<TemplatePiece>) -> PResult<Expr> {
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        for piece in pieces {
            match piece {
                TemplatePiece::Text(t) => quasis.push(t),
                TemplatePiece::Expr { start, end } => {
                    let mut sub = Parser::new(Lexer::with_range(self.lex.source(), start, end))?;
                    sub.depth = self.depth;
                    let expr = sub.parse_expression()?;
                    if sub.tok.tok != Tok::Eof {
                        return Err(sub.unexpected());
                    }
                    exprs.push(expr);
                }
            }
        }
        Ok(Expr::Template { quasis, exprs })
    }

    fn parse_array_literal(&mut self) -> PResult<Expr> {
        self.expect("[")?;
        let mut items = Vec::new();
        while !self.eat("]")? {
            if self.eat("...")? {
                items.push(Spreadable::Spread(self.parse_assign()?));
            } else {
                items.push(Spreadable::Item(self.parse_assign()?));
            }
            if !self.tok.is_punct("]") {
                self.expect(",")?;
            }
        }
        Ok(Expr::Array(items))
    }

    fn parse_object_literal(&mut self) -> PResult<Expr> {
        self.expect("{")?;
        let mut props = Vec::new();
        while !self.eat("}")? {
            if self.eat("...")? {
                props.push(PropDef::Spread(self.parse_assign()?));
            } else {
                let is_async = self.tok.is_ident("async") && {
                    let next = self.peek_token()?;
                    !next.newline_before && !matches!(next.tok, Tok::Punct(":" | "(" | "," | "}"))
                };
                if is_async {
                    self.bump()?;
                }
                let (key, shorthand_name) = match self.tok.tok.clone() {
                    Tok::Ident(name) => {
                        self.bump()?;
                        (PropKey::Static(name.clone()), Some(name))
                    }
                    Tok::Str(s) => {
                        self.bump()?;
                        (PropKey::Static(s), None)
                    }
                    Tok::Num(n) => {
                        self.bump()?;
                        (PropKey::Static(super::value::format_number(n)), None)
                    }
                    Tok::Punct("[") => {
                        self.bump()?;
                        let key = self.parse_assign()?;
                        self.expect("]")?;
                        (PropKey::Computed(Box::new(key)), None)
                    }
                    _ => return Err(self.unexpected()),
                };

                let value = if is_async && !self.tok.is_punct("(") {
                    return Err(self.unexpected());
                } else if self.eat(":")? {
                    self.parse_assign()?
                } else if self.tok.is_punct("(") {
                    let params = self.parse_params()?;
                    if self.eat(":")? {
                        self.skip_type()?;
                    }
                    let body = FunctionBody::Block(self.parse_block()?);
                    let name = match &key {
                        PropKey::Static(k) => Some(k.clone()),
                        PropKey::Computed(_) => None,
                    };
                    Expr::Function(Arc::new(FunctionDef { name, params, body, arrow: false, is_async }))
                } else if let Some(name) = shorthand_name.filter(|n| !RESERVED.contains(&n.as_str())) {
                    Expr::Ident(name)
                } else {
                    return Err(self.error_here("Unexpected token, expected \":\""));
                };
                props.push(PropDef::KeyValue(key, value));
            }
            if !self.tok.is_punct("}") {
                self.expect(",")?;
            }
        }
        Ok(Expr::Object(props))
    }

    // =========================================================================
    // JSX
    // =========================================================================

    fn jsx_error(&self, message: impl Into<String>, at: usize) -> ParseError {
        ParseError::at(self.lex.source(), message, at)
    }

    fn jsx_expect_char(&mut self, c: char) -> PResult<()> {
        let at = self.lex.pos();
        if self.lex.peek_significant()? == Some(c) {
            self.lex.set_pos(self.lex.pos() + c.len_utf8());
            Ok(())
        } else {
            Err(self.jsx_error(format!("Unexpected token, expected \"{c}\""), at))
        }
    }

    fn parse_jsx_name(&mut self) -> PResult<JsxName> {
        let (first, _) = self.lex.read_jsx_name()?;
        let mut parts = vec![first];
        while self.lex.peek_raw() == Some('.') {
            self.lex.set_pos(self.lex.pos() + 1);
            parts.push(self.lex.read_jsx_name()?.0);
        }
        let intrinsic = parts.len() == 1 && parts[0].starts_with(|c: char| c.is_ascii_lowercase());
        Ok(if intrinsic { JsxName::Intrinsic(parts.remove(0)) } else { JsxName::Component(parts) })
    }

    /// Parse an element whose `<` has just been consumed. Leaves the lexer
    /// directly after the element's final `>`.
    fn parse_jsx_after_lt(&mut self) -> PResult<JsxElement> {
        self.nested(Self::parse_jsx_element)
    }

    fn parse_jsx_element(&mut self) -> PResult<JsxElement> {
        let open_at = self.lex.pos().saturating_sub(1);
        if self.lex.peek_significant()? == Some('>') {
            self.lex.set_pos(self.lex.pos() + 1);
            let children = self.parse_jsx_children(None, open_at)?;
            return Ok(JsxElement { name: None, attrs: Vec::new(), children });
        }

        let name = self.parse_jsx_name()?;
        let mut attrs = Vec::new();
        loop {
            let at = self.lex.pos();
            match self.lex.peek_significant()? {
                Some('/') => {
                    self.lex.set_pos(self.lex.pos() + 1);
                    self.jsx_expect_char('>')?;
                    return Ok(JsxElement { name: Some(name), attrs, children: Vec::new() });
                }
                Some('>') => {
                    self.lex.set_pos(self.lex.pos() + 1);
                    let children = self.parse_jsx_children(Some(&name), open_at)?;
                    return Ok(JsxElement { name: Some(name), attrs, children });
                }
                Some('{') => {
                    self.lex.set_pos(self.lex.pos() + 1);
                    self.tok = self.lex.next_token()?;
                    self.expect("...")?;
                    let expr = self.parse_assign()?;
                    if !self.tok.is_punct("}") {
                        return Err(self.error_here("Unexpected token, expected \"}\""));
                    }
                    attrs.push(JsxAttr::Spread(expr));
                }
                Some(_) => {
                    let (attr_name, _) = self.lex.read_jsx_name()?;
                    let value = if self.lex.peek_significant()? == Some('=') {
                        self.lex.set_pos(self.lex.pos() + 1);
                        Some(self.parse_jsx_attr_value()?)
                    } else {
                        None
                    };
                    attrs.push(JsxAttr::Named { name: attr_name, value });
                }
                None => return Err(self.jsx_error("Unterminated JSX contents", at)),
            }
        }
    }

    fn parse_jsx_attr_value(&mut self) -> PResult<Expr> {
        let at = self.lex.pos();
        match self.lex.peek_significant()? {
            Some(q @ ('"' | '\'')) => {
                let start = self.lex.pos() + 1;
                let rest = &self.lex.source()[start..];
                let Some(len) = rest.find(q) else {
                    return Err(self.jsx_error("Unterminated string constant", at));
                };
                let text = decode_entities(&rest[..len]);
                self.lex.set_pos(start + len + 1);
                Ok(Expr::Str(text))
            }
            Some('{') => {
                self.lex.set_pos(self.lex.pos() + 1);
                self.tok = self.lex.next_token()?;
                let expr = self.parse_assign()?;
                if !self.tok.is_punct("}") {
                    return Err(self.error_here("Unexpected token, expected \"}\""));
                }
                Ok(expr)
            }
            Some('<') => {
                self.lex.set_pos(self.lex.pos() + 1);
                Ok(Expr::Jsx(Box::new(self.parse_jsx_after_lt()?)))
            }
            _ => Err(self.jsx_error("JSX value should be either an expression or a quoted JSX text", at)),
        }
    }

    fn parse_jsx_children(&mut self, name: Option<&JsxName>, open_at: usize) -> PResult<Vec<JsxChild>> {
        let mut children = Vec::new();
        loop {
            let (text, _) = self.lex.read_jsx_text();
            if let Some(text) = clean_jsx_text(&text) {
                children.push(JsxChild::Text(text));
            }
            let at = self.lex.pos();
            match self.lex.peek_raw() {
                None => return Err(self.jsx_error("Unterminated JSX contents", open_at)),
                Some('{') => {
                    self.lex.set_pos(at + 1);
                    self.tok = self.lex.next_token()?;
                    if self.tok.is_punct("}") {
                        continue;
                    }
                    let expr = self.parse_assign()?;
                    if !self.tok.is_punct("}") {
                        return Err(self.error_here("Unexpected token, expected \"}\""));
                    }
                    children.push(JsxChild::Expr(expr));
                }
                Some(_) => {
                    self.lex.set_pos(at + 1);
                    if self.lex.peek_significant()? == Some('/') {
                        self.lex.set_pos(self.lex.pos() + 1);
                        let closing = if self.lex.peek_significant()? == Some('>') {
                            None
                        } else {
                            Some(self.parse_jsx_name()?)
                        };
                        if closing.as_ref() != name {
                            let expected = name.map_or_else(|| "<>".to_owned(), |n| format!("<{}>", jsx_name_text(n)));
                            return Err(self.jsx_error(format!("Expected corresponding JSX closing tag for {expected}"), at));
                        }
                        self.jsx_expect_char('>')?;
                        return Ok(children);
                    }
                    children.push(JsxChild::Element(self.parse_jsx_after_lt()?));
                }
            }
        }
    }
}

fn jsx_name_text(name: &JsxName) -> String {
    match name {
        JsxName::Intrinsic(n) => n.clone(),
        JsxName::Component(parts) => parts.join("."),
    }
}

/// Collapse JSX text whitespace the way JSX compilers do: lines are trimmed,
/// blank lines dropped, remaining lines joined by one space.
fn clean_jsx_text(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    let last_non_empty = lines.iter().rposition(|l| l.chars().any(|c| c != ' ' && c != '\t'));
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut trimmed = line.replace('\t', " ");
        if i != 0 {
            trimmed = trimmed.trim_start_matches(' ').to_owned();
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches(' ').to_owned();
        }
        if !trimmed.is_empty() {
            if Some(i) != last_non_empty {
                trimmed.push(' ');
            }
            out.push_str(&trimmed);
        }
    }
    if out.is_empty() { None } else { Some(decode_entities(&out)) }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "nbsp" => Some('\u{a0}'),
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
