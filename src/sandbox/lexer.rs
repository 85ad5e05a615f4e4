//! On-demand tokenizer for the component dialect.
//!
//! DESIGN
//! ======
//! The parser pulls one token at a time and may reposition the lexer, which
//! is what JSX needs: element children are read as raw text straight from the
//! source offset following `>` or `}`, never as tokens. A lexer covers a byte
//! range of the full source so template-literal expressions can be re-lexed
//! in place and still report absolute line/column positions.

use super::parse::ParseError;

/// Template literals nested inside `${}` deeper than this are rejected.
const MAX_TEMPLATE_NESTING: usize = 64;

const REGEX_FLAGS: &str = "dgimsuvy";

/// Punctuators, longest first so greedy matching picks `===` over `==`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "**=", "...", "??=", "||=", "&&=", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--",
    "+=", "-=", "*=", "/=", "%=", "**", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%", "!",
    "=", "?", ":", ".", "&", "|", "~",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Num(f64),
    Str(String),
    Template(Vec<TemplatePiece>),
    Punct(&'static str),
    Eof,
}

/// One segment of a template literal. Expression pieces keep their absolute
/// byte range so the parser can lex them in place.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePiece {
    Text(String),
    Expr { start: usize, end: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub start: usize,
    pub end: usize,
    /// A line terminator appeared between the previous token and this one.
    pub newline_before: bool,
}

impl Token {
    #[must_use]
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(&self.tok, Tok::Punct(q) if *q == p)
    }

    #[must_use]
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.tok, Tok::Ident(n) if n == name)
    }
}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    end: usize,
    templates: usize,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0, end: src.len(), templates: 0 }
    }

    /// Lexer over `src[start..end]` with positions relative to all of `src`.
    #[must_use]
    pub fn with_range(src: &'a str, start: usize, end: usize) -> Self {
        Self { src, pos: start, end, templates: 0 }
    }

    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.end);
    }

    #[must_use]
    pub fn source(&self) -> &'a str {
        self.src
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..self.end].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src[self.pos..self.end].chars().nth(offset)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>, at: usize) -> ParseError {
        ParseError::at(self.src, message, at)
    }

    /// Skip whitespace and comments. Returns whether a newline was crossed.
    fn skip_trivia(&mut self) -> Result<bool, ParseError> {
        let mut newline = false;
        loop {
            match self.peek() {
                Some('\n') => {
                    newline = true;
                    self.pos += 1;
                }
                Some(c) if c.is_whitespace() => {
                    self.pos += c.len_utf8();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += c.len_utf8();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.pos += 1;
                                break;
                            }
                            Some('\n') => newline = true,
                            Some(_) => {}
                            None => return Err(self.error("Unterminated comment", start)),
                        }
                    }
                }
                _ => return Ok(newline),
            }
        }
    }

    /// Lex the next token in expression context.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] on unterminated literals or stray characters.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        let newline_before = self.skip_trivia()?;
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Token { tok: Tok::Eof, start, end: start, newline_before });
        };

        let tok = if is_ident_start(c) {
            Tok::Ident(self.read_ident())
        } else if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            Tok::Num(self.read_number()?)
        } else if c == '"' || c == '\'' {
            Tok::Str(self.read_string(c)?)
        } else if c == '`' {
            Tok::Template(self.read_template()?)
        } else {
            let rest = &self.src[self.pos..self.end];
            let Some(p) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) else {
                return Err(self.error(format!("Unexpected character '{c}'"), start));
            };
            // `a?.5:b` is a conditional, not optional chaining.
            let p = if *p == "?." && self.peek_at(2).is_some_and(|d| d.is_ascii_digit()) { "?" } else { *p };
            self.pos += p.len();
            Tok::Punct(p)
        };

        Ok(Token { tok, start, end: self.pos, newline_before })
    }

    /// Identifier that may contain `-`, as used by JSX tag and attribute names.
    pub fn read_jsx_name(&mut self) -> Result<(String, usize), ParseError> {
        self.skip_trivia()?;
        let start = self.pos;
        match self.peek() {
            Some(c) if is_ident_start(c) => {}
            _ => return Err(self.error("Unexpected token, expected JSX identifier", start)),
        }
        while let Some(c) = self.peek() {
            if is_ident_part(c) || c == '-' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        Ok((self.src[start..self.pos].to_owned(), start))
    }

    /// Raw JSX text up to the next `<` or `{`. Returns the text and its start.
    pub fn read_jsx_text(&mut self) -> (String, usize) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '<' || c == '{' {
                break;
            }
            self.pos += c.len_utf8();
        }
        (self.src[start..self.pos].to_owned(), start)
    }

    /// Next significant character without consuming it (JSX child dispatch).
    pub fn peek_significant(&mut self) -> Result<Option<char>, ParseError> {
        self.skip_trivia()?;
        Ok(self.peek())
    }

    /// Raw character under the cursor, no trivia skipping.
    #[must_use]
    pub fn peek_raw(&self) -> Option<char> {
        self.peek()
    }

    /// Re-read the `/` token at `start` as a regular expression literal.
    /// Only valid where the parser expects an operand. Returns the pattern
    /// body and the flags.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for an unterminated literal or a bad flag.
    pub fn read_regex(&mut self, start: usize) -> Result<(String, String), ParseError> {
        self.pos = start + 1;
        let mut in_class = false;
        let body_end = loop {
            let at = self.pos;
            match self.bump() {
                Some('\\') => {
                    if matches!(self.bump(), None | Some('\n')) {
                        return Err(self.error("Unterminated regular expression", start));
                    }
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break at,
                Some('\n') | None => return Err(self.error("Unterminated regular expression", start)),
                Some(_) => {}
            }
        };
        let flags_at = self.pos;
        let flags = self.read_ident();
        for (i, flag) in flags.char_indices() {
            if !REGEX_FLAGS.contains(flag) || flags[..i].contains(flag) {
                return Err(self.error("Invalid regular expression flag", flags_at + i));
            }
        }
        Ok((self.src[start + 1..body_end].to_owned(), flags))
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_ident_part(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.src[start..self.pos].to_owned()
    }

    fn read_number(&mut self) -> Result<f64, ParseError> {
        let start = self.pos;
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit() || c == '_') {
                self.pos += 1;
            }
            let digits: String = self.src[digits_start..self.pos].chars().filter(|c| *c != '_').collect();
            return u64::from_str_radix(&digits, 16)
                .map(|n| n as f64)
                .map_err(|_| self.error("Invalid hexadecimal literal", start));
        }

        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => self.pos += 1,
                '.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    self.pos += 1;
                }
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some('+' | '-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        if self.peek().is_some_and(is_ident_start) {
            return Err(self.error("Identifier directly after number", self.pos));
        }
        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        text.parse::<f64>().map_err(|_| self.error("Invalid number", start))
    }

    fn read_escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        let at = self.pos;
        let Some(c) = self.bump() else {
            return Err(self.error("Unterminated string constant", at));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            'x' => {
                let hex = self.take_hex(2, at)?;
                out.push(char::from_u32(hex).ok_or_else(|| self.error("Bad character escape", at))?);
            }
            'u' => {
                let code = if self.peek() == Some('{') {
                    self.pos += 1;
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                        self.pos += 1;
                    }
                    let code = u32::from_str_radix(&self.src[start..self.pos], 16)
                        .map_err(|_| self.error("Bad character escape", at))?;
                    if self.bump() != Some('}') {
                        return Err(self.error("Bad character escape", at));
                    }
                    code
                } else {
                    self.take_hex(4, at)?
                };
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn take_hex(&mut self, len: usize, at: usize) -> Result<u32, ParseError> {
        let start = self.pos;
        for _ in 0..len {
            if !self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                return Err(self.error("Bad character escape", at));
            }
            self.pos += 1;
        }
        u32::from_str_radix(&self.src[start..self.pos], 16).map_err(|_| self.error("Bad character escape", at))
    }

    fn read_string(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.read_escape(&mut out)?,
                Some('\n') | None => return Err(self.error("Unterminated string constant", start)),
                Some(c) => out.push(c),
            }
        }
    }

    fn read_template(&mut self) -> Result<Vec<TemplatePiece>, ParseError> {
        let start = self.pos;
        if self.templates >= MAX_TEMPLATE_NESTING {
            return Err(self.error("Template literal is nested too deeply", start));
        }
        self.templates += 1;
        let pieces = self.read_template_pieces(start);
        self.templates -= 1;
        pieces
    }

    fn read_template_pieces(&mut self, start: usize) -> Result<Vec<TemplatePiece>, ParseError> {
        self.pos += 1;
        let mut pieces = Vec::new();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('`') => break,
                Some('\\') => self.read_escape(&mut text)?,
                Some('$') if self.peek() == Some('{') => {
                    self.pos += 1;
                    pieces.push(TemplatePiece::Text(std::mem::take(&mut text)));
                    let expr_start = self.pos;
                    let expr_end = self.skip_balanced_braces(start)?;
                    pieces.push(TemplatePiece::Expr { start: expr_start, end: expr_end });
                }
                Some(c) => text.push(c),
                None => return Err(self.error("Unterminated template", start)),
            }
        }
        pieces.push(TemplatePiece::Text(text));
        Ok(pieces)
    }

    /// Advance past the `}` closing a `${`, returning the offset of that `}`.
    fn skip_balanced_braces(&mut self, template_start: usize) -> Result<usize, ParseError> {
        let mut depth = 0usize;
        loop {
            let at = self.pos;
            match self.bump() {
                Some('{') => depth += 1,
                Some('}') if depth == 0 => return Ok(at),
                Some('}') => depth -= 1,
                Some(q @ ('"' | '\'')) => {
                    self.pos = at;
                    self.read_string(q)?;
                }
                Some('`') => {
                    self.pos = at;
                    self.read_template()?;
                }
                Some(_) => {}
                None => return Err(self.error("Unterminated template", template_start)),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

#[cfg(test)]
#[path = "lexer_test.rs"]
mod tests;
