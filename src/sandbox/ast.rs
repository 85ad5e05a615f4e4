//! AST for generated component source.
//!
//! One tree covers both dialects: the parser produces the extended dialect
//! (with [`Expr::Jsx`] nodes), and [`super::transpile::lower`] rewrites it into
//! the plain dialect where no JSX node remains.

use std::sync::Arc;

/// A parsed source file.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
}

// =============================================================================
// STATEMENTS
// =============================================================================

#[derive(Debug, Clone)]
pub enum Stmt {
    Var { kind: VarKind, decls: Vec<Declarator> },
    Function(Arc<FunctionDef>),
    Return(Option<Expr>),
    If { test: Expr, then: Box<Stmt>, otherwise: Option<Box<Stmt>> },
    Block(Vec<Stmt>),
    For { init: Option<Box<Stmt>>, test: Option<Expr>, update: Option<Expr>, body: Box<Stmt> },
    ForOf { kind: VarKind, target: Pattern, iter: Expr, body: Box<Stmt> },
    While { test: Expr, body: Box<Stmt> },
    Break,
    Continue,
    Throw(Expr),
    Try { block: Vec<Stmt>, param: Option<Pattern>, handler: Option<Vec<Stmt>>, finalizer: Option<Vec<Stmt>> },
    Switch { discriminant: Expr, cases: Vec<SwitchCase> },
    Expr(Expr),
    Empty,
}

/// One `case` arm; `test == None` is `default`.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Const,
    Let,
    Var,
}

impl VarKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Const => "const",
            Self::Let => "let",
            Self::Var => "var",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub target: Pattern,
    pub init: Option<Expr>,
}

// =============================================================================
// PATTERNS
// =============================================================================

/// Binding target of a declaration or parameter.
#[derive(Debug, Clone)]
pub enum Pattern {
    Ident(String),
    Array { items: Vec<Option<PatternItem>>, rest: Option<Box<Pattern>> },
    Object { props: Vec<(String, PatternItem)>, rest: Option<Box<Pattern>> },
}

#[derive(Debug, Clone)]
pub struct PatternItem {
    pub target: Pattern,
    pub default: Option<Expr>,
}

// =============================================================================
// FUNCTIONS
// =============================================================================

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    pub arrow: bool,
    /// `async` functions return a promise settled by the time the call returns.
    pub is_async: bool,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub target: Pattern,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    Expr(Box<Expr>),
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    Str(String),
    Regex { pattern: String, flags: String },
    Template { quasis: Vec<String>, exprs: Vec<Expr> },
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Array(Vec<Spreadable>),
    Object(Vec<PropDef>),
    Function(Arc<FunctionDef>),
    Unary { op: UnaryOp, arg: Box<Expr> },
    Await(Box<Expr>),
    Update { op: UpdateOp, prefix: bool, target: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Logical { op: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
    Assign { op: AssignOp, target: Box<Expr>, value: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Spreadable>, optional: bool },
    New { callee: Box<Expr>, args: Vec<Spreadable> },
    Member { object: Box<Expr>, property: MemberProp, optional: bool },
    Jsx(Box<JsxElement>),
}

/// An array element or call argument, optionally spread.
#[derive(Debug, Clone)]
pub enum Spreadable {
    Item(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum PropDef {
    KeyValue(PropKey, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum PropKey {
    Static(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum MemberProp {
    Static(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

impl BinaryOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Pow => "**",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

impl LogicalOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Nullish => "??",
        }
    }
}

/// Assignment operator. `Compound` carries the arithmetic part of `+=` etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
    Logical(LogicalOp),
}

// =============================================================================
// JSX
// =============================================================================

/// A JSX element. `name == None` is a fragment (`<>...</>`).
#[derive(Debug, Clone)]
pub struct JsxElement {
    pub name: Option<JsxName>,
    pub attrs: Vec<JsxAttr>,
    pub children: Vec<JsxChild>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsxName {
    /// Lowercase host tag such as `div` or `svg`.
    Intrinsic(String),
    /// Capitalized or dotted reference such as `Card` or `React.Fragment`.
    Component(Vec<String>),
}

#[derive(Debug, Clone)]
pub enum JsxAttr {
    Named { name: String, value: Option<Expr> },
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum JsxChild {
    Text(String),
    Expr(Expr),
    Element(JsxElement),
}
