//! Syntax tree for fx scripts.
//!
//! Trees are plain values: the resolver and the engine's rewrite both take a
//! tree by value and hand back a new one.

use std::sync::Arc;

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

/// What an identifier refers to, filled in by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    #[default]
    Unresolved,
    /// Slot in the enclosing function's frame.
    Local(usize),
    /// Slot in the module's global table.
    Global(usize),
    /// Name supplied by the host (`cmd`, `pipe`, `_do`, ...).
    Predeclared,
    /// Name from the language universe (`len`, `True`, ...).
    Universal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
    pub binding: Binding,
}

impl Ident {
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Self {
            name: name.into(),
            pos,
            binding: Binding::Unresolved,
        }
    }
}

/// A parsed file: the top-level statements plus resolver output.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub filename: String,
    pub stmts: Vec<Stmt>,
    /// Global names in slot order; empty until resolved.
    pub globals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Def(Arc<DefStmt>),
    Expr(Expr),
    Assign {
        pos: Pos,
        target: Ident,
        op: Option<BinOp>,
        value: Expr,
    },
    Return {
        pos: Pos,
        value: Option<Expr>,
    },
    If {
        pos: Pos,
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    For {
        pos: Pos,
        var: Ident,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Pass(Pos),
    Break(Pos),
    Continue(Pos),
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Def(d) => d.pos,
            Stmt::Expr(e) => e.pos,
            Stmt::Assign { pos, .. }
            | Stmt::Return { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::For { pos, .. } => *pos,
            Stmt::Pass(pos) | Stmt::Break(pos) | Stmt::Continue(pos) => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefStmt {
    pub pos: Pos,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    /// Frame size; set by the resolver.
    pub num_locals: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub pos: Pos,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(pos: Pos, kind: ExprKind) -> Self {
        Self { pos, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(Ident),
    Str(String),
    Int(i64),
    List(Vec<Expr>),
    Call {
        func: Box<Expr>,
        args: Vec<Arg>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword { name: String, value: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}
