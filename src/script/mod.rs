//! FX-010: Script front-end: a small Starlark dialect.
//!
//! Source goes through [`parse`], then [`resolve`] binds every identifier to a
//! local slot, a global slot, a predeclared name or a universe name. Resolution
//! is a pure tree-to-tree transform, so a tree can be rewritten and resolved
//! again. [`Program`] runs module-level code once and freezes the globals.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod resolve;
pub mod value;

pub use eval::{is_universal, Globals, Predeclared, Program};
pub use parser::parse;
pub use resolve::resolve;
pub use value::{Args, Builtin, Function, Value};

use thiserror::Error;

/// A positioned syntax or resolution error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{filename}:{line}:{col}: {message}")]
pub struct SyntaxError {
    pub filename: String,
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl SyntaxError {
    pub fn new(filename: impl Into<String>, line: u32, col: u32, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            line,
            col,
            message: message.into(),
        }
    }
}
