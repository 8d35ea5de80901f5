//! Runtime values.
//!
//! Every value is `Send + Sync`: action plans travel into pipeline worker
//! threads, and frozen globals may be read from any of them.

use super::ast::DefStmt;
use crate::action::{ActionPlan, ExecContext};
use crate::core::error::{FxError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Function(Arc<Function>),
    Builtin(Arc<dyn Builtin>),
    Action(Arc<ActionPlan>),
}

/// A script-defined function: its definition plus defaults evaluated at `def` time.
pub struct Function {
    pub def: Arc<DefStmt>,
    pub defaults: Vec<Option<Value>>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.def.name.name
    }
}

/// A host-provided callable.
pub trait Builtin: Send + Sync {
    fn name(&self) -> &str;
    fn call(&self, ctx: &ExecContext, args: Args) -> Result<Value>;
}

/// Arguments to a call, positional first.
#[derive(Default, Clone)]
pub struct Args {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

impl Args {
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: Vec::new(),
        }
    }

    /// Reject keyword arguments for builtins that take none.
    pub fn no_named(&self, fname: &str) -> Result<()> {
        match self.named.first() {
            Some((name, _)) => Err(FxError::script_invalid(format!(
                "{}: unexpected keyword argument '{}'",
                fname, name
            ))),
            None => Ok(()),
        }
    }
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function",
            Value::Action(_) => "action_plan",
        }
    }

    pub fn truth(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&Arc<ActionPlan>> {
        match self {
            Value::Action(a) => Some(a),
            _ => None,
        }
    }

    /// Quoted, unambiguous rendering (strings are quoted).
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", s),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            other => other.to_string(),
        }
    }

    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name() == b.name(),
            (Value::Action(a), Value::Action(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering for `<`-style comparisons; `None` when the types are unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(_) => write!(f, "{}", self.repr()),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
            Value::Action(plan) => write!(f, "{}", plan),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}
