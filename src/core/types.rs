//! FX-001: Target records.
//!
//! A target is a top-level `def` whose first parameter is named `fx`. Its
//! dependencies are read statically from the `depends_on` default.

use serde::Serialize;
use std::fmt;

// ============================================================================
// Targets
// ============================================================================

/// A named, dependency-aware unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// The defining function's name; unique within a module.
    pub name: String,

    /// Target names that must complete first, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Template target this one was generated from. Reserved; nothing sets it yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Source line of the `def`.
    pub line: u32,
}

impl Target {
    pub fn new(name: impl Into<String>, depends_on: Vec<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            depends_on,
            parent: None,
            line,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.depends_on.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} (depends on: {})", self.name, self.depends_on.join(", "))
        }
    }
}
