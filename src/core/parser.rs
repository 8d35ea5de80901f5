//! FX-002: Module parsing and target extraction.
//!
//! Parses fx source and discovers targets without executing anything:
//! - Only top-level `def`s are considered
//! - A `def` is a target iff its first parameter is named `fx`
//! - `depends_on` defaults must be a string literal or a list of them
//! - Target names are unique within a module

use super::error::{FxError, Result};
use super::resolver;
use super::types::Target;
use crate::script::ast::{DefStmt, Expr, ExprKind, File, Stmt};
use crate::script::parse;
use indexmap::IndexMap;
use std::path::Path;

/// A parsed fx file and the targets it declares.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    ast: File,
    targets: IndexMap<String, Target>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The syntax tree as parsed, before any resolution or rewriting.
    pub fn ast(&self) -> &File {
        &self.ast
    }

    /// Targets in declaration order.
    pub fn list_targets(&self) -> Vec<&Target> {
        self.targets.values().collect()
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn targets(&self) -> &IndexMap<String, Target> {
        &self.targets
    }

    /// The targets `names` would invoke, in invocation order.
    pub fn plan(&self, names: &[String]) -> Result<Vec<String>> {
        resolver::schedule(&self.targets, names)
    }
}

/// Parse an fx file from disk.
pub fn parse_module_file(path: &Path) -> Result<Module> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| FxError::io(format!("failed to read {}", path.display()), e))?;
    parse_module(&path.display().to_string(), &text)
}

/// Parse fx source and extract its targets.
pub fn parse_module(name: &str, text: &str) -> Result<Module> {
    let ast = parse(name, text).map_err(|source| FxError::Unparsable {
        phase: "parse",
        source,
    })?;
    let targets = find_targets(&ast)?;
    tracing::debug!(module = name, targets = targets.len(), "module parsed");
    Ok(Module {
        name: name.to_string(),
        ast,
        targets,
    })
}

/// Scan top-level statements for target definitions.
pub fn find_targets(ast: &File) -> Result<IndexMap<String, Target>> {
    let mut targets = IndexMap::new();
    for stmt in &ast.stmts {
        let Stmt::Def(def) = stmt else { continue };
        let Some(first) = def.params.first() else { continue };
        if first.name.name != "fx" {
            continue;
        }
        let target = Target::new(def.name.name.clone(), depends_on(def)?, def.pos.line);
        if targets.contains_key(&target.name) {
            return Err(FxError::DuplicateTarget {
                target: target.name,
            });
        }
        targets.insert(target.name.clone(), target);
    }
    Ok(targets)
}

/// Read the `depends_on` default, if declared. Other parameters are ignored.
fn depends_on(def: &DefStmt) -> Result<Vec<String>> {
    let restriction = || FxError::DependsOnRestriction {
        target: def.name.name.clone(),
    };
    let Some(param) = def.params[1..].iter().find(|p| p.name.name == "depends_on") else {
        return Ok(Vec::new());
    };
    let Some(default) = &param.default else {
        return Ok(Vec::new());
    };
    match &default.kind {
        ExprKind::Str(s) => Ok(vec![s.clone()]),
        ExprKind::List(items) => items
            .iter()
            .map(|item| string_literal(item).ok_or_else(restriction))
            .collect(),
        _ => Err(restriction()),
    }
}

fn string_literal(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Str(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    const MAKEFILE: &str = r#"
def helper(x):
    return x

def prep(fx):
    cmd("mkdir -p out")

def build(fx, depends_on=["prep"]):
    cmd("make")

def test(fx, depends_on="build", verbose=True):
    cmd("make test")
"#;

    #[test]
    fn test_fx002_finds_targets_in_order() {
        let m = parse_module("make.fx", MAKEFILE).unwrap();
        let names: Vec<&str> = m.list_targets().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["prep", "build", "test"]);
        assert_eq!(m.target("build").unwrap().depends_on, ["prep"]);
        assert_eq!(m.target("test").unwrap().depends_on, ["build"]);
        assert_eq!(m.target("prep").unwrap().line, 5);
    }

    #[test]
    fn test_fx002_helpers_are_not_targets() {
        let m = parse_module("make.fx", MAKEFILE).unwrap();
        assert!(m.target("helper").is_none());
    }

    #[test]
    fn test_fx002_nested_defs_are_not_targets() {
        let src = "def outer(x):\n    def inner(fx):\n        pass\n    return inner\n";
        let m = parse_module("make.fx", src).unwrap();
        assert!(m.list_targets().is_empty());
    }

    #[test]
    fn test_fx002_fx_must_be_first() {
        let m = parse_module("make.fx", "def f(a, fx):\n    pass\n").unwrap();
        assert!(m.list_targets().is_empty());
    }

    #[test]
    fn test_fx002_depends_on_restriction() {
        for bad in [
            "def b(fx, depends_on=prep):\n    pass\n",
            "def b(fx, depends_on=[\"a\", 1]):\n    pass\n",
            "def b(fx, depends_on=\"a\" + \"b\"):\n    pass\n",
            "def b(fx, depends_on=[[\"a\"]]):\n    pass\n",
        ] {
            let err = parse_module("make.fx", bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ScriptInvalid, "{bad}");
            assert_eq!(err.detail("target").as_deref(), Some("b"));
        }
    }

    #[test]
    fn test_fx002_empty_depends_on_list() {
        let m = parse_module("make.fx", "def a(fx, depends_on=[]):\n    pass\n").unwrap();
        assert!(m.target("a").unwrap().depends_on.is_empty());
    }

    #[test]
    fn test_fx002_duplicate_target() {
        let err = parse_module("make.fx", "def a(fx):\n    pass\ndef a(fx):\n    pass\n").unwrap_err();
        assert!(matches!(err, FxError::DuplicateTarget { .. }));
    }

    #[test]
    fn test_fx002_syntax_error_is_unparsable() {
        let err = parse_module("make.fx", "def a(fx)\n    pass\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unparsable);
        assert_eq!(err.detail("phase").as_deref(), Some("parse"));
    }

    #[test]
    fn test_fx002_deep_nesting_is_unparsable() {
        let src = format!("x = {}1{}\n", "(".repeat(20_000), ")".repeat(20_000));
        let err = parse_module("make.fx", &src).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unparsable);
        assert_eq!(err.detail("phase").as_deref(), Some("parse"));
        assert!(err.to_string().contains("nested too deeply"));
    }

    #[test]
    fn test_fx002_parse_module_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("make.fx");
        std::fs::write(&path, MAKEFILE).unwrap();
        let m = parse_module_file(&path).unwrap();
        assert_eq!(m.list_targets().len(), 3);
        assert!(parse_module_file(&dir.path().join("missing.fx")).is_err());
    }
}
