//! Identifier resolution.
//!
//! Binds every identifier to a frame slot, a global slot, or a host/universe
//! name. Names assigned anywhere in a function body are local to that
//! function; names assigned at module level are globals. Nested functions may
//! only see globals, never an enclosing function's locals.

use super::ast::*;
use super::SyntaxError;
use indexmap::IndexMap;
use std::sync::Arc;

/// Resolve `file`, returning a new tree with every identifier bound.
pub fn resolve(
    file: File,
    is_predeclared: &dyn Fn(&str) -> bool,
    is_universal: &dyn Fn(&str) -> bool,
) -> Result<File, SyntaxError> {
    let mut resolver = Resolver {
        filename: &file.filename,
        globals: IndexMap::new(),
        frames: Vec::new(),
        loop_depth: 0,
        is_predeclared,
        is_universal,
    };
    resolver.collect_globals(&file.stmts)?;
    let stmts = resolver.block(file.stmts)?;
    let globals = resolver.globals.keys().cloned().collect();
    Ok(File {
        filename: file.filename,
        stmts,
        globals,
    })
}

struct Resolver<'a> {
    filename: &'a str,
    globals: IndexMap<String, usize>,
    /// One entry per enclosing function, innermost last.
    frames: Vec<IndexMap<String, usize>>,
    /// Loops enclosing the current statement within the current function.
    loop_depth: usize,
    is_predeclared: &'a dyn Fn(&str) -> bool,
    is_universal: &'a dyn Fn(&str) -> bool,
}

impl<'a> Resolver<'a> {
    fn error(&self, pos: Pos, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.filename, pos.line, pos.col, message)
    }

    fn collect_globals(&mut self, stmts: &[Stmt]) -> Result<(), SyntaxError> {
        for stmt in stmts {
            match stmt {
                Stmt::Def(def) => self.declare_global(&def.name, true)?,
                Stmt::Assign { target, op, .. } => self.declare_global(target, op.is_none())?,
                Stmt::For { var, body, .. } => {
                    self.declare_global(var, false)?;
                    self.collect_globals(body)?;
                }
                Stmt::If {
                    then, otherwise, ..
                } => {
                    self.collect_globals(then)?;
                    self.collect_globals(otherwise)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn declare_global(&mut self, id: &Ident, rebinding_is_error: bool) -> Result<(), SyntaxError> {
        if self.globals.contains_key(&id.name) {
            if rebinding_is_error {
                return Err(self.error(id.pos, format!("cannot reassign global {}", id.name)));
            }
            return Ok(());
        }
        let slot = self.globals.len();
        self.globals.insert(id.name.clone(), slot);
        Ok(())
    }

    fn block(&mut self, stmts: Vec<Stmt>) -> Result<Vec<Stmt>, SyntaxError> {
        stmts.into_iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt(&mut self, stmt: Stmt) -> Result<Stmt, SyntaxError> {
        Ok(match stmt {
            Stmt::Def(def) => Stmt::Def(Arc::new(self.def(Arc::unwrap_or_clone(def))?)),
            Stmt::Expr(e) => Stmt::Expr(self.expr(e)?),
            Stmt::Assign {
                pos,
                target,
                op,
                value,
            } => {
                let value = self.expr(value)?;
                let target = self.bind(target)?;
                Stmt::Assign {
                    pos,
                    target,
                    op,
                    value,
                }
            }
            Stmt::Return { pos, value } => {
                if self.frames.is_empty() {
                    return Err(self.error(pos, "return statement not within a function"));
                }
                Stmt::Return {
                    pos,
                    value: value.map(|v| self.expr(v)).transpose()?,
                }
            }
            Stmt::If {
                pos,
                cond,
                then,
                otherwise,
            } => Stmt::If {
                pos,
                cond: self.expr(cond)?,
                then: self.block(then)?,
                otherwise: self.block(otherwise)?,
            },
            Stmt::For {
                pos,
                var,
                iter,
                body,
            } => {
                let iter = self.expr(iter)?;
                let var = self.bind(var)?;
                self.loop_depth += 1;
                let body = self.block(body);
                self.loop_depth -= 1;
                Stmt::For {
                    pos,
                    var,
                    iter,
                    body: body?,
                }
            }
            Stmt::Break(pos) | Stmt::Continue(pos) if self.loop_depth == 0 => {
                return Err(self.error(pos, "break/continue not within a loop"));
            }
            other => other,
        })
    }

    fn def(&mut self, def: DefStmt) -> Result<DefStmt, SyntaxError> {
        // Defaults are evaluated in the enclosing scope, at definition time.
        let mut params = Vec::with_capacity(def.params.len());
        let mut defaults = Vec::with_capacity(def.params.len());
        for p in def.params {
            defaults.push(p.default.map(|d| self.expr(d)).transpose()?);
            params.push(p.name);
        }
        let name = self.bind(def.name)?;

        let mut frame: IndexMap<String, usize> = IndexMap::new();
        for p in &params {
            let slot = frame.len();
            frame.insert(p.name.clone(), slot);
        }
        collect_locals(&def.body, &mut frame);

        self.frames.push(frame);
        let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.block(def.body);
        self.loop_depth = outer_loops;
        let frame = self.frames.pop().unwrap_or_default();
        let body = body?;

        let params = params
            .into_iter()
            .zip(defaults)
            .map(|(pname, default)| {
                let slot = frame.get(&pname.name).copied().unwrap_or(0);
                Param {
                    name: Ident {
                        binding: Binding::Local(slot),
                        ..pname
                    },
                    default,
                }
            })
            .collect();

        Ok(DefStmt {
            pos: def.pos,
            name,
            params,
            body,
            num_locals: frame.len(),
        })
    }

    /// Resolve an identifier in a binding position.
    fn bind(&mut self, id: Ident) -> Result<Ident, SyntaxError> {
        let binding = match self.frames.last() {
            Some(frame) => match frame.get(&id.name) {
                Some(slot) => Binding::Local(*slot),
                None => return Err(self.error(id.pos, format!("internal: unbound local {}", id.name))),
            },
            None => match self.globals.get(&id.name) {
                Some(slot) => Binding::Global(*slot),
                None => return Err(self.error(id.pos, format!("internal: unbound global {}", id.name))),
            },
        };
        Ok(Ident { binding, ..id })
    }

    /// Resolve an identifier in a use position.
    fn use_ident(&self, id: Ident) -> Result<Ident, SyntaxError> {
        let binding = if let Some(slot) = self.frames.last().and_then(|f| f.get(&id.name)) {
            Binding::Local(*slot)
        } else if self.frames.len() > 1
            && self.frames[..self.frames.len() - 1]
                .iter()
                .any(|f| f.contains_key(&id.name))
        {
            return Err(self.error(
                id.pos,
                format!(
                    "{} is a local of an enclosing function; nested functions cannot capture it",
                    id.name
                ),
            ));
        } else if let Some(slot) = self.globals.get(&id.name) {
            Binding::Global(*slot)
        } else if (self.is_predeclared)(&id.name) {
            Binding::Predeclared
        } else if (self.is_universal)(&id.name) {
            Binding::Universal
        } else {
            return Err(self.error(id.pos, format!("undefined: {}", id.name)));
        };
        Ok(Ident { binding, ..id })
    }

    fn expr(&mut self, expr: Expr) -> Result<Expr, SyntaxError> {
        let pos = expr.pos;
        let kind = match expr.kind {
            ExprKind::Ident(id) => ExprKind::Ident(self.use_ident(id)?),
            k @ (ExprKind::Str(_) | ExprKind::Int(_)) => k,
            ExprKind::List(items) => ExprKind::List(
                items
                    .into_iter()
                    .map(|e| self.expr(e))
                    .collect::<Result<_, _>>()?,
            ),
            ExprKind::Call { func, args } => ExprKind::Call {
                func: Box::new(self.expr(*func)?),
                args: args
                    .into_iter()
                    .map(|a| match a {
                        Arg::Positional(e) => self.expr(e).map(Arg::Positional),
                        Arg::Keyword { name, value } => {
                            self.expr(value).map(|value| Arg::Keyword { name, value })
                        }
                    })
                    .collect::<Result<_, _>>()?,
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op,
                lhs: Box::new(self.expr(*lhs)?),
                rhs: Box::new(self.expr(*rhs)?),
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: Box::new(self.expr(*operand)?),
            },
            ExprKind::Index { target, index } => ExprKind::Index {
                target: Box::new(self.expr(*target)?),
                index: Box::new(self.expr(*index)?),
            },
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => ExprKind::Cond {
                cond: Box::new(self.expr(*cond)?),
                then: Box::new(self.expr(*then)?),
                otherwise: Box::new(self.expr(*otherwise)?),
            },
        };
        Ok(Expr { pos, kind })
    }
}

/// Gather names bound inside a function body, not descending into nested defs.
fn collect_locals(stmts: &[Stmt], frame: &mut IndexMap<String, usize>) {
    fn add(name: &str, frame: &mut IndexMap<String, usize>) {
        if !frame.contains_key(name) {
            let slot = frame.len();
            frame.insert(name.to_string(), slot);
        }
    }
    for stmt in stmts {
        match stmt {
            Stmt::Def(def) => add(&def.name.name, frame),
            Stmt::Assign { target, .. } => add(&target.name, frame),
            Stmt::For { var, body, .. } => {
                add(&var.name, frame);
                collect_locals(body, frame);
            }
            Stmt::If {
                then, otherwise, ..
            } => {
                collect_locals(then, frame);
                collect_locals(otherwise, frame);
            }
            _ => {}
        }
    }
}
