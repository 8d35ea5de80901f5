//! FX-008: Bare-call rewrite.
//!
//! Inside function bodies, every statement that is only a call expression
//! becomes `_do(<call>)`, so a bare `cmd("...")` line runs like a shell line.
//! Calls whose value is used (assigned, passed, returned) are untouched.
//! Module-level statements are left alone so initialization stays free of
//! effects.

use crate::action::builtins::IMPLICIT_DO;
use crate::script::ast::{Arg, DefStmt, Expr, ExprKind, File, Ident, Stmt};
use std::sync::Arc;

/// Produce a new tree with bare calls in function bodies wrapped.
pub fn rewrite(file: File) -> File {
    let stmts = file
        .stmts
        .into_iter()
        .map(|stmt| match stmt {
            Stmt::Def(def) => Stmt::Def(rewrite_def(&def)),
            other => other,
        })
        .collect();
    File { stmts, ..file }
}

fn rewrite_def(def: &DefStmt) -> Arc<DefStmt> {
    Arc::new(DefStmt {
        body: rewrite_block(&def.body),
        ..def.clone()
    })
}

fn rewrite_block(stmts: &[Stmt]) -> Vec<Stmt> {
    stmts.iter().map(rewrite_stmt).collect()
}

fn rewrite_stmt(stmt: &Stmt) -> Stmt {
    match stmt {
        Stmt::Expr(e) if matches!(e.kind, ExprKind::Call { .. }) => Stmt::Expr(force(e.clone())),
        Stmt::Def(def) => Stmt::Def(rewrite_def(def)),
        Stmt::If {
            pos,
            cond,
            then,
            otherwise,
        } => Stmt::If {
            pos: *pos,
            cond: cond.clone(),
            then: rewrite_block(then),
            otherwise: rewrite_block(otherwise),
        },
        Stmt::For {
            pos,
            var,
            iter,
            body,
        } => Stmt::For {
            pos: *pos,
            var: var.clone(),
            iter: iter.clone(),
            body: rewrite_block(body),
        },
        other => other.clone(),
    }
}

fn force(call: Expr) -> Expr {
    let pos = call.pos;
    let func = Expr::new(pos, ExprKind::Ident(Ident::new(IMPLICIT_DO, pos)));
    Expr::new(
        pos,
        ExprKind::Call {
            func: Box::new(func),
            args: vec![Arg::Positional(call)],
        },
    )
}
