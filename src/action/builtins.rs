//! Forcing primitives and the predeclared name table.

use super::cmd::CmdConstructor;
use super::context::ExecContext;
use super::controllers::PipeController;
use crate::core::error::{FxError, Result};
use crate::script::{Args, Builtin, Predeclared, Value};
use std::sync::Arc;

/// Name of the forcing primitive the bare-call rewrite injects.
pub const IMPLICIT_DO: &str = "_do";

/// `do(value)` / `_do(value)`: run the value if it is a plan, else nothing.
pub struct Do {
    name: &'static str,
}

impl Do {
    pub fn explicit() -> Self {
        Self { name: "do" }
    }

    pub fn implicit() -> Self {
        Self { name: IMPLICIT_DO }
    }
}

impl Builtin for Do {
    fn name(&self) -> &str {
        self.name
    }

    fn call(&self, ctx: &ExecContext, args: Args) -> Result<Value> {
        if !args.named.is_empty() || args.positional.len() != 1 {
            return Err(FxError::script_invalid(format!(
                "`{}` expects exactly one positional arg",
                self.name
            )));
        }
        // Anything that is not a plan is tolerated; the rewrite wraps every bare call.
        if let Some(plan) = args.positional[0].as_action() {
            plan.run(ctx)?;
        }
        Ok(Value::None)
    }
}

/// `panic()`: abort the whole evaluation.
pub struct Panic;

impl Builtin for Panic {
    fn name(&self) -> &str {
        "panic"
    }

    fn call(&self, ctx: &ExecContext, _args: Args) -> Result<Value> {
        tracing::error!(target_name = ctx.name(), "panic() called from script");
        panic!("panic! (called from script during {})", ctx.name());
    }
}

/// Host names visible to every script: the action constructors and forcing primitives.
pub fn predeclared(shell: &str) -> Predeclared {
    let entries: [Arc<dyn Builtin>; 5] = [
        Arc::new(Do::explicit()),
        Arc::new(Do::implicit()),
        Arc::new(CmdConstructor::new(shell)),
        Arc::new(PipeController),
        Arc::new(Panic),
    ];
    entries
        .into_iter()
        .map(|b| (b.name().to_string(), Value::Builtin(b)))
        .collect()
}
