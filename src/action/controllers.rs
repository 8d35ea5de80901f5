//! FX-006: Controllers: plans that run other plans.
//!
//! `pipe(a, b, ...)` is the shell's `a | b | ...`: each stage's stdout is
//! wired to the next stage's stdin through an OS pipe, and all stages run
//! concurrently. The first error to arrive, by completion order, is the
//! pipeline's result; the rest are logged and dropped.

use super::context::ExecContext;
use super::{ActionPlan, Effect, Streams};
use crate::core::error::{FxError, Result};
use crate::script::{Args, Builtin, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// The `pipe` builtin.
pub struct PipeController;

impl Builtin for PipeController {
    fn name(&self) -> &str {
        "pipe"
    }

    fn call(&self, _ctx: &ExecContext, args: Args) -> Result<Value> {
        args.no_named("pipe")?;
        let stages = args
            .positional
            .iter()
            .map(|v| {
                v.as_action().cloned().ok_or_else(|| {
                    FxError::script_invalid(format!(
                        "`pipe` expects only action plans as arguments, got {}",
                        v.type_name()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if stages.is_empty() {
            return Err(FxError::script_invalid(
                "`pipe` expects at least one action plan",
            ));
        }
        Ok(Value::Action(Arc::new(pipe_plan(stages))))
    }
}

/// Compose `stages` into one plan.
pub fn pipe_plan(stages: Vec<Arc<ActionPlan>>) -> ActionPlan {
    let details = stages
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" | ");
    ActionPlan::new("Pipe", false, PipeEffect { stages }).with_details(details)
}

struct PipeEffect {
    stages: Vec<Arc<ActionPlan>>,
}

impl Effect for PipeEffect {
    fn run(&self, _plan: &ActionPlan, streams: Streams, ctx: &ExecContext) -> Result<()> {
        let mut wiring: Vec<Streams> = self.stages.iter().map(|_| Streams::default()).collect();
        for i in 1..wiring.len() {
            let (reader, writer) = std::io::pipe().map_err(|e| FxError::io("creating pipe", e))?;
            wiring[i - 1].stdout = Some(writer.into());
            wiring[i].stdin = Some(reader.into());
        }
        let Some(last) = wiring.len().checked_sub(1) else {
            return Ok(());
        };
        wiring[0].stdin = streams.stdin;
        // A composite's stdout and stderr overrides go to the final stage.
        wiring[last].stdout = streams.stdout;
        wiring[last].stderr = streams.stderr;

        tracing::debug!(stages = self.stages.len(), "pipeline fan-out");
        let first_error: Mutex<Option<FxError>> = Mutex::new(None);
        thread::scope(|s| {
            for (index, (stage, streams)) in self.stages.iter().zip(wiring).enumerate() {
                let first_error = &first_error;
                s.spawn(move || {
                    if let Err(e) = stage.run_with(ctx, streams) {
                        let mut slot = first_error.lock();
                        if slot.is_none() {
                            tracing::debug!(stage = index, error = %e, "pipeline first error");
                            *slot = Some(e);
                        } else {
                            tracing::warn!(stage = index, error = %e, "pipeline error discarded");
                        }
                    }
                });
            }
        });
        match first_error.into_inner() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
