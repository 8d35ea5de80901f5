//! FX-003: Action plans: deferred, forceable units of work.
//!
//! Constructing a plan has no effect. [`ActionPlan::run`] performs the effect
//! against the ambient [`ExecContext`] sinks; [`ActionPlan::run_with`] takes
//! explicit stream overrides for one run. A plan holds no stream state, so one
//! plan value can appear in several places at once.

pub mod builtins;
pub mod cmd;
pub mod context;
pub mod controllers;

pub use builtins::predeclared;
pub use context::{Capture, ExecContext, Sink};

use crate::core::error::Result;
use parking_lot::Mutex;
use std::fmt;
use std::process::Stdio;

/// Stream overrides for one run. `None` means "use the ambient context"
/// (for stdin, the null device).
#[derive(Default)]
pub struct Streams {
    pub stdin: Option<Stdio>,
    pub stdout: Option<Stdio>,
    pub stderr: Option<Stdio>,
}

/// The effect behind a plan.
pub trait Effect: Send + Sync {
    fn run(&self, plan: &ActionPlan, streams: Streams, ctx: &ExecContext) -> Result<()>;
}

/// Lifecycle of a plan; a plan may be forced more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Constructed,
    Running,
    Succeeded,
    Failed,
}

pub struct ActionPlan {
    name: &'static str,
    label: Option<String>,
    details: Option<String>,
    is_exec: bool,
    state: Mutex<PlanState>,
    effect: Box<dyn Effect>,
}

impl ActionPlan {
    pub fn new(name: &'static str, is_exec: bool, effect: impl Effect + 'static) -> Self {
        Self {
            name,
            label: None,
            details: None,
            is_exec,
            state: Mutex::new(PlanState::Constructed),
            effect: Box::new(effect),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// `ActionPlan` followed by the constructor's name, e.g. `ActionPlanCmd`.
    pub fn name(&self) -> String {
        format!("ActionPlan{}", self.name)
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Backed by an OS process, so a pipe can hand it a raw descriptor.
    pub fn is_exec(&self) -> bool {
        self.is_exec
    }

    pub fn state(&self) -> PlanState {
        *self.state.lock()
    }

    /// Perform the effect with no overrides.
    pub fn run(&self, ctx: &ExecContext) -> Result<()> {
        self.run_with(ctx, Streams::default())
    }

    /// Perform the effect with `streams` wired in. The overrides are dropped
    /// when the run finishes, which closes any pipe ends they held.
    pub fn run_with(&self, ctx: &ExecContext, streams: Streams) -> Result<()> {
        *self.state.lock() = PlanState::Running;
        tracing::debug!(plan = %self, label = ?self.label, target_name = ctx.name(), "running action plan");
        let result = self.effect.run(self, streams, ctx);
        *self.state.lock() = if result.is_ok() {
            PlanState::Succeeded
        } else {
            PlanState::Failed
        };
        result
    }
}

impl fmt::Display for ActionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}{{{}}}", self.name(), details),
            None => write!(f, "{}{{...}}", self.name()),
        }
    }
}

impl fmt::Debug for ActionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionPlan")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("details", &self.details)
            .field("is_exec", &self.is_exec)
            .field("state", &self.state())
            .finish()
    }
}
