//! FX-012: Evaluation engine: the two passes over a module.
//!
//! Pass 1: resolve → rewrite bare calls → resolve again and compile → run
//! module-level code → freeze globals. No target body runs here.
//! Pass 2: for each scheduled target, in dependency order, call its function
//! with a single `None` argument. The first error stops the walk.

use super::error::{FxError, Result};
use super::parser::Module;
use super::rewrite::rewrite;
use super::types::Target;
use crate::action::context::write_line;
use crate::action::{predeclared, ExecContext, Sink};
use crate::core::config::FxConfig;
use crate::script::{is_universal, resolve, Globals, Program, Value};
use std::time::{Duration, Instant};

/// Engine-side settings: interpreter and ambient output.
#[derive(Clone)]
pub struct EngineConfig {
    pub shell: String,
    /// Ambient stdout of action plans.
    pub stdout: Sink,
    pub stderr: Sink,
    /// Destination of script `print()` lines. `quiet` leaves it alone.
    pub diagnostics: Sink,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config(&FxConfig::default())
    }
}

impl EngineConfig {
    pub fn from_config(config: &FxConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            stdout: if config.quiet { Sink::Null } else { Sink::Inherit },
            stderr: Sink::Inherit,
            diagnostics: Sink::Inherit,
        }
    }
}

/// Outcome of one target invocation.
#[derive(Debug, Clone)]
pub struct TargetRun {
    pub name: String,
    pub duration: Duration,
}

/// A module that has completed pass 1.
pub struct Engine {
    module: Module,
    config: EngineConfig,
    globals: Globals,
}

impl Engine {
    /// Run pass 1. Consumes the module, so it can never be evaluated twice.
    pub fn first_pass(module: Module, config: EngineConfig) -> Result<Engine> {
        let builtins = predeclared(&config.shell);
        let is_predeclared = |name: &str| builtins.contains_key(name);

        let resolved = resolve(module.ast().clone(), &is_predeclared, &is_universal).map_err(
            |source| FxError::Unparsable {
                phase: "resolve",
                source,
            },
        )?;
        tracing::debug!(module = module.name(), "resolve complete");

        let rewritten = rewrite(resolved);
        let program = Program::compile(rewritten, &is_predeclared).map_err(|source| {
            FxError::Unparsable {
                phase: "resolve2",
                source,
            }
        })?;
        tracing::debug!(module = module.name(), "rewrite and compile complete");

        let out = config.diagnostics.clone();
        let ctx = ExecContext::new("exploration", config.stdout.clone(), config.stderr.clone())
            .with_printer(move |msg| write_line(&out, &format!("during exploratory eval: {}", msg)));
        let globals = program.init(&ctx, builtins).map_err(|e| FxError::Eval {
            phase: "init",
            source: Box::new(e),
        })?;
        tracing::debug!(module = module.name(), globals = globals.names().count(), "module initialized");

        Ok(Engine {
            module,
            config,
            globals,
        })
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn list_targets(&self) -> Vec<&Target> {
        self.module.list_targets()
    }

    /// The targets `names` would invoke, in order, without invoking them.
    pub fn plan(&self, names: &[String]) -> Result<Vec<String>> {
        self.module.plan(names)
    }

    /// Run pass 2 for `names` and their dependency closure.
    pub fn invoke_targets(&self, names: &[String]) -> Result<Vec<TargetRun>> {
        let order = self.plan(names)?;
        let mut runs = Vec::with_capacity(order.len());
        for name in &order {
            let start = Instant::now();
            tracing::info!(target_name = %name, "invoking target");
            if let Err(e) = self.invoke_one(name) {
                tracing::warn!(target_name = %name, error = %e, "target failed");
                return Err(e);
            }
            let duration = start.elapsed();
            tracing::info!(target_name = %name, ?duration, "target finished");
            runs.push(TargetRun {
                name: name.clone(),
                duration,
            });
        }
        Ok(runs)
    }

    /// Call exactly one target; dependencies are not considered.
    fn invoke_one(&self, name: &str) -> Result<Value> {
        if self.globals.get(name).is_none() {
            return Err(FxError::Unbound {
                target: name.to_string(),
            });
        }
        let out = self.config.diagnostics.clone();
        let prefix = format!("during target invocation (target={}): ", name);
        let ctx = ExecContext::new(name, self.config.stdout.clone(), self.config.stderr.clone())
            .with_printer(move |msg| write_line(&out, &format!("{}{}", prefix, msg)));
        self.globals.call(name, &ctx, vec![Value::None])
    }
}
