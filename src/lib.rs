//! wfx: a Make-like effect orchestrator.
//!
//! Targets are Starlark-dialect functions whose first parameter is `fx`.
//! Requested targets run after their dependencies, each exactly once, and
//! their bodies force shell actions and pipelines.

pub mod action;
pub mod cli;
pub mod core;
pub mod script;

pub use crate::core::error::{ErrorKind, FxError, Result};
pub use crate::core::executor::{Engine, EngineConfig};
pub use crate::core::parser::{parse_module, Module};
pub use crate::core::types::Target;
