//! FX-007: Error model: structured, kind-tagged errors.
//!
//! Every failure the engine can report is an `FxError` variant. Callers branch
//! on [`FxError::kind`] or the stable [`FxError::code`], and read the key/value
//! [`FxError::details`] instead of parsing rendered text.

use crate::script::SyntaxError;
use std::fmt;
use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FxError>;

/// Coarse classification of an [`FxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Syntax or identifier-resolution failure.
    Unparsable,
    /// Author misuse of a built-in or of the target conventions.
    ScriptInvalid,
    /// A forced action plan failed while running.
    ActionFailed,
    /// The target graph cannot be scheduled.
    Schedule,
    /// A runtime error raised by script code.
    Eval,
    /// Configuration file could not be loaded.
    Config,
    /// Invariant violations and host failures nothing above anticipates.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Unparsable => "unparsable",
            ErrorKind::ScriptInvalid => "script-invalid",
            ErrorKind::ActionFailed => "action-failed",
            ErrorKind::Schedule => "schedule",
            ErrorKind::Eval => "eval",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum FxError {
    #[error("fxfile unparsable (phase {phase}): {source}")]
    Unparsable {
        phase: &'static str,
        #[source]
        source: SyntaxError,
    },

    #[error("{message}")]
    ScriptInvalid { message: String },

    #[error("target '{target}': depends_on clause may only use lists of string literals, or a single string literal")]
    DependsOnRestriction { target: String },

    #[error("target '{target}' is defined more than once")]
    DuplicateTarget { target: String },

    #[error("cmd {cmd:?} exited with code {exitcode}")]
    CmdExit { cmd: String, exitcode: i32 },

    #[error("cmd {cmd:?} exited due to signal {signal}")]
    CmdSignal { cmd: String, signal: i32 },

    #[error("dependency cycle detected involving: {}", .members.join(", "))]
    Cycle { members: Vec<String> },

    #[error("no such target: '{target}'")]
    UnknownTarget { target: String },

    #[error("target '{target}' depends on unknown target '{dependency}'")]
    UnknownDependency { target: String, dependency: String },

    #[error("evaluation failed (phase {phase}): {source}")]
    Eval {
        phase: &'static str,
        #[source]
        source: Box<FxError>,
    },

    #[error("{filename}:{line}:{col}: {message}")]
    Runtime {
        filename: String,
        line: u32,
        col: u32,
        message: String,
    },

    #[error("config {path}: {message}")]
    Config { path: String, message: String },

    #[error("target '{target}' has no bound function after initialization")]
    Unbound { target: String },

    #[error("failed to launch {cmd:?}: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl FxError {
    /// Shorthand for a [`FxError::ScriptInvalid`] with the given message.
    pub fn script_invalid(message: impl Into<String>) -> Self {
        FxError::ScriptInvalid {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        FxError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FxError::Unparsable { .. } => ErrorKind::Unparsable,
            FxError::ScriptInvalid { .. }
            | FxError::DependsOnRestriction { .. }
            | FxError::DuplicateTarget { .. } => ErrorKind::ScriptInvalid,
            FxError::CmdExit { .. } | FxError::CmdSignal { .. } => ErrorKind::ActionFailed,
            FxError::Cycle { .. }
            | FxError::UnknownTarget { .. }
            | FxError::UnknownDependency { .. } => ErrorKind::Schedule,
            FxError::Eval { .. } | FxError::Runtime { .. } => ErrorKind::Eval,
            FxError::Config { .. } => ErrorKind::Config,
            FxError::Unbound { .. } | FxError::Spawn { .. } | FxError::Io { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable symbolic code, suitable for matching in tests and tooling.
    pub fn code(&self) -> &'static str {
        match self {
            FxError::Unparsable { .. } => "wfx-error-fxfile-unparsable",
            FxError::ScriptInvalid { .. }
            | FxError::DependsOnRestriction { .. }
            | FxError::DuplicateTarget { .. } => "wfx-script-invalid",
            FxError::CmdExit { .. } | FxError::CmdSignal { .. } => "wfx-action-cmd-exit",
            FxError::Cycle { .. } => "wfx-error-dependency-cycle",
            FxError::UnknownTarget { .. } => "wfx-error-unknown-target",
            FxError::UnknownDependency { .. } => "wfx-error-unknown-dependency",
            FxError::Eval { .. } | FxError::Runtime { .. } => "wfx-eval-error",
            FxError::Config { .. } => "wfx-error-config",
            FxError::Unbound { .. } | FxError::Spawn { .. } | FxError::Io { .. } => {
                "wfx-error-internal"
            }
        }
    }

    /// Key/value details carried by this error.
    pub fn details(&self) -> Vec<(&'static str, String)> {
        match self {
            FxError::Unparsable { phase, source } => vec![
                ("phase", phase.to_string()),
                ("line", source.line.to_string()),
                ("col", source.col.to_string()),
            ],
            FxError::ScriptInvalid { .. } => Vec::new(),
            FxError::DependsOnRestriction { target } | FxError::DuplicateTarget { target } => {
                vec![("target", target.clone())]
            }
            FxError::CmdExit { cmd, exitcode } => vec![
                ("cmd", cmd.clone()),
                ("exitcode", exitcode.to_string()),
            ],
            FxError::CmdSignal { cmd, signal } => {
                vec![("cmd", cmd.clone()), ("signal", signal.to_string())]
            }
            FxError::Cycle { members } => vec![("members", members.join(","))],
            FxError::UnknownTarget { target } | FxError::Unbound { target } => {
                vec![("target", target.clone())]
            }
            FxError::UnknownDependency { target, dependency } => vec![
                ("target", target.clone()),
                ("dependency", dependency.clone()),
            ],
            FxError::Eval { phase, .. } => vec![("phase", phase.to_string())],
            FxError::Runtime { line, col, .. } => {
                vec![("line", line.to_string()), ("col", col.to_string())]
            }
            FxError::Config { path, .. } => vec![("path", path.clone())],
            FxError::Spawn { cmd, .. } => vec![("cmd", cmd.clone())],
            FxError::Io { context, .. } => vec![("context", context.clone())],
        }
    }

    /// Look up a single detail value by key.
    pub fn detail(&self, key: &str) -> Option<String> {
        self.details()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// The innermost error, following `Eval` wrappers.
    pub fn root(&self) -> &FxError {
        match self {
            FxError::Eval { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx007_cmd_exit_details() {
        let e = FxError::CmdExit {
            cmd: "exit 7".into(),
            exitcode: 7,
        };
        assert_eq!(e.kind(), ErrorKind::ActionFailed);
        assert_eq!(e.code(), "wfx-action-cmd-exit");
        assert_eq!(e.detail("exitcode").as_deref(), Some("7"));
        assert_eq!(e.detail("cmd").as_deref(), Some("exit 7"));
        assert_eq!(e.to_string(), "cmd \"exit 7\" exited with code 7");
    }

    #[test]
    fn test_fx007_unparsable_carries_phase() {
        let e = FxError::Unparsable {
            phase: "resolve2",
            source: SyntaxError::new("make.fx", 3, 5, "undefined: zork"),
        };
        assert_eq!(e.kind(), ErrorKind::Unparsable);
        assert_eq!(e.detail("phase").as_deref(), Some("resolve2"));
        assert!(e.to_string().contains("undefined: zork"));
    }

    #[test]
    fn test_fx007_root_unwraps_eval() {
        let inner = FxError::CmdSignal {
            cmd: "kill -9 $$".into(),
            signal: 9,
        };
        let e = FxError::Eval {
            phase: "init",
            source: Box::new(inner),
        };
        assert_eq!(e.kind(), ErrorKind::Eval);
        assert_eq!(e.root().kind(), ErrorKind::ActionFailed);
        assert_eq!(e.root().detail("signal").as_deref(), Some("9"));
    }

    #[test]
    fn test_fx007_cycle_message() {
        let e = FxError::Cycle {
            members: vec!["a".into(), "b".into()],
        };
        assert_eq!(e.code(), "wfx-error-dependency-cycle");
        assert!(e.to_string().contains("a, b"));
    }
}
