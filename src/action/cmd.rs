//! FX-005: `cmd(str)`: shell command plans.
//!
//! Each plan runs `<shell> -c <command>`. Unset output streams fall back to the
//! ambient context; an unset stdin is the null device, never the host's own.
//! Capture sinks are drained by a copier thread per stream.

use super::context::{Capture, ExecContext};
use super::{ActionPlan, Effect, Streams};
use crate::core::error::{FxError, Result};
use crate::script::{Args, Builtin, Value};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;

/// The `cmd` builtin.
pub struct CmdConstructor {
    shell: String,
}

impl CmdConstructor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Build a plan for `command` without going through script values.
    pub fn plan(&self, command: &str, label: Option<String>) -> ActionPlan {
        ActionPlan::new(
            "Cmd",
            true,
            CmdEffect {
                shell: self.shell.clone(),
                command: command.to_string(),
            },
        )
        .with_details(command)
        .with_label(label)
    }
}

impl Builtin for CmdConstructor {
    fn name(&self) -> &str {
        "cmd"
    }

    fn call(&self, _ctx: &ExecContext, args: Args) -> Result<Value> {
        let usage = || {
            FxError::script_invalid(
                "`cmd` actions expect exactly one positional arg, which should be a string",
            )
        };
        let mut label = None;
        for (name, value) in args.named {
            match (name.as_str(), value.as_str()) {
                ("label", Some(text)) => label = Some(text.to_string()),
                _ => return Err(usage()),
            }
        }
        match args.positional.as_slice() {
            [Value::Str(command)] => Ok(Value::Action(Arc::new(self.plan(command, label)))),
            _ => Err(usage()),
        }
    }
}

struct CmdEffect {
    shell: String,
    command: String,
}

impl Effect for CmdEffect {
    fn run(&self, _plan: &ActionPlan, streams: Streams, ctx: &ExecContext) -> Result<()> {
        let mut command = Command::new(&self.shell);
        command.arg("-c").arg(&self.command);

        command.stdin(streams.stdin.unwrap_or_else(Stdio::null));
        let out_capture = wire(&mut command, streams.stdout, ctx.stdout().stdio(), ctx.stdout().captured(), Which::Out);
        let err_capture = wire(&mut command, streams.stderr, ctx.stderr().stdio(), ctx.stderr().captured(), Which::Err);

        tracing::debug!(shell = %self.shell, cmd = %self.command, "launching command");
        let mut child = command.spawn().map_err(|source| FxError::Spawn {
            cmd: self.command.clone(),
            source,
        })?;
        // The parent's copies of pipe ends live in `command`; close them now.
        drop(command);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let status = thread::scope(|s| {
            if let (Some(cap), Some(pipe)) = (out_capture, stdout) {
                s.spawn(move || drain(cap, pipe));
            }
            if let (Some(cap), Some(pipe)) = (err_capture, stderr) {
                s.spawn(move || drain(cap, pipe));
            }
            child.wait()
        })
        .map_err(|e| FxError::io(format!("waiting for {:?}", self.command), e))?;

        tracing::debug!(cmd = %self.command, status = %status, "command finished");
        exit_result(&self.command, status)
    }
}

#[derive(Clone, Copy)]
enum Which {
    Out,
    Err,
}

/// Attach an override or the ambient sink; returns the capture to drain, if any.
fn wire(
    command: &mut Command,
    override_: Option<Stdio>,
    ambient: Stdio,
    captured: Option<&Capture>,
    which: Which,
) -> Option<Capture> {
    let (stdio, capture) = match override_ {
        Some(stdio) => (stdio, None),
        None => (ambient, captured.cloned()),
    };
    match which {
        Which::Out => command.stdout(stdio),
        Which::Err => command.stderr(stdio),
    };
    capture
}

fn drain(cap: Capture, mut pipe: impl Read) {
    if let Err(e) = cap.copy_from(&mut pipe) {
        tracing::warn!(error = %e, "failed to collect command output");
    }
}

/// Map a finished child's status onto success or a structured failure.
pub fn exit_result(cmd: &str, status: ExitStatus) -> Result<()> {
    if let Some(code) = status.code() {
        if code == 0 {
            return Ok(());
        }
        return Err(FxError::CmdExit {
            cmd: cmd.to_string(),
            exitcode: code,
        });
    }
    Err(signal_error(cmd, status))
}

#[cfg(unix)]
fn signal_error(cmd: &str, status: ExitStatus) -> FxError {
    use std::os::unix::process::ExitStatusExt;
    FxError::CmdSignal {
        cmd: cmd.to_string(),
        signal: status.signal().unwrap_or(0),
    }
}

#[cfg(not(unix))]
fn signal_error(cmd: &str, _status: ExitStatus) -> FxError {
    FxError::CmdExit {
        cmd: cmd.to_string(),
        exitcode: -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Sink;
    use crate::core::error::ErrorKind;

    fn capture_ctx() -> (ExecContext, Capture, Capture) {
        let (out, out_cap) = Sink::capture();
        let (err, err_cap) = Sink::capture();
        (ExecContext::new("t", out, err), out_cap, err_cap)
    }

    fn plan(cmd: &str) -> ActionPlan {
        CmdConstructor::new("/bin/bash").plan(cmd, None)
    }

    #[test]
    fn test_fx005_cmd_true_succeeds() {
        let (ctx, _, _) = capture_ctx();
        plan("true").run(&ctx).unwrap();
    }

    #[test]
    fn test_fx005_cmd_exit_code() {
        let (ctx, _, _) = capture_ctx();
        let err = plan("exit 7").run(&ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ActionFailed);
        assert_eq!(err.detail("exitcode").as_deref(), Some("7"));
        assert_eq!(err.detail("cmd").as_deref(), Some("exit 7"));
    }

    #[cfg(unix)]
    #[test]
    fn test_fx005_cmd_signal() {
        let (ctx, _, _) = capture_ctx();
        let err = plan("kill -9 $$").run(&ctx).unwrap_err();
        assert!(matches!(err, FxError::CmdSignal { signal: 9, .. }));
    }

    #[test]
    fn test_fx005_cmd_captures_streams() {
        let (ctx, out, err) = capture_ctx();
        plan("echo hello; echo oops >&2").run(&ctx).unwrap();
        assert_eq!(out.contents(), "hello\n");
        assert_eq!(err.contents(), "oops\n");
    }

    #[test]
    fn test_fx005_cmd_stdin_defaults_to_null() {
        let (ctx, out, _) = capture_ctx();
        plan("cat; wc -c < /dev/stdin | tr -d ' '").run(&ctx).unwrap();
        assert_eq!(out.contents(), "0\n");
    }

    #[test]
    fn test_fx005_cmd_stdin_override() {
        let (ctx, out, _) = capture_ctx();
        let (reader, mut writer) = std::io::pipe().unwrap();
        std::io::Write::write_all(&mut writer, b"fed\n").unwrap();
        drop(writer);
        let streams = Streams {
            stdin: Some(reader.into()),
            ..Streams::default()
        };
        plan("cat").run_with(&ctx, streams).unwrap();
        assert_eq!(out.contents(), "fed\n");
    }

    #[test]
    fn test_fx005_cmd_missing_shell_is_internal() {
        let (ctx, _, _) = capture_ctx();
        let p = CmdConstructor::new("/nonexistent/shell-xyz").plan("true", None);
        let err = p.run(&ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_fx005_constructor_arity() {
        let ctor = CmdConstructor::new("/bin/bash");
        let ctx = ExecContext::new("t", Sink::Null, Sink::Null);
        for bad in [
            Args::positional(vec![]),
            Args::positional(vec![Value::Int(1)]),
            Args::positional(vec![Value::str("a"), Value::str("b")]),
        ] {
            let err = ctor.call(&ctx, bad).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::ScriptInvalid);
        }
        let ok = ctor
            .call(&ctx, Args::positional(vec![Value::str("echo hi")]))
            .unwrap();
        assert_eq!(ok.to_string(), "ActionPlanCmd{echo hi}");
    }

    #[test]
    fn test_fx005_constructor_label() {
        let ctor = CmdConstructor::new("/bin/bash");
        let ctx = ExecContext::new("t", Sink::Null, Sink::Null);
        let mut args = Args::positional(vec![Value::str("true")]);
        args.named.push(("label".into(), Value::str("noop")));
        let v = ctor.call(&ctx, args).unwrap();
        assert_eq!(v.as_action().unwrap().label(), Some("noop"));
    }
}
