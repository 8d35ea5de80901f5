//! End-to-end: parse an fx file, run pass 1, invoke targets.

use std::path::Path;
use wfx::action::{Capture, Sink};
use wfx::{parse_module, Engine, EngineConfig, ErrorKind, FxError};

fn engine(src: &str) -> Result<(Engine, Capture), FxError> {
    let (stdout, cap) = Sink::capture();
    let config = EngineConfig {
        shell: "/bin/bash".into(),
        diagnostics: stdout.clone(),
        stdout,
        stderr: Sink::Null,
    };
    let module = parse_module("make.fx", src)?;
    Ok((Engine::first_pass(module, config)?, cap))
}

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn read_log(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_e2e_build_runs_after_prep_once() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("log");
    let src = format!(
        r#"
LOG = "{log}"

def build(fx, depends_on=["prep"]):
    cmd("echo build >> " + LOG)

def prep(fx):
    cmd("echo prep >> " + LOG)
"#,
        log = log.display()
    );
    let (e, _) = engine(&src).unwrap();
    let runs = e.invoke_targets(&names(&["build", "build"])).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(read_log(dir.path()), ["prep", "build"]);
}

#[test]
fn test_e2e_bare_cmd_true_succeeds() {
    let (e, _) = engine("def ok(fx):\n    cmd(\"true\")\n").unwrap();
    e.invoke_targets(&names(&["ok"])).unwrap();
}

#[test]
fn test_e2e_bare_cmd_exit_seven_fails() {
    let (e, _) = engine("def bad(fx):\n    cmd(\"exit 7\")\n").unwrap();
    let err = e.invoke_targets(&names(&["bad"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ActionFailed);
    assert_eq!(err.code(), "wfx-action-cmd-exit");
    assert_eq!(err.detail("exitcode").as_deref(), Some("7"));
}

#[test]
fn test_e2e_do_non_plan_is_noop() {
    let (e, out) = engine("def t(fx):\n    do(42)\n    do(None)\n").unwrap();
    e.invoke_targets(&names(&["t"])).unwrap();
    assert!(out.contents().is_empty());
}

#[test]
fn test_e2e_explicit_do_of_captured_plan() {
    let src = "def t(fx):\n    p = cmd(\"echo later\")\n    print(\"before\")\n    do(p)\n";
    let (e, out) = engine(src).unwrap();
    e.invoke_targets(&names(&["t"])).unwrap();
    assert_eq!(
        out.contents(),
        "during target invocation (target=t): before\nlater\n"
    );
}

#[test]
fn test_e2e_pipe_echo_cat() {
    let (e, out) = engine("def t(fx):\n    pipe(cmd(\"echo hi\"), cmd(\"cat\"))\n").unwrap();
    e.invoke_targets(&names(&["t"])).unwrap();
    assert_eq!(out.contents(), "hi\n");
}

#[test]
fn test_e2e_pipe_failure_surfaces() {
    let src = "def t(fx):\n    pipe(cmd(\"echo hi\"), cmd(\"cat > /dev/null; exit 9\"))\n";
    let (e, _) = engine(src).unwrap();
    let err = e.invoke_targets(&names(&["t"])).unwrap_err();
    assert_eq!(err.detail("exitcode").as_deref(), Some("9"));
}

#[test]
fn test_e2e_pipe_reuses_one_plan() {
    let src = "def t(fx):\n    p = cmd(\"cat\")\n    pipe(cmd(\"echo hi\"), p, p)\n";
    let (e, out) = engine(src).unwrap();
    e.invoke_targets(&names(&["t"])).unwrap();
    assert_eq!(out.contents(), "hi\n");
}

#[test]
fn test_e2e_pipe_stages_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let src = format!(
        "D = \"{}\"\n\ndef t(fx):\n    pipe(cmd(\"until [ -f \" + D + \"/go ]; do sleep 0.05; done\"), cmd(\"touch \" + D + \"/go\"))\n",
        dir.path().display()
    );
    let (e, _) = engine(&src).unwrap();
    e.invoke_targets(&names(&["t"])).unwrap();
}

#[test]
fn test_e2e_cmd_does_not_read_host_stdin() {
    let (e, out) = engine("def t(fx):\n    cmd(\"cat\")\n").unwrap();
    e.invoke_targets(&names(&["t"])).unwrap();
    assert_eq!(out.contents(), "");
}

#[test]
fn test_e2e_pipe_rejects_non_plan() {
    let (e, _) = engine("def t(fx):\n    pipe(cmd(\"echo hi\"), \"cat\")\n").unwrap();
    let err = e.invoke_targets(&names(&["t"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ScriptInvalid);
}

#[test]
fn test_e2e_cycle_fails_before_any_target() {
    let dir = tempfile::tempdir().unwrap();
    let src = format!(
        r#"
def a(fx, depends_on="b"):
    cmd("touch {dir}/log")

def b(fx, depends_on="a"):
    cmd("touch {dir}/log")

def c(fx):
    cmd("touch {dir}/log")
"#,
        dir = dir.path().display()
    );
    let (e, _) = engine(&src).unwrap();
    let err = e.invoke_targets(&names(&["c"])).unwrap_err();
    assert_eq!(err.code(), "wfx-error-dependency-cycle");
    assert!(!dir.path().join("log").exists());
}

#[test]
fn test_e2e_unknown_target_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let src = format!("def a(fx):\n    cmd(\"touch {}/log\")\n", dir.path().display());
    let (e, _) = engine(&src).unwrap();
    let err = e.invoke_targets(&names(&["a", "nope"])).unwrap_err();
    assert_eq!(err.code(), "wfx-error-unknown-target");
    assert!(!dir.path().join("log").exists());
}

#[test]
fn test_e2e_non_fx_defs_not_listed() {
    let src = "def helper(x):\n    return x\ndef t(fx):\n    pass\ndef u(ctx):\n    pass\n";
    let module = parse_module("make.fx", src).unwrap();
    let listed: Vec<&str> = module.list_targets().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(listed, ["t"]);
}

#[test]
fn test_e2e_bad_depends_on_rejected() {
    let err = parse_module("make.fx", "X = [\"a\"]\ndef t(fx, depends_on=X):\n    pass\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ScriptInvalid);
    assert_eq!(err.code(), "wfx-script-invalid");
}

#[test]
fn test_e2e_failure_keeps_earlier_effects() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("log");
    let src = format!(
        r#"
def one(fx):
    cmd("echo one >> {log}")

def two(fx, depends_on="one"):
    cmd("exit 3")

def three(fx, depends_on="two"):
    cmd("echo three >> {log}")
"#,
        log = log.display()
    );
    let (e, _) = engine(&src).unwrap();
    assert!(e.invoke_targets(&names(&["three"])).is_err());
    assert_eq!(read_log(dir.path()), ["one"]);
}

#[test]
fn test_e2e_script_loops_build_commands() {
    let src = r#"
PARTS = ["a", "b", "c"]

def t(fx):
    for p in PARTS:
        if p == "b":
            continue
        cmd("echo part-%s" % p)
"#;
    let (e, out) = engine(src).unwrap();
    e.invoke_targets(&names(&["t"])).unwrap();
    assert_eq!(out.contents(), "part-a\npart-c\n");
}

#[test]
fn test_e2e_runtime_error_in_target() {
    let (e, _) = engine("def t(fx):\n    fail(\"broken\")\n").unwrap();
    let err = e.invoke_targets(&names(&["t"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Eval);
    assert!(err.to_string().contains("fail: broken"));
}
