//! FX-017: CLI subcommands: run, list, check.

use crate::core::config::{load_config, FxConfig};
use crate::core::error::{ErrorKind, FxError, Result};
use crate::core::executor::{Engine, EngineConfig};
use crate::core::parser::{self, Module};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

/// Flags shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to the fx file (default: from wfx.toml, else make.fx)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Interpreter for cmd actions (default: /bin/bash)
    #[arg(long, global = true)]
    pub shell: Option<String>,

    /// Discard command stdout
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run targets and their dependencies
    Run {
        /// Targets to run
        #[arg(required = true)]
        targets: Vec<String>,

        /// Print the targets that would run, in order, without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// List the targets defined in the fx file
    List {
        /// Emit JSON instead of one target per line
        #[arg(long)]
        json: bool,
    },

    /// Parse and initialize the fx file without running any target
    Check,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands, global: &GlobalArgs) -> Result<()> {
    let config = effective_config(Path::new("."), global)?;
    match cmd {
        Commands::Run { targets, dry_run } => cmd_run(&config, &targets, dry_run),
        Commands::List { json } => cmd_list(&config, json),
        Commands::Check => cmd_check(&config),
    }
}

/// `wfx.toml` in `dir`, overridden by command-line flags.
pub fn effective_config(dir: &Path, global: &GlobalArgs) -> Result<FxConfig> {
    let mut config = load_config(dir)?;
    if let Some(file) = &global.file {
        config.file.clone_from(file);
    }
    if let Some(shell) = &global.shell {
        config.shell.clone_from(shell);
    }
    config.quiet |= global.quiet;
    Ok(config)
}

/// Process exit code for an error, by kind.
pub fn exit_code(err: &FxError) -> i32 {
    match err.root() {
        FxError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => 19,
        FxError::Io { .. } => 18,
        root => match root.kind() {
            ErrorKind::Unparsable => 17,
            ErrorKind::ScriptInvalid => 16,
            ErrorKind::Schedule => 15,
            ErrorKind::ActionFailed => 1,
            ErrorKind::Eval | ErrorKind::Config | ErrorKind::Internal => 2,
        },
    }
}

fn load_module(config: &FxConfig) -> Result<Module> {
    parser::parse_module_file(&config.file)
}

fn load_engine(config: &FxConfig) -> Result<Engine> {
    let module = load_module(config)?;
    Engine::first_pass(module, EngineConfig::from_config(config))
}

fn cmd_run(config: &FxConfig, targets: &[String], dry_run: bool) -> Result<()> {
    if dry_run {
        let module = load_module(config)?;
        for name in module.plan(targets)? {
            println!("{}", name);
        }
        return Ok(());
    }

    let engine = load_engine(config)?;
    let runs = engine.invoke_targets(targets)?;
    let total: f64 = runs.iter().map(|r| r.duration.as_secs_f64()).sum();
    tracing::info!(targets = runs.len(), seconds = total, "run complete");
    Ok(())
}

fn cmd_list(config: &FxConfig, json: bool) -> Result<()> {
    let module = load_module(config)?;
    let targets = module.list_targets();
    if json {
        let text = serde_json::to_string_pretty(&targets)
            .map_err(|e| FxError::io("encoding target list", e.into()))?;
        println!("{}", text);
    } else {
        for target in targets {
            println!("{}", target);
        }
    }
    Ok(())
}

fn cmd_check(config: &FxConfig) -> Result<()> {
    let engine = load_engine(config)?;
    println!(
        "OK: {} ({} targets)",
        engine.module().name(),
        engine.list_targets().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_module;

    #[test]
    fn test_fx017_exit_codes() {
        let unparsable = parse_module("make.fx", "def (").unwrap_err();
        assert_eq!(exit_code(&unparsable), 17);
        let invalid = parse_module("make.fx", "def a(fx, depends_on=1):\n    pass\n").unwrap_err();
        assert_eq!(exit_code(&invalid), 16);
        let cycle = FxError::Cycle { members: vec![] };
        assert_eq!(exit_code(&cycle), 15);
        let action = FxError::CmdExit {
            cmd: "false".into(),
            exitcode: 1,
        };
        assert_eq!(exit_code(&action), 1);
        let missing = parser::parse_module_file(Path::new("/nonexistent/make.fx")).unwrap_err();
        assert_eq!(exit_code(&missing), 19);
    }

    #[test]
    fn test_fx017_wrapped_errors_use_root_kind() {
        let e = FxError::Eval {
            phase: "init",
            source: Box::new(FxError::script_invalid("bad")),
        };
        assert_eq!(exit_code(&e), 16);
    }

    #[test]
    fn test_fx017_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wfx.toml"), "file = \"a.fx\"\nshell = \"/bin/sh\"\n").unwrap();

        let from_file = effective_config(dir.path(), &GlobalArgs::default()).unwrap();
        assert_eq!(from_file.file, PathBuf::from("a.fx"));
        assert_eq!(from_file.shell, "/bin/sh");

        let flags = GlobalArgs {
            file: Some(PathBuf::from("b.fx")),
            quiet: true,
            ..GlobalArgs::default()
        };
        let merged = effective_config(dir.path(), &flags).unwrap();
        assert_eq!(merged.file, PathBuf::from("b.fx"));
        assert_eq!(merged.shell, "/bin/sh");
        assert!(merged.quiet);
    }
}
