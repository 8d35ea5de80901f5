//! FX-011: Project configuration: optional `wfx.toml`.
//!
//! Every key is optional; CLI flags override what the file sets.

use super::error::{FxError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "wfx.toml";

/// Settings read from `wfx.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FxConfig {
    /// The fx file to load
    #[serde(default = "default_file")]
    pub file: PathBuf,

    /// Interpreter for `cmd` plans, invoked as `<shell> -c <command>`
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Discard command stdout
    #[serde(default)]
    pub quiet: bool,
}

fn default_file() -> PathBuf {
    PathBuf::from("make.fx")
}

fn default_shell() -> String {
    "/bin/bash".to_string()
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            file: default_file(),
            shell: default_shell(),
            quiet: false,
        }
    }
}

/// Parse configuration text.
pub fn parse_config(path: &Path, text: &str) -> Result<FxConfig> {
    let config: FxConfig = toml::from_str(text).map_err(|e| FxError::Config {
        path: path.display().to_string(),
        message: e.message().to_string(),
    })?;
    validate_config(path, &config)?;
    Ok(config)
}

/// Load `wfx.toml` from `dir`, or defaults if there is none.
pub fn load_config(dir: &Path) -> Result<FxConfig> {
    let path = dir.join(CONFIG_FILE);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(FxConfig::default());
        }
        Err(e) => return Err(FxError::io(format!("failed to read {}", path.display()), e)),
    };
    let config = parse_config(&path, &text)?;
    tracing::debug!(path = %path.display(), ?config, "config loaded");
    Ok(config)
}

fn validate_config(path: &Path, config: &FxConfig) -> Result<()> {
    let invalid = |message: &str| FxError::Config {
        path: path.display().to_string(),
        message: message.to_string(),
    };
    if config.shell.trim().is_empty() {
        return Err(invalid("shell must not be empty"));
    }
    if config.file.as_os_str().is_empty() {
        return Err(invalid("file must not be empty"));
    }
    Ok(())
}
