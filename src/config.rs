use std::{env, fs, path::Path, path::PathBuf, sync::Arc, time::Duration};

use process_tree::SourceKind;
use serde::Deserialize;

use crate::prelude::*;
use crate::runner::{EscalationPolicy, Granularity, KillScope, RunOptions};

/// Persistent defaults for `streamexec run`.
///
/// Stored at `~/.config/streamexec/config.yaml` (or `{name}.yaml` with
/// `--config-name`); every key is optional and command-line flags win over
/// the file.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct StreamExecConfig {
    pub granularity: Granularity,
    pub kill_scope: KillScope,
    pub snapshot_source: SourceKind,
    pub escalation: EscalationConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct EscalationConfig {
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        let policy = EscalationPolicy::default();
        Self {
            poll_attempts: policy.poll_attempts,
            poll_interval_ms: policy.poll_interval.as_millis() as u64,
        }
    }
}

impl From<&EscalationConfig> for EscalationPolicy {
    fn from(config: &EscalationConfig) -> Self {
        Self {
            poll_attempts: config.poll_attempts,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Get the path to the configuration file, following the XDG Base Directory Specification.
///
/// `None` when neither `XDG_CONFIG_HOME` nor `HOME` is set.
fn get_configuration_file_path(config_name: Option<&str>) -> Option<PathBuf> {
    let config_dir = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?
        .join("streamexec");

    Some(match config_name {
        Some(name) => config_dir.join(format!("{name}.yaml")),
        None => config_dir.join("config.yaml"),
    })
}

impl StreamExecConfig {
    /// Load the configuration. If it does not exist, return a default configuration.
    pub fn load(config_name: Option<&str>) -> Result<Self> {
        match get_configuration_file_path(config_name) {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No configuration directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        match fs::read(config_path) {
            Ok(config_str) => {
                let config: StreamExecConfig = serde_yaml::from_slice(&config_str)
                    .with_context(|| {
                        format!("Failed to parse config at {}", config_path.display())
                    })?;
                debug!("Config loaded from {}", config_path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Config file not found at {}", config_path.display());
                Ok(Self::default())
            }
            Err(e) => bail!("Failed to load config at {}: {e}", config_path.display()),
        }
    }

    /// Run options seeded from this configuration.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            granularity: self.granularity,
            kill_scope: self.kill_scope,
            snapshot_source: Arc::new(self.snapshot_source),
            escalation: EscalationPolicy::from(&self.escalation),
            ..RunOptions::default()
        }
    }
}
