//! The charm's own settings: paths, service names and ownership.
//!
//! Resolution order, lowest to highest priority:
//!
//! 1. compiled defaults (the `#[config(default = ...)]` attributes below)
//! 2. the settings file, if it exists, checked for unknown keys
//! 3. `GITEA_CHARM__*` environment variables
//!
//! The merged table is deserialized into the confique layer and confique
//! fills in the defaults.

mod env;
mod strict;

use std::fmt;
use std::path::{Path, PathBuf};

use confique::Config;
use serde::{Deserialize, Deserializer, Serialize};
use toml::{Table, Value};

use crate::error::SettingsError;
use crate::provision::DirectoryOwnership;

pub use env::{deep_merge, env_to_table};
pub use strict::validate_unknown_keys;

/// Prefix for settings overrides in the environment.
pub const ENV_PREFIX: &str = "GITEA_CHARM";
/// Where the dispatch binary looks for its settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/gitea-charm/settings.toml";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CharmSettings {
    /// Gitea server.
    #[config(nested)]
    pub gitea: GiteaSettings,

    /// Gitea Actions runner.
    #[config(nested)]
    pub runner: RunnerSettings,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GiteaSettings {
    /// The managed Gitea configuration file.
    #[config(default = "/etc/gitea/app.ini")]
    pub app_ini: PathBuf,

    /// Directory holding app.ini, owned root:<user> with mode 0770.
    #[config(default = "/etc/gitea")]
    pub config_dir: PathBuf,

    /// Gitea's working directory.
    #[config(default = "/var/lib/gitea")]
    pub work_dir: PathBuf,

    /// systemd unit name.
    #[config(default = "kteam-gitea")]
    pub service: String,

    /// Name of the charm resource carrying the Gitea binary.
    #[config(default = "gitea")]
    pub resource: String,

    /// Where the Gitea binary is installed.
    #[config(default = "/usr/local/bin/gitea")]
    pub binary: PathBuf,

    /// System account Gitea runs as.
    #[config(default = "git")]
    pub user: String,

    /// Home directory of the system account.
    #[config(default = "/home/git")]
    pub home: PathBuf,

    /// HTTP port opened when the charm config does not set one.
    #[config(default = 3000)]
    pub http_port: u16,

    /// Ownership of directories named by path options.
    #[config(nested)]
    pub data: OwnershipSettings,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OwnershipSettings {
    /// Owner as `user:group`, or a bare user for a same-named group.
    #[config(default = "git:git")]
    pub owner: String,

    /// Octal permission bits.
    #[config(default = "0750", deserialize_with = mode_text)]
    pub mode: String,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    /// systemd unit name.
    #[config(default = "kteam-gitea-runner")]
    pub service: String,

    /// Name of the charm resource carrying the act_runner binary.
    #[config(default = "act-runner")]
    pub resource: String,

    /// Where the act_runner binary is installed.
    #[config(default = "/usr/local/bin/act_runner")]
    pub binary: PathBuf,

    /// System account the runner runs as.
    #[config(default = "act_runner")]
    pub user: String,

    /// Home directory of the system account.
    #[config(default = "/home/act_runner")]
    pub home: PathBuf,

    /// Runner state directory, also its working directory.
    #[config(default = "/var/lib/act_runner")]
    pub state_dir: PathBuf,

    /// Directory holding config.yaml.
    #[config(default = "/etc/act_runner")]
    pub config_dir: PathBuf,

    /// Port opened on start.
    #[config(default = 8088)]
    pub port: u16,

    /// Extra group the runner user joins for container access.
    #[config(default = "docker")]
    pub container_group: String,

    /// Package providing the container engine.
    #[config(default = "docker.io")]
    pub container_package: String,
}

/// Accept a mode written either as a string (`"0750"`) or as a bare integer
/// (`750`, which is what an env override of `0750` turns into).
fn mode_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Mode {
        Text(String),
        Number(u32),
    }
    Ok(match Mode::deserialize(deserializer)? {
        Mode::Text(s) => s,
        Mode::Number(n) => n.to_string(),
    })
}

impl OwnershipSettings {
    /// Parse `owner` and `mode` into a [`DirectoryOwnership`].
    pub fn ownership(&self) -> Result<DirectoryOwnership, SettingsError> {
        let mode = u32::from_str_radix(self.mode.trim(), 8)
            .ok()
            .filter(|m| *m <= 0o7777)
            .ok_or_else(|| SettingsError::InvalidValue {
                key: "gitea.data.mode".into(),
                reason: format!("'{}' is not an octal file mode", self.mode),
            })?;
        if self.owner.trim().is_empty() {
            return Err(SettingsError::InvalidValue {
                key: "gitea.data.owner".into(),
                reason: "owner must not be empty".into(),
            });
        }
        Ok(DirectoryOwnership::from_owner(self.owner.trim(), mode))
    }
}

impl RunnerSettings {
    /// The runner's generated `config.yaml`.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.yaml")
    }

    /// Ownership of the runner's state and config directories.
    pub fn ownership(&self) -> DirectoryOwnership {
        DirectoryOwnership::new(&self.user, &self.user, 0o755)
    }
}

/// Load settings from an optional file plus environment overrides.
///
/// A missing file is not an error; everything falls back to defaults.
pub fn load(
    file: Option<&Path>,
    env_vars: impl IntoIterator<Item = (String, String)>,
) -> Result<CharmSettings, SettingsError> {
    let mut merged = Table::new();

    if let Some(path) = file {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                validate_unknown_keys::<CharmSettings>(&content, path)?;
                let table: Table =
                    toml::from_str(&content).map_err(|source| SettingsError::ParseError {
                        path: path.to_path_buf(),
                        source,
                    })?;
                tracing::debug!(path = %path.display(), "loaded settings file");
                merged = deep_merge(merged, table);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
            }
            Err(source) => {
                return Err(SettingsError::IoError {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }

    merged = deep_merge(merged, env_to_table(ENV_PREFIX, env_vars));

    let layer: <CharmSettings as Config>::Layer =
        Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| SettingsError::InvalidValue {
                key: "<merged>".into(),
                reason: e.to_string(),
            })?;

    CharmSettings::builder()
        .preloaded(layer)
        .load()
        .map_err(SettingsError::from)
}

/// Result of a `settings` subcommand, returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsResult {
    Template(String),
    TemplateWritten { path: PathBuf },
    Listing { entries: Vec<(String, String)> },
}

impl fmt::Display for SettingsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsResult::Template(t) => write!(f, "{t}"),
            SettingsResult::TemplateWritten { path } => {
                write!(f, "Settings template written to {}", path.display())
            }
            SettingsResult::Listing { entries } => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                Ok(())
            }
        }
    }
}

/// A commented TOML template built from the doc comments above.
pub fn generate_template() -> String {
    confique::toml::template::<CharmSettings>(confique::toml::FormatOptions::default())
}

/// Write the template to `output`, or return it for printing.
pub fn template(output: Option<&Path>) -> Result<SettingsResult, SettingsError> {
    let template = generate_template();
    match output {
        Some(path) => {
            std::fs::write(path, &template).map_err(|source| SettingsError::IoError {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(SettingsResult::TemplateWritten {
                path: path.to_path_buf(),
            })
        }
        None => Ok(SettingsResult::Template(template)),
    }
}

/// Every resolved setting as a dotted key and its value.
pub fn list(settings: &CharmSettings) -> Result<SettingsResult, SettingsError> {
    let value = Value::try_from(settings).map_err(|e| SettingsError::InvalidValue {
        key: "<list>".into(),
        reason: e.to_string(),
    })?;
    let mut entries = Vec::new();
    if let Value::Table(table) = value {
        flatten_into("", &table, &mut entries);
    }
    Ok(SettingsResult::Listing { entries })
}

fn flatten_into(prefix: &str, table: &Table, out: &mut Vec<(String, String)>) {
    for (key, value) in table {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Table(sub) => flatten_into(&dotted, sub, out),
            Value::String(s) => out.push((dotted, s.clone())),
            other => out.push((dotted, other.to_string())),
        }
    }
}
