//! Error types, one enum per layer.
//!
//! - [`ConfigError`]: the `app.ini` mapping engine (load, apply, save).
//! - [`StrategyError`]: why a single external value was rejected. Always
//!   reached through [`ConfigError::InvalidConfigValue`]'s `source()`.
//! - [`ProvisionError`]: raw OS failures while provisioning a directory.
//! - [`SettingsError`]: loading the charm's own settings file.
//! - [`CharmError`]: everything the event handlers can fail with.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An external value failed its strategy check. The display text names only
    /// the external key; the reason is the error source.
    #[error("value for '{key}' is invalid")]
    InvalidConfigValue {
        key: String,
        #[source]
        cause: StrategyError,
    },

    #[error("allow-list pattern for '{key}' does not compile")]
    InvalidPattern {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("Section '{section}' not found")]
    SectionNotFound { section: String },

    #[error("Failed to access {path}")]
    ConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path} (line {line}): {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{path} is not loaded; call .load() first")]
    NotLoaded { path: PathBuf },

    #[error("Failed to provision directory {path}")]
    Provision {
        path: PathBuf,
        #[source]
        source: ProvisionError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("option is unset, but must be set")]
    Unset,

    #[error("'{value}' is not one of [{allowed}]")]
    NotAllowed { value: String, allowed: String },

    #[error("'{token}' is not one of [{allowed}]")]
    TokenNotAllowed { token: String, allowed: String },
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("could not create directory")]
    CreateDir(#[source] std::io::Error),

    #[error("no such user '{0}'")]
    UnknownUser(String),

    #[error("no such group '{0}'")]
    UnknownGroup(String),

    #[error("user/group lookup failed")]
    Lookup(#[source] nix::Error),

    #[error("chown failed")]
    Chown(#[source] nix::Error),

    #[error("chmod failed")]
    Chmod(#[source] std::io::Error),
}

/// A syntax error found while parsing INI text, before a path is attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct IniSyntaxError {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unknown key '{key}' in {path} (line {line})")]
    UnknownKey {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Unknown keys in settings file")]
    UnknownKeys(Vec<SettingsError>),

    #[error("Failed to parse {path}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to read {path}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Settings error")]
    ConfigError(#[from] confique::Error),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CharmError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Resource '{name}' is not attached; run `juju attach-resource`")]
    MissingResource { name: String },

    #[error("Failed to install resource '{name}' to {path}")]
    InstallResource {
        name: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to provision {path}")]
    Provision {
        path: PathBuf,
        #[source]
        source: ProvisionError,
    },

    #[error("Account '{user}' is not usable")]
    Account {
        user: String,
        #[source]
        source: ProvisionError,
    },

    #[error("Failed to run {program}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to access {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON from {tool}")]
    Json {
        tool: String,
        source: serde_json::Error,
    },

    #[error("Missing required action parameter '{0}'")]
    MissingParameter(String),

    #[error("Unknown hook or action '{0}'")]
    UnknownHook(String),
}
