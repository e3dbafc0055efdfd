//! [`UnitHost`] over the Juju hook tools.
//!
//! Each call spawns the matching tool (`config-get`, `status-set`, ...) found
//! on `PATH`, or in an explicit tools directory. JSON output is requested
//! wherever the tool supports it.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::CharmError;
use crate::host::{UnitHost, UnitStatus};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Default)]
pub struct JujuHost {
    tools_dir: Option<PathBuf>,
    remote_app: Option<String>,
}

impl JujuHost {
    /// Hook tools from `PATH`, remote application from `JUJU_REMOTE_APP`.
    pub fn from_env() -> Self {
        Self {
            tools_dir: None,
            remote_app: std::env::var("JUJU_REMOTE_APP")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }

    /// Hook tools from `dir` instead of `PATH`.
    pub fn with_tools_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(dir.into()),
            remote_app: None,
        }
    }

    pub fn remote_app(mut self, app: &str) -> Self {
        self.remote_app = Some(app.to_string());
        self
    }

    fn program(&self, tool: &str) -> PathBuf {
        match &self.tools_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }

    fn output(&self, tool: &str, args: &[&str]) -> Result<std::process::Output, CharmError> {
        tracing::trace!(tool, ?args, "hook tool");
        Command::new(self.program(tool))
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| CharmError::Spawn {
                program: tool.to_string(),
                source,
            })
    }

    /// Run `tool`, failing on a nonzero exit, and return stdout.
    fn invoke(&self, tool: &str, args: &[&str]) -> Result<String, CharmError> {
        let output = self.output(tool, args)?;
        if !output.status.success() {
            return Err(CharmError::Command {
                program: tool.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn invoke_json(&self, tool: &str, args: &[&str]) -> Result<Snapshot, CharmError> {
        let out = self.invoke(tool, args)?;
        parse_snapshot(tool, &out)
    }
}

/// Parse a tool's JSON object output. Empty output and `null` mean no data.
fn parse_snapshot(tool: &str, out: &str) -> Result<Snapshot, CharmError> {
    let out = out.trim();
    if out.is_empty() || out == "null" {
        return Ok(Snapshot::new());
    }
    Snapshot::from_json(out).map_err(|source| CharmError::Json {
        tool: tool.to_string(),
        source,
    })
}

/// First id from `relation-ids --format=json`.
fn first_relation_id(tool: &str, out: &str) -> Result<Option<String>, CharmError> {
    let out = out.trim();
    if out.is_empty() || out == "null" {
        return Ok(None);
    }
    let ids: Vec<String> = serde_json::from_str(out).map_err(|source| CharmError::Json {
        tool: tool.to_string(),
        source,
    })?;
    Ok(ids.into_iter().next())
}

/// Application name of the first unit listed by `relation-list --format=json`.
fn app_from_units(tool: &str, out: &str) -> Result<Option<String>, CharmError> {
    let out = out.trim();
    if out.is_empty() || out == "null" {
        return Ok(None);
    }
    let units: Vec<String> = serde_json::from_str(out).map_err(|source| CharmError::Json {
        tool: tool.to_string(),
        source,
    })?;
    Ok(units
        .first()
        .and_then(|u| u.split_once('/'))
        .map(|(app, _)| app.to_string()))
}

impl UnitHost for JujuHost {
    fn config(&self) -> Result<Snapshot, CharmError> {
        self.invoke_json("config-get", &["--format=json"])
    }

    fn set_status(&self, status: &UnitStatus) -> Result<(), CharmError> {
        tracing::info!(%status, "status");
        self.invoke("status-set", &[status.name(), status.message()])
            .map(drop)
    }

    fn open_port(&self, port: u16) -> Result<(), CharmError> {
        let spec = format!("{port}/tcp");
        self.invoke("open-port", &[&spec]).map(drop)
    }

    fn resource_path(&self, name: &str) -> Result<PathBuf, CharmError> {
        let output = self.output("resource-get", &[name])?;
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || path.is_empty() {
            tracing::warn!(
                resource = name,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "resource-get failed"
            );
            return Err(CharmError::MissingResource {
                name: name.to_string(),
            });
        }
        // An attached-but-empty resource is as good as missing.
        let empty = std::fs::metadata(Path::new(&path))
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        if empty {
            return Err(CharmError::MissingResource {
                name: name.to_string(),
            });
        }
        Ok(PathBuf::from(path))
    }

    fn relation_data(&self, relation: &str) -> Result<Snapshot, CharmError> {
        let ids = self.invoke("relation-ids", &[relation, "--format=json"])?;
        let Some(id) = first_relation_id("relation-ids", &ids)? else {
            return Ok(Snapshot::new());
        };

        let app = match &self.remote_app {
            Some(app) => Some(app.clone()),
            None => {
                let units = self.invoke("relation-list", &["-r", &id, "--format=json"])?;
                app_from_units("relation-list", &units)?
            }
        };
        let Some(app) = app else {
            tracing::debug!(relation, id, "no remote application yet");
            return Ok(Snapshot::new());
        };

        self.invoke_json("relation-get", &["--format=json", "-r", &id, "--app", "-", &app])
    }

    fn action_params(&self) -> Result<Snapshot, CharmError> {
        self.invoke_json("action-get", &["--format=json"])
    }

    fn action_fail(&self, message: &str) -> Result<(), CharmError> {
        tracing::error!(reason = message, "action failed");
        self.invoke("action-fail", &[message]).map(drop)
    }

    fn action_log(&self, message: &str) -> Result<(), CharmError> {
        self.invoke("action-log", &[message]).map(drop)
    }
}
