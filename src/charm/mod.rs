//! Event handlers for the Gitea charm and the runner charm.
//!
//! Juju runs the charm's `dispatch` script with `JUJU_DISPATCH_PATH` set to
//! `hooks/<event>` or `actions/<name>`. [`Dispatch`] parses that path and
//! [`run`] hands the event to the matching charm. Hooks a charm has no handler
//! for are logged and ignored; unknown actions are errors.

pub mod gitea;
pub mod runner;
pub mod units;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::document::GiteaConfig;
use crate::error::CharmError;
use crate::host::{Host, UnitStatus};
use crate::settings::CharmSettings;

pub use gitea::{DatabaseCredentials, GiteaCharm, GiteaEvent};
pub use runner::{RunnerCharm, RunnerEvent};

/// Mode for installed executables.
pub const BINARY_MODE: u32 = 0o775;

/// A parsed `JUJU_DISPATCH_PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Hook(String),
    Action(String),
}

impl FromStr for Dispatch {
    type Err = CharmError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let trimmed = path.trim().trim_start_matches("./");
        let parsed = match trimmed.split_once('/') {
            Some(("hooks", name)) if is_event_name(name) => Dispatch::Hook(name.to_string()),
            Some(("actions", name)) if is_event_name(name) => Dispatch::Action(name.to_string()),
            _ => return Err(CharmError::UnknownHook(path.to_string())),
        };
        Ok(parsed)
    }
}

fn is_event_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl fmt::Display for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Hook(name) => write!(f, "hooks/{name}"),
            Dispatch::Action(name) => write!(f, "actions/{name}"),
        }
    }
}

/// Which charm this binary is acting as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum CharmKind {
    #[default]
    Gitea,
    Runner,
}

/// Handle one dispatched event as `kind`.
pub fn run(
    kind: CharmKind,
    dispatch: &Dispatch,
    settings: &CharmSettings,
    host: Host<'_>,
) -> Result<(), CharmError> {
    tracing::info!(charm = ?kind, event = %dispatch, "dispatch");
    match kind {
        CharmKind::Gitea => {
            let Some(event) = GiteaEvent::from_dispatch(dispatch, host.unit)? else {
                tracing::debug!(event = %dispatch, "no handler");
                return Ok(());
            };
            let ownership = settings.gitea.data.ownership()?;
            let config = GiteaConfig::with_ownership(&settings.gitea.app_ini, &ownership)?;
            GiteaCharm::new(&settings.gitea, host, config).handle(event)
        }
        CharmKind::Runner => {
            let Some(event) = RunnerEvent::from_dispatch(dispatch)? else {
                tracing::debug!(event = %dispatch, "no handler");
                return Ok(());
            };
            RunnerCharm::new(&settings.runner, host).handle(event)
        }
    }
}

/// Copy the resource `name` to `dest` as an executable.
///
/// A missing resource or a failed copy is returned to the caller; install and
/// upgrade let it propagate so the unit goes into error.
pub(crate) fn install_resource(host: Host<'_>, name: &str, dest: &Path) -> Result<(), CharmError> {
    let source = host.unit.resource_path(name)?;
    host.system
        .install_file(&source, dest, BINARY_MODE)
        .map_err(|e| match e {
            CharmError::Io { source, .. } => CharmError::InstallResource {
                name: name.to_string(),
                path: dest.to_path_buf(),
                source,
            },
            other => other,
        })
}

/// Set a maintenance status and log it.
pub(crate) fn maintenance(host: Host<'_>, message: &str) -> Result<(), CharmError> {
    tracing::info!("{message}");
    host.unit
        .set_status(&UnitStatus::Maintenance(message.to_string()))
}

/// Log `message` as an error and block the unit on it.
pub(crate) fn block(host: Host<'_>, message: &str) -> Result<(), CharmError> {
    tracing::error!("{message}");
    host.unit.set_status(&UnitStatus::Blocked(message.to_string()))
}
