//! Executes an [`Action`]: Juju dispatch, offline rendering, and the
//! `settings` subcommands, plus the [`Outcome`] callers print.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::charm::{self, Dispatch};
use crate::document::GiteaConfig;
use crate::error::CharmError;
use crate::host::Host;
use crate::juju::JujuHost;
use crate::provision::SkipProvisioner;
use crate::service::Systemctl;
use crate::settings::{self, CharmSettings, SettingsResult};
use crate::snapshot::Snapshot;
use crate::system::LinuxSystem;
use crate::table::gitea_options;
use crate::types::Action;

/// Result of an action. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A Juju event was handled.
    Dispatched(Dispatch),
    /// The rendered file was written.
    Rendered { path: PathBuf },
    /// The rendered file, not written (`--dry-run`).
    Preview(String),
    Settings(SettingsResult),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Dispatched(dispatch) => write!(f, "Handled {dispatch}"),
            Outcome::Rendered { path } => write!(f, "Wrote {}", path.display()),
            Outcome::Preview(text) => write!(f, "{}", text.trim_end()),
            Outcome::Settings(result) => write!(f, "{result}"),
        }
    }
}

/// Options for [`render`].
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub file: &'a Path,
    /// A JSON object in `config-get --format=json` form.
    pub config: Option<&'a Path>,
    /// `KEY=VALUE` pairs layered over `config`.
    pub set: &'a [String],
    pub dry_run: bool,
    pub provision: bool,
}

pub fn handle(action: Action, settings: &CharmSettings) -> Result<Outcome, CharmError> {
    match action {
        Action::Dispatch { charm: kind, path } => {
            let dispatch: Dispatch = path.parse()?;
            let unit = JujuHost::from_env();
            let services = Systemctl::default();
            let system = LinuxSystem;
            let host = Host {
                unit: &unit,
                services: &services,
                system: &system,
            };
            charm::run(kind, &dispatch, settings, host)?;
            Ok(Outcome::Dispatched(dispatch))
        }
        Action::Render {
            file,
            config,
            set,
            dry_run,
            provision,
        } => render(
            &RenderRequest {
                file: &file,
                config: config.as_deref(),
                set: &set,
                dry_run,
                provision,
            },
            settings,
        ),
        Action::SettingsGen { output } => {
            Ok(Outcome::Settings(settings::template(output.as_deref())?))
        }
        Action::SettingsList => Ok(Outcome::Settings(settings::list(settings)?)),
    }
}

/// Load `request.file`, apply the snapshot built from the request, and save
/// it (or return it unsaved on a dry run).
pub fn render(
    request: &RenderRequest<'_>,
    settings: &CharmSettings,
) -> Result<Outcome, CharmError> {
    let snapshot = read_snapshot(request.config)?
        .overlay(Snapshot::from_pairs(request.set.iter().map(String::as_str)));

    let ownership = settings.gitea.data.ownership()?;
    let mut config = if request.provision && !request.dry_run {
        GiteaConfig::with_ownership(request.file, &ownership)?
    } else {
        GiteaConfig::with_options(request.file, gitea_options(&ownership)?, SkipProvisioner)
    };
    if request.dry_run {
        config.load_read_only()?;
    } else {
        config.load()?;
    }
    config.apply(&snapshot)?;

    if request.dry_run {
        let text = config
            .document()
            .map(ToString::to_string)
            .unwrap_or_default();
        return Ok(Outcome::Preview(text));
    }
    config.save()?;
    tracing::info!(path = %request.file.display(), keys = snapshot.len(), "rendered");
    Ok(Outcome::Rendered {
        path: request.file.to_path_buf(),
    })
}

fn read_snapshot(path: Option<&Path>) -> Result<Snapshot, CharmError> {
    let Some(path) = path else {
        return Ok(Snapshot::new());
    };
    let text = fs::read_to_string(path).map_err(|source| CharmError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Snapshot::from_json(&text).map_err(|source| CharmError::Json {
        tool: path.display().to_string(),
        source,
    })
}
