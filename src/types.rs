use std::path::PathBuf;

use crate::charm::CharmKind;

/// Something the binary can be asked to do, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Handle one Juju event. `path` is `JUJU_DISPATCH_PATH`.
    Dispatch { charm: CharmKind, path: String },
    /// Apply a configuration snapshot to an `app.ini` outside of Juju.
    Render {
        file: PathBuf,
        config: Option<PathBuf>,
        set: Vec<String>,
        dry_run: bool,
        provision: bool,
    },
    /// Print or write the commented settings template.
    SettingsGen { output: Option<PathBuf> },
    /// Show every resolved setting.
    SettingsList,
}
