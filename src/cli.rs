//! Clap front end for the `gitea-charm` binary.
//!
//! Compiled only with the `cli` feature. The only bridge to the library is
//! [`Cli::into_action()`], which turns parsed arguments into an
//! [`Action`](crate::Action); everything after that goes through
//! [`ops::handle`](crate::ops::handle).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::charm::CharmKind;
use crate::settings::DEFAULT_SETTINGS_PATH;
use crate::types::Action;

/// Lifecycle manager for a Gitea server and its Actions runner.
#[derive(Debug, Parser)]
#[command(name = "gitea-charm", version)]
pub struct Cli {
    /// Charm settings file. A missing file means built-in defaults.
    #[arg(
        long,
        global = true,
        env = "GITEA_CHARM_SETTINGS",
        default_value = DEFAULT_SETTINGS_PATH
    )]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Handle the Juju event named by JUJU_DISPATCH_PATH.
    Dispatch {
        /// Which charm this unit runs.
        #[arg(long, value_enum, default_value_t = CharmKind::Gitea)]
        charm: CharmKind,
        /// `hooks/<event>` or `actions/<name>`.
        #[arg(env = "JUJU_DISPATCH_PATH")]
        path: String,
    },
    /// Apply charm config to an app.ini without Juju.
    Render(RenderArgs),
    /// Inspect the charm's own settings.
    Settings(SettingsArgs),
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// The app.ini to update.
    #[arg(short, long)]
    pub file: PathBuf,
    /// JSON object of charm config, as printed by `config-get --format=json`.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Extra `KEY=VALUE` config, applied over `--config`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
    /// Print the result instead of writing it.
    #[arg(long)]
    pub dry_run: bool,
    /// Do not create directories named by path options.
    #[arg(long)]
    pub no_provision: bool,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: Option<SettingsSubcommand>,
}

#[derive(Debug, Subcommand)]
pub enum SettingsSubcommand {
    /// Show every resolved setting.
    List,
    /// Generate a commented settings file.
    Gen {
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Convert parsed args into a framework-agnostic [`Action`].
    ///
    /// Bare `settings` and `settings list` both map to
    /// [`Action::SettingsList`].
    pub fn into_action(self) -> Action {
        match self.command {
            Command::Dispatch { charm, path } => Action::Dispatch { charm, path },
            Command::Render(args) => Action::Render {
                file: args.file,
                config: args.config,
                set: args.set,
                dry_run: args.dry_run,
                provision: !args.no_provision,
            },
            Command::Settings(args) => match args.action {
                None | Some(SettingsSubcommand::List) => Action::SettingsList,
                Some(SettingsSubcommand::Gen { output }) => Action::SettingsGen { output },
            },
        }
    }
}
