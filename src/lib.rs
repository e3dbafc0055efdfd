//! Lifecycle management for a Gitea server and its Actions runner, driven by
//! Juju events.
//!
//! The heart of the crate is a declarative mapping from flat charm config
//! keys onto Gitea's `app.ini`. Each [`ConfigOption`] names an external key,
//! a destination `(section, key)`, and a [`Strategy`] that validates and
//! transforms the value. [`GiteaConfig`] owns the file and runs the whole
//! table in order:
//!
//! ```ignore
//! let mut config = GiteaConfig::new("/etc/gitea/app.ini")?;
//! config.load()?;
//! config.apply(&unit.config()?)?;
//! config.save()?;
//! ```
//!
//! A failed option stops `apply` with the external key in the error. Nothing
//! reaches disk until `save`, except directories created for path options.
//!
//! # Charms
//!
//! The [`charm`] module holds two event handlers sharing one binary:
//!
//! - **Gitea**: installs the server from a Juju resource, seeds `app.ini`,
//!   projects charm config onto it, and writes the PostgreSQL credentials
//!   the `database` relation hands over.
//! - **Runner**: installs `act_runner` and Docker, and registers the runner
//!   with a Gitea instance through the `register` action.
//!
//! Handlers talk to the outside world only through the traits in [`host`]:
//! [`UnitHost`] for Juju hook tools, [`ServiceControl`] for systemd and
//! [`SystemHost`] for users, files and commands. The production
//! implementations are [`JujuHost`], [`Systemctl`] and [`LinuxSystem`].
//!
//! # Settings
//!
//! Paths, service names, and accounts are not hard-coded; they come from
//! [`CharmSettings`], a confique struct loaded from
//! `/etc/gitea-charm/settings.toml` and `GITEA_CHARM__*` environment
//! variables. Unknown keys in the file are rejected with their line number.
//!
//! # Feature flags
//!
//! - **`cli`** (default): the clap front end in [`cli`] and the
//!   `gitea-charm` binary. Without it the library has no CLI dependency;
//!   build an [`Action`] by hand and pass it to [`ops::handle`].

pub mod charm;
pub mod document;
pub mod error;
pub mod host;
pub mod ini;
pub mod juju;
pub mod ops;
pub mod option;
pub mod provision;
pub mod service;
pub mod settings;
pub mod snapshot;
pub mod strategy;
pub mod system;
pub mod table;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(test)]
mod fixtures;

pub use charm::{CharmKind, Dispatch};
pub use document::GiteaConfig;
pub use error::{CharmError, ConfigError, ProvisionError, SettingsError, StrategyError};
pub use host::{Host, ServiceControl, SystemHost, UnitHost, UnitStatus};
pub use ini::IniDocument;
pub use juju::JujuHost;
pub use ops::Outcome;
pub use option::ConfigOption;
pub use provision::{DirectoryOwnership, DirectoryProvisioner, OsProvisioner};
pub use service::Systemctl;
pub use settings::CharmSettings;
pub use snapshot::Snapshot;
pub use strategy::Strategy;
pub use system::LinuxSystem;
pub use types::Action;
