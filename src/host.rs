//! Narrow interfaces to everything outside the configuration engine.
//!
//! The charm handlers only ever talk to the host through these traits. The
//! production implementations live in [`juju`](crate::juju) (hook tools),
//! [`service`](crate::service) (`systemctl`) and [`system`](crate::system)
//! (users, files, commands).

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::CharmError;
use crate::provision::DirectoryOwnership;
use crate::snapshot::Snapshot;

/// Workload status shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    Active(String),
    Maintenance(String),
    Waiting(String),
    Blocked(String),
}

impl UnitStatus {
    pub fn active() -> Self {
        UnitStatus::Active(String::new())
    }

    /// The name `status-set` expects.
    pub fn name(&self) -> &'static str {
        match self {
            UnitStatus::Active(_) => "active",
            UnitStatus::Maintenance(_) => "maintenance",
            UnitStatus::Waiting(_) => "waiting",
            UnitStatus::Blocked(_) => "blocked",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UnitStatus::Active(m)
            | UnitStatus::Maintenance(m)
            | UnitStatus::Waiting(m)
            | UnitStatus::Blocked(m) => m,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message().is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message())
        }
    }
}

/// The orchestration runtime, seen from one unit during one event.
pub trait UnitHost {
    /// The charm's current configuration.
    fn config(&self) -> Result<Snapshot, CharmError>;

    fn set_status(&self, status: &UnitStatus) -> Result<(), CharmError>;

    fn open_port(&self, port: u16) -> Result<(), CharmError>;

    /// Local path of an attached resource, or [`CharmError::MissingResource`].
    fn resource_path(&self, name: &str) -> Result<PathBuf, CharmError>;

    /// Application data the remote side published on `relation`.
    fn relation_data(&self, relation: &str) -> Result<Snapshot, CharmError>;

    /// Parameters of the action being run.
    fn action_params(&self) -> Result<Snapshot, CharmError>;

    fn action_fail(&self, message: &str) -> Result<(), CharmError>;

    fn action_log(&self, message: &str) -> Result<(), CharmError>;
}

/// Start/stop control over system services. Each call reports success.
pub trait ServiceControl {
    fn start(&self, unit: &str) -> bool;
    fn stop(&self, unit: &str) -> bool;
    fn restart(&self, unit: &str) -> bool;
    fn is_running(&self, unit: &str) -> bool;
    fn enable(&self, unit: &str) -> bool;
    fn daemon_reload(&self) -> bool;
}

/// A system account to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemUser {
    pub name: String,
    pub home: PathBuf,
    pub secondary_groups: Vec<String>,
}

/// A command line, optionally run as another user in a given directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub user: Option<String>,
    pub cwd: Option<PathBuf>,
    /// Arguments carry secrets and are left out of the display form.
    pub sensitive: bool,
}

impl CommandSpec {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            user: None,
            cwd: None,
            sensitive: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn as_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        if self.sensitive {
            return match self.args.first() {
                Some(first) => write!(f, " {first} [redacted]"),
                None => Ok(()),
            };
        }
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// The machine the charm runs on.
pub trait SystemHost {
    fn add_system_user(&self, user: &SystemUser) -> Result<(), CharmError>;

    /// Run a command to completion and return its stdout.
    fn run(&self, command: &CommandSpec) -> Result<String, CharmError>;

    /// Copy `source` to `dest` and set `mode` on the copy.
    fn install_file(&self, source: &Path, dest: &Path, mode: u32) -> Result<(), CharmError>;

    /// Write `contents` to `dest` with the given owner and mode.
    fn write_file(
        &self,
        dest: &Path,
        contents: &str,
        ownership: &DirectoryOwnership,
    ) -> Result<(), CharmError>;

    fn create_dir(&self, path: &Path, ownership: &DirectoryOwnership) -> Result<(), CharmError>;
}

/// Everything a handler can reach, bundled for passing around.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub unit: &'a dyn UnitHost,
    pub services: &'a dyn ServiceControl,
    pub system: &'a dyn SystemHost,
}
