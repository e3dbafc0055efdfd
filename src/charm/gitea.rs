//! The Gitea server charm.
//!
//! Gitea stays stopped until the database relation supplies credentials.
//! Operator config flows through [`GiteaConfig`]: the service is stopped, the
//! file is reloaded, options are applied and the file saved, then the service
//! comes back. A rejected value blocks the unit and leaves the file on disk as
//! it was.

use crate::charm::{Dispatch, block, install_resource, maintenance, units};
use crate::document::GiteaConfig;
use crate::error::{CharmError, ConfigError};
use crate::host::{CommandSpec, Host, SystemUser, UnitHost, UnitStatus};
use crate::provision::DirectoryOwnership;
use crate::settings::GiteaSettings;
use crate::snapshot::Snapshot;

pub const WAITING_FOR_DATABASE: &str = "awaiting postgresql db";
pub const DATABASE_FAILED: &str = "Failed to configure database";
pub const NOT_RUNNING: &str = "Gitea service is not running";

/// Relation the database provider is attached on.
pub const DATABASE_RELATION: &str = "database";
/// Charm config key carrying the HTTP port.
pub const HTTP_PORT_KEY: &str = "gitea-server-http-port";

/// Credentials published by the database provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub endpoints: Option<String>,
}

impl DatabaseCredentials {
    pub fn from_snapshot(data: &Snapshot) -> Self {
        let field = |key: &str| data.get(key).filter(|v| !v.is_empty());
        Self {
            username: field("username"),
            password: field("password"),
            endpoints: field("endpoints"),
        }
    }

    /// `(username, password, endpoints)` when all three are present.
    pub fn complete(&self) -> Option<(&str, &str, &str)> {
        Some((
            self.username.as_deref()?,
            self.password.as_deref()?,
            self.endpoints.as_deref()?,
        ))
    }

    /// Nothing published yet.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none() && self.endpoints.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiteaEvent {
    Install,
    Start,
    ConfigChanged,
    Upgrade,
    UpdateStatus,
    DatabaseCreated(DatabaseCredentials),
}

impl GiteaEvent {
    /// Map a dispatch path to an event. `Ok(None)` for hooks without a
    /// handler, including database relation changes that carry no data yet.
    pub fn from_dispatch(
        dispatch: &Dispatch,
        unit: &dyn UnitHost,
    ) -> Result<Option<Self>, CharmError> {
        let name = match dispatch {
            Dispatch::Hook(name) => name.as_str(),
            Dispatch::Action(_) => return Err(CharmError::UnknownHook(dispatch.to_string())),
        };
        let event = match name {
            "install" => GiteaEvent::Install,
            "start" => GiteaEvent::Start,
            "config-changed" => GiteaEvent::ConfigChanged,
            "upgrade-charm" => GiteaEvent::Upgrade,
            "update-status" => GiteaEvent::UpdateStatus,
            "database-relation-changed" => {
                let creds = DatabaseCredentials::from_snapshot(
                    &unit.relation_data(DATABASE_RELATION)?,
                );
                if creds.is_empty() {
                    tracing::debug!("database relation has no credentials yet");
                    return Ok(None);
                }
                GiteaEvent::DatabaseCreated(creds)
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

pub struct GiteaCharm<'a> {
    settings: &'a GiteaSettings,
    host: Host<'a>,
    config: GiteaConfig,
}

impl<'a> GiteaCharm<'a> {
    pub fn new(settings: &'a GiteaSettings, host: Host<'a>, config: GiteaConfig) -> Self {
        Self {
            settings,
            host,
            config,
        }
    }

    pub fn handle(&mut self, event: GiteaEvent) -> Result<(), CharmError> {
        match event {
            GiteaEvent::Install => self.on_install(),
            GiteaEvent::Start => self.on_start(),
            GiteaEvent::ConfigChanged => self.on_config_changed(),
            GiteaEvent::Upgrade => self.on_upgrade(),
            GiteaEvent::UpdateStatus => self.on_update_status(),
            GiteaEvent::DatabaseCreated(creds) => self.on_database_created(&creds),
        }
    }

    pub fn on_install(&mut self) -> Result<(), CharmError> {
        let s = self.settings;
        maintenance(self.host, "Begin install")?;

        maintenance(self.host, "Install Gitea binary")?;
        install_resource(self.host, &s.resource, &s.binary)?;

        maintenance(self.host, "Install Git")?;
        self.host
            .system
            .run(&CommandSpec::new("apt-get").args(["update", "--quiet"]))?;
        self.host
            .system
            .run(&CommandSpec::new("apt-get").args(["install", "--yes", "--quiet", "git"]))?;

        maintenance(self.host, "Configure system")?;
        self.host.system.add_system_user(&SystemUser {
            name: s.user.clone(),
            home: s.home.clone(),
            secondary_groups: Vec::new(),
        })?;

        let data = s.data.ownership()?;
        for dir in [
            s.work_dir.clone(),
            s.work_dir.join("custom"),
            s.work_dir.join("data"),
            s.work_dir.join("log"),
        ] {
            self.host.system.create_dir(&dir, &data)?;
        }
        let root_group = |mode| DirectoryOwnership::new("root", &data.group, mode);
        self.host.system.create_dir(&s.config_dir, &root_group(0o770))?;

        // Reinstalling keeps whatever configuration is already there.
        if !s.app_ini.exists() {
            let seed = units::seed_app_ini(s)?;
            self.host
                .system
                .write_file(&s.app_ini, &seed.to_string(), &root_group(0o660))?;
        }

        // Left disabled until the database is configured.
        self.host.system.write_file(
            &units::unit_path(&s.service),
            &units::gitea_unit(s, &data.group),
            &DirectoryOwnership::new("root", "root", 0o644),
        )?;
        if !self.host.services.daemon_reload() {
            tracing::warn!("systemctl daemon-reload failed");
        }

        self.host.unit.set_status(&UnitStatus::active())
    }

    pub fn on_start(&mut self) -> Result<(), CharmError> {
        match self.database_configured() {
            Ok(true) => self.start_and_report(),
            Ok(false) => self
                .host
                .unit
                .set_status(&UnitStatus::Waiting(WAITING_FOR_DATABASE.into())),
            Err(e) => block(self.host, &e.to_string()),
        }
    }

    pub fn on_config_changed(&mut self) -> Result<(), CharmError> {
        let service = &self.settings.service;
        let snapshot = self.host.unit.config()?;

        let was_running = self.host.services.is_running(service);
        if was_running {
            self.host.services.stop(service);
        }

        let applied = self
            .config
            .load()
            .and_then(|()| self.config.apply(&snapshot));
        if let Err(e) = applied {
            // Nothing was saved, so the previous file is still good to run.
            if was_running {
                self.host.services.start(service);
            }
            return block(self.host, &e.to_string());
        }
        self.config.save()?;

        if was_running && !self.host.services.start(service) {
            return block(self.host, &format!("Failed to start {service}"));
        }

        let port = snapshot
            .get(HTTP_PORT_KEY)
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(self.settings.http_port);
        self.host.unit.open_port(port)?;

        self.host.unit.set_status(&UnitStatus::active())
    }

    pub fn on_database_created(&mut self, creds: &DatabaseCredentials) -> Result<(), CharmError> {
        let Some((username, password, endpoints)) = creds.complete() else {
            return block(self.host, DATABASE_FAILED);
        };

        let written = self
            .config
            .load()
            .and_then(|()| self.config.set_database_config(username, password, endpoints))
            .and_then(|()| self.config.save());
        if let Err(e) = written {
            tracing::error!(error = %e, "could not write database settings");
            return block(self.host, DATABASE_FAILED);
        }

        if !self.host.services.enable(&self.settings.service) {
            tracing::warn!(unit = %self.settings.service, "enable failed");
        }
        self.start_and_report()
    }

    pub fn on_upgrade(&mut self) -> Result<(), CharmError> {
        let service = &self.settings.service;
        maintenance(self.host, "Upgrading Gitea")?;

        let was_running = self.host.services.is_running(service);
        if was_running {
            self.host.services.stop(service);
        }
        install_resource(self.host, &self.settings.resource, &self.settings.binary)?;

        if was_running && !self.host.services.start(service) {
            return block(self.host, &format!("Failed to start {service}"));
        }
        self.on_update_status()
    }

    pub fn on_update_status(&mut self) -> Result<(), CharmError> {
        match self.database_configured() {
            Ok(false) => self
                .host
                .unit
                .set_status(&UnitStatus::Waiting(WAITING_FOR_DATABASE.into())),
            Ok(true) if self.host.services.is_running(&self.settings.service) => {
                self.host.unit.set_status(&UnitStatus::active())
            }
            Ok(true) => block(self.host, NOT_RUNNING),
            Err(e) => block(self.host, &e.to_string()),
        }
    }

    /// Whether `app.ini` already holds a database host.
    fn database_configured(&mut self) -> Result<bool, ConfigError> {
        self.config.load()?;
        Ok(self
            .config
            .get("database", "HOST")
            .is_some_and(|h| !h.is_empty()))
    }

    fn start_and_report(&self) -> Result<(), CharmError> {
        let service = &self.settings.service;
        let started = if self.host.services.is_running(service) {
            self.host.services.restart(service)
        } else {
            self.host.services.start(service)
        };
        if !started {
            return block(self.host, &format!("Failed to start {service}"));
        }
        self.host.unit.set_status(&UnitStatus::active())
    }
}
