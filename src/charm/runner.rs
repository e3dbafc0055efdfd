//! The Gitea Actions runner charm.
//!
//! The runner service only stays up once `act_runner register` has written
//! its `.runner` file into the state directory, which the `register` action
//! does. Until then update-status reports the unit as blocked.

use crate::charm::{Dispatch, block, install_resource, maintenance, units};
use crate::error::CharmError;
use crate::host::{CommandSpec, Host, SystemUser, UnitStatus};
use crate::provision::DirectoryOwnership;
use crate::settings::RunnerSettings;
use crate::snapshot::Snapshot;

pub const NOT_REGISTERED: &str =
    "Failed to start runner service. Has a runner token been registered?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerEvent {
    Install,
    Start,
    ConfigChanged,
    Upgrade,
    UpdateStatus,
    Register,
}

impl RunnerEvent {
    /// Map a dispatch path to an event. Unhandled hooks are `Ok(None)`;
    /// unknown actions are errors.
    pub fn from_dispatch(dispatch: &Dispatch) -> Result<Option<Self>, CharmError> {
        let event = match dispatch {
            Dispatch::Hook(name) => match name.as_str() {
                "install" => RunnerEvent::Install,
                "start" => RunnerEvent::Start,
                "config-changed" => RunnerEvent::ConfigChanged,
                "upgrade-charm" => RunnerEvent::Upgrade,
                "update-status" => RunnerEvent::UpdateStatus,
                _ => return Ok(None),
            },
            Dispatch::Action(name) if name == "register" => RunnerEvent::Register,
            Dispatch::Action(_) => return Err(CharmError::UnknownHook(dispatch.to_string())),
        };
        Ok(Some(event))
    }
}

/// Parameters of the `register` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub instance: String,
    pub token: String,
    pub name: Option<String>,
    pub labels: Option<String>,
}

impl Registration {
    pub fn from_params(params: &Snapshot) -> Result<Self, CharmError> {
        let optional = |key: &str| params.get(key).filter(|v| !v.trim().is_empty());
        let required =
            |key: &str| optional(key).ok_or_else(|| CharmError::MissingParameter(key.to_string()));
        Ok(Self {
            instance: required("instance")?,
            token: required("token")?,
            name: optional("name"),
            labels: optional("labels"),
        })
    }

    /// The `act_runner register` invocation, run as the runner user from its
    /// state directory so the `.runner` file lands there.
    pub fn command(&self, settings: &RunnerSettings) -> CommandSpec {
        let binary = settings.binary.display().to_string();
        let config = settings.config_file().display().to_string();
        let mut cmd = CommandSpec::new(&binary)
            .args(["register", "--no-interactive"])
            .args(["--instance", self.instance.as_str()])
            .args(["--token", self.token.as_str()]);
        if let Some(name) = &self.name {
            cmd = cmd.args(["--name", name.as_str()]);
        }
        if let Some(labels) = &self.labels {
            cmd = cmd.args(["--labels", labels.as_str()]);
        }
        cmd.args(["--config", config.as_str()])
            .as_user(&settings.user)
            .current_dir(&settings.state_dir)
            .sensitive()
    }
}

pub struct RunnerCharm<'a> {
    settings: &'a RunnerSettings,
    host: Host<'a>,
}

impl<'a> RunnerCharm<'a> {
    pub fn new(settings: &'a RunnerSettings, host: Host<'a>) -> Self {
        Self { settings, host }
    }

    pub fn handle(&self, event: RunnerEvent) -> Result<(), CharmError> {
        match event {
            RunnerEvent::Install => self.on_install(),
            RunnerEvent::Start => self.on_start(),
            RunnerEvent::ConfigChanged => self.on_config_changed(),
            RunnerEvent::Upgrade => self.on_upgrade(),
            RunnerEvent::UpdateStatus => self.on_update_status(),
            RunnerEvent::Register => self.on_register(),
        }
    }

    pub fn on_install(&self) -> Result<(), CharmError> {
        let s = self.settings;
        maintenance(self.host, "Begin install")?;

        maintenance(self.host, "Install Gitea runner")?;
        install_resource(self.host, &s.resource, &s.binary)?;

        maintenance(self.host, "Install Docker")?;
        self.host
            .system
            .run(&CommandSpec::new("apt-get").args(["update", "--quiet"]))?;
        self.host.system.run(&CommandSpec::new("apt-get").args([
            "install",
            "--yes",
            "--quiet",
            s.container_package.as_str(),
        ]))?;
        if !self.host.services.start("docker") {
            tracing::warn!("docker did not start");
        }

        self.host.system.add_system_user(&SystemUser {
            name: s.user.clone(),
            home: s.home.clone(),
            secondary_groups: vec![s.container_group.clone()],
        })?;
        let owned = s.ownership();
        self.host.system.create_dir(&s.state_dir, &owned)?;
        self.host.system.create_dir(&s.config_dir, &owned)?;

        maintenance(self.host, "Configuring system")?;
        let generated = self.host.system.run(
            &CommandSpec::new(&s.binary.display().to_string()).arg("generate-config"),
        )?;
        self.host.system.write_file(
            &s.config_file(),
            &generated,
            &DirectoryOwnership::new(&s.user, &s.user, 0o644),
        )?;

        self.host.system.write_file(
            &units::unit_path(&s.service),
            &units::runner_unit(s),
            &DirectoryOwnership::new("root", "root", 0o644),
        )?;
        if !self.host.services.daemon_reload() {
            tracing::warn!("systemctl daemon-reload failed");
        }

        self.host.unit.set_status(&UnitStatus::active())
    }

    pub fn on_start(&self) -> Result<(), CharmError> {
        self.host.unit.open_port(self.settings.port)
    }

    pub fn on_config_changed(&self) -> Result<(), CharmError> {
        let service = &self.settings.service;
        self.host.services.stop(service);
        if !self.host.services.start(service) {
            return block(self.host, NOT_REGISTERED);
        }
        self.host.unit.set_status(&UnitStatus::active())
    }

    pub fn on_upgrade(&self) -> Result<(), CharmError> {
        let service = &self.settings.service;
        maintenance(self.host, "Upgrading Gitea runner")?;

        let was_running = self.host.services.is_running(service);
        if was_running {
            self.host.services.stop(service);
        }
        install_resource(self.host, &self.settings.resource, &self.settings.binary)?;
        if was_running {
            self.host.services.start(service);
        }
        self.on_update_status()
    }

    pub fn on_update_status(&self) -> Result<(), CharmError> {
        if self.host.services.is_running(&self.settings.service) {
            self.host.unit.set_status(&UnitStatus::active())
        } else {
            block(self.host, NOT_REGISTERED)
        }
    }

    /// Register with a Gitea instance, then enable and (re)start the service.
    /// Failures are reported through `action-fail`.
    pub fn on_register(&self) -> Result<(), CharmError> {
        let params = self.host.unit.action_params()?;
        let registration = match Registration::from_params(&params) {
            Ok(r) => r,
            Err(e) => return self.host.unit.action_fail(&e.to_string()),
        };

        tracing::info!(instance = %registration.instance, "registering runner");
        if let Err(e) = self.host.system.run(&registration.command(self.settings)) {
            return self
                .host
                .unit
                .action_fail(&format!("Runner registration failed: {e}"));
        }
        self.host.unit.action_log("Runner registered")?;

        let service = &self.settings.service;
        if !self.host.services.enable(service) {
            tracing::warn!(unit = %service, "enable failed");
        }
        if !self.host.services.restart(service) {
            self.host
                .unit
                .action_fail(&format!("Registered, but {service} failed to start"))?;
            return block(self.host, NOT_REGISTERED);
        }
        self.host.unit.set_status(&UnitStatus::active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{FakeServices, FakeSystem, FakeUnit};
    use crate::settings::CharmSettings;
    use confique::Config;
    use std::path::PathBuf;

    const SERVICE: &str = "kteam-gitea-runner";

    fn settings() -> RunnerSettings {
        CharmSettings::builder().load().unwrap().runner
    }

    fn run_event(
        event: RunnerEvent,
        unit: &FakeUnit,
        services: &FakeServices,
        system: &FakeSystem,
    ) -> Result<(), CharmError> {
        let settings = settings();
        let host = Host {
            unit,
            services,
            system,
        };
        RunnerCharm::new(&settings, host).handle(event)
    }

    fn register_params() -> Snapshot {
        Snapshot::new()
            .with("instance", "https://git.example")
            .with("token", "s3cr3t")
    }

    #[test]
    fn dispatch_mapping() {
        let map = |p: &str| RunnerEvent::from_dispatch(&p.parse().unwrap());
        assert_eq!(map("hooks/install").unwrap(), Some(RunnerEvent::Install));
        assert_eq!(map("hooks/update-status").unwrap(), Some(RunnerEvent::UpdateStatus));
        assert_eq!(map("actions/register").unwrap(), Some(RunnerEvent::Register));
        assert_eq!(map("hooks/leader-elected").unwrap(), None);
        assert!(map("actions/unregister").is_err());
    }

    #[test]
    fn start_opens_runner_port() {
        let unit = FakeUnit::default();
        run_event(
            RunnerEvent::Start,
            &unit,
            &FakeServices::default(),
            &FakeSystem::default(),
        )
        .unwrap();
        assert_eq!(*unit.ports.borrow(), vec![8088]);
    }

    #[test]
    fn update_status_blocks_when_not_running() {
        let unit = FakeUnit::default();
        run_event(
            RunnerEvent::UpdateStatus,
            &unit,
            &FakeServices::default(),
            &FakeSystem::default(),
        )
        .unwrap();
        assert_eq!(
            unit.last_status(),
            Some(UnitStatus::Blocked(NOT_REGISTERED.into()))
        );
    }

    #[test]
    fn update_status_active_when_running() {
        let unit = FakeUnit::default();
        run_event(
            RunnerEvent::UpdateStatus,
            &unit,
            &FakeServices::running(&[SERVICE]),
            &FakeSystem::default(),
        )
        .unwrap();
        assert_eq!(unit.last_status(), Some(UnitStatus::active()));
    }

    #[test]
    fn config_changed_restarts_service() {
        let unit = FakeUnit::default();
        let services = FakeServices::running(&[SERVICE]);
        run_event(RunnerEvent::ConfigChanged, &unit, &services, &FakeSystem::default()).unwrap();
        assert_eq!(
            services.calls(),
            vec![format!("stop {SERVICE}"), format!("start {SERVICE}")]
        );
        assert_eq!(unit.last_status(), Some(UnitStatus::active()));
    }

    #[test]
    fn config_changed_blocks_when_unregistered_runner_will_not_start() {
        let unit = FakeUnit::default();
        let services = FakeServices {
            broken: [SERVICE.to_string()].into(),
            ..FakeServices::default()
        };
        run_event(RunnerEvent::ConfigChanged, &unit, &services, &FakeSystem::default()).unwrap();
        assert_eq!(
            unit.last_status(),
            Some(UnitStatus::Blocked(NOT_REGISTERED.into()))
        );
    }

    #[test]
    fn registration_requires_instance_and_token() {
        let err = Registration::from_params(&Snapshot::new().with("instance", "https://x"))
            .unwrap_err();
        assert!(matches!(err, CharmError::MissingParameter(ref p) if p == "token"));
        let blank_instance = Snapshot::new().with("instance", " ").with("token", "t");
        let err = Registration::from_params(&blank_instance).unwrap_err();
        assert!(matches!(err, CharmError::MissingParameter(ref p) if p == "instance"));
    }

    #[test]
    fn register_command_line() {
        let reg = Registration::from_params(
            &register_params()
                .with("name", "runner-0")
                .with("labels", "ubuntu-latest:docker://node:20"),
        )
        .unwrap();
        let cmd = reg.command(&settings());
        assert_eq!(cmd.program, "/usr/local/bin/act_runner");
        assert_eq!(
            cmd.args,
            vec![
                "register",
                "--no-interactive",
                "--instance",
                "https://git.example",
                "--token",
                "s3cr3t",
                "--name",
                "runner-0",
                "--labels",
                "ubuntu-latest:docker://node:20",
                "--config",
                "/etc/act_runner/config.yaml",
            ]
        );
        assert_eq!(cmd.user.as_deref(), Some("act_runner"));
        assert_eq!(cmd.cwd, Some(PathBuf::from("/var/lib/act_runner")));
        assert!(!cmd.to_string().contains("s3cr3t"));
    }

    #[test]
    fn register_action_runs_and_starts_service() {
        let unit = FakeUnit {
            params: register_params(),
            ..FakeUnit::default()
        };
        let services = FakeServices::default();
        let system = FakeSystem::default();
        run_event(RunnerEvent::Register, &unit, &services, &system).unwrap();

        let commands = system.commands.borrow();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].args[..2], ["register", "--no-interactive"]);
        assert_eq!(
            services.calls(),
            vec![format!("enable {SERVICE}"), format!("restart {SERVICE}")]
        );
        assert_eq!(*unit.logs.borrow(), vec!["Runner registered"]);
        assert!(unit.failures.borrow().is_empty());
        assert_eq!(unit.last_status(), Some(UnitStatus::active()));
    }

    #[test]
    fn register_action_with_missing_token_fails_the_action() {
        let unit = FakeUnit {
            params: Snapshot::new().with("instance", "https://git.example"),
            ..FakeUnit::default()
        };
        let system = FakeSystem::default();
        run_event(RunnerEvent::Register, &unit, &FakeServices::default(), &system).unwrap();
        assert_eq!(
            *unit.failures.borrow(),
            vec!["Missing required action parameter 'token'"]
        );
        assert!(system.commands.borrow().is_empty());
    }

    #[test]
    fn register_command_failure_fails_the_action() {
        let unit = FakeUnit {
            params: register_params(),
            ..FakeUnit::default()
        };
        let system = FakeSystem {
            failing_program: Some("/usr/local/bin/act_runner".into()),
            ..FakeSystem::default()
        };
        let services = FakeServices::default();
        run_event(RunnerEvent::Register, &unit, &services, &system).unwrap();
        let failures = unit.failures.borrow();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("Runner registration failed"));
        assert!(services.calls().is_empty());
    }

    #[test]
    fn install_without_resource_fails() {
        let err = run_event(
            RunnerEvent::Install,
            &FakeUnit::default(),
            &FakeServices::default(),
            &FakeSystem::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CharmError::MissingResource { ref name } if name == "act-runner"));
    }

    #[test]
    fn install_provisions_runner() {
        let unit = FakeUnit {
            resources: [(
                "act-runner".to_string(),
                PathBuf::from("/charm/resources/act_runner"),
            )]
            .into(),
            ..FakeUnit::default()
        };
        let services = FakeServices::default();
        let system = FakeSystem {
            stdout: "log:\n  level: info\n".into(),
            ..FakeSystem::default()
        };
        run_event(RunnerEvent::Install, &unit, &services, &system).unwrap();

        assert_eq!(
            system.command_lines(),
            vec![
                "apt-get update --quiet",
                "apt-get install --yes --quiet docker.io",
                "/usr/local/bin/act_runner generate-config",
            ]
        );
        assert_eq!(
            system.users.borrow()[0].secondary_groups,
            vec!["docker".to_string()]
        );
        assert_eq!(
            system
                .file(&PathBuf::from("/etc/act_runner/config.yaml"))
                .as_deref(),
            Some("log:\n  level: info\n")
        );
        assert!(
            system
                .file(&PathBuf::from("/etc/systemd/system/kteam-gitea-runner.service"))
                .is_some()
        );
        assert_eq!(services.calls(), vec!["start docker", "daemon-reload "]);
        assert_eq!(unit.last_status(), Some(UnitStatus::active()));
    }
}
