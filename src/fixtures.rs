#[cfg(test)]
pub mod test {
    use std::cell::RefCell;
    use std::collections::{BTreeMap, BTreeSet};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use tempfile::TempDir;

    use crate::error::{CharmError, ProvisionError};
    use crate::host::{CommandSpec, ServiceControl, SystemHost, SystemUser, UnitHost, UnitStatus};
    use crate::provision::{DirectoryOwnership, DirectoryProvisioner};
    use crate::snapshot::Snapshot;

    /// Write `content` to `app.ini` inside `dir`.
    pub fn write_app_ini(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("app.ini");
        fs::write(&path, content).unwrap();
        path
    }

    // -- Directory provisioning ------------------------------------------------

    /// Records provisioned paths instead of touching the filesystem. Clones
    /// share the record, so a clone can be handed to a `GiteaConfig` and the
    /// original inspected afterwards.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingProvisioner {
        paths: Rc<RefCell<Vec<PathBuf>>>,
        fail: bool,
    }

    impl RecordingProvisioner {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn paths(&self) -> Vec<PathBuf> {
            self.paths.borrow().clone()
        }
    }

    impl DirectoryProvisioner for RecordingProvisioner {
        fn provision(
            &self,
            path: &Path,
            ownership: &DirectoryOwnership,
        ) -> Result<(), ProvisionError> {
            self.paths.borrow_mut().push(path.to_path_buf());
            if self.fail {
                return Err(ProvisionError::UnknownUser(ownership.user.clone()));
            }
            Ok(())
        }
    }

    // -- Unit host -------------------------------------------------------------

    #[derive(Default)]
    pub struct FakeUnit {
        pub config: RefCell<Snapshot>,
        pub resources: BTreeMap<String, PathBuf>,
        pub relations: BTreeMap<String, Snapshot>,
        pub params: Snapshot,
        pub statuses: RefCell<Vec<UnitStatus>>,
        pub ports: RefCell<Vec<u16>>,
        pub failures: RefCell<Vec<String>>,
        pub logs: RefCell<Vec<String>>,
    }

    impl FakeUnit {
        pub fn with_config(config: Snapshot) -> Self {
            Self {
                config: RefCell::new(config),
                ..Self::default()
            }
        }

        pub fn last_status(&self) -> Option<UnitStatus> {
            self.statuses.borrow().last().cloned()
        }
    }

    impl UnitHost for FakeUnit {
        fn config(&self) -> Result<Snapshot, CharmError> {
            Ok(self.config.borrow().clone())
        }

        fn set_status(&self, status: &UnitStatus) -> Result<(), CharmError> {
            self.statuses.borrow_mut().push(status.clone());
            Ok(())
        }

        fn open_port(&self, port: u16) -> Result<(), CharmError> {
            self.ports.borrow_mut().push(port);
            Ok(())
        }

        fn resource_path(&self, name: &str) -> Result<PathBuf, CharmError> {
            self.resources
                .get(name)
                .cloned()
                .ok_or_else(|| CharmError::MissingResource {
                    name: name.to_string(),
                })
        }

        fn relation_data(&self, relation: &str) -> Result<Snapshot, CharmError> {
            Ok(self.relations.get(relation).cloned().unwrap_or_default())
        }

        fn action_params(&self) -> Result<Snapshot, CharmError> {
            Ok(self.params.clone())
        }

        fn action_fail(&self, message: &str) -> Result<(), CharmError> {
            self.failures.borrow_mut().push(message.to_string());
            Ok(())
        }

        fn action_log(&self, message: &str) -> Result<(), CharmError> {
            self.logs.borrow_mut().push(message.to_string());
            Ok(())
        }
    }

    // -- Services --------------------------------------------------------------

    /// In-memory service manager. Every call is logged as `"<verb> <unit>"`.
    #[derive(Default)]
    pub struct FakeServices {
        pub running: RefCell<BTreeSet<String>>,
        pub calls: RefCell<Vec<String>>,
        /// Units that refuse to start.
        pub broken: BTreeSet<String>,
    }

    impl FakeServices {
        pub fn running(units: &[&str]) -> Self {
            Self {
                running: RefCell::new(units.iter().map(|u| u.to_string()).collect()),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, verb: &str, unit: &str) {
            self.calls.borrow_mut().push(format!("{verb} {unit}"));
        }
    }

    impl ServiceControl for FakeServices {
        fn start(&self, unit: &str) -> bool {
            self.record("start", unit);
            if self.broken.contains(unit) {
                return false;
            }
            self.running.borrow_mut().insert(unit.to_string());
            true
        }

        fn stop(&self, unit: &str) -> bool {
            self.record("stop", unit);
            self.running.borrow_mut().remove(unit);
            true
        }

        fn restart(&self, unit: &str) -> bool {
            self.record("restart", unit);
            if self.broken.contains(unit) {
                self.running.borrow_mut().remove(unit);
                return false;
            }
            self.running.borrow_mut().insert(unit.to_string());
            true
        }

        fn is_running(&self, unit: &str) -> bool {
            self.running.borrow().contains(unit)
        }

        fn enable(&self, unit: &str) -> bool {
            self.record("enable", unit);
            true
        }

        fn daemon_reload(&self) -> bool {
            self.record("daemon-reload", "");
            true
        }
    }

    // -- System ----------------------------------------------------------------

    /// Records users, commands and files. Written files are kept in memory
    /// unless `write_through` is set, in which case they also land on disk.
    #[derive(Default)]
    pub struct FakeSystem {
        pub users: RefCell<Vec<SystemUser>>,
        pub commands: RefCell<Vec<CommandSpec>>,
        pub installed: RefCell<Vec<(PathBuf, PathBuf, u32)>>,
        pub files: RefCell<BTreeMap<PathBuf, String>>,
        pub dirs: RefCell<Vec<(PathBuf, DirectoryOwnership)>>,
        /// Stdout returned for every command.
        pub stdout: String,
        /// Commands whose program matches this fail with a nonzero exit.
        pub failing_program: Option<String>,
        pub write_through: bool,
    }

    impl FakeSystem {
        pub fn command_lines(&self) -> Vec<String> {
            self.commands.borrow().iter().map(ToString::to_string).collect()
        }

        pub fn file(&self, path: &Path) -> Option<String> {
            self.files.borrow().get(path).cloned()
        }
    }

    impl SystemHost for FakeSystem {
        fn add_system_user(&self, user: &SystemUser) -> Result<(), CharmError> {
            self.users.borrow_mut().push(user.clone());
            Ok(())
        }

        fn run(&self, command: &CommandSpec) -> Result<String, CharmError> {
            self.commands.borrow_mut().push(command.clone());
            if self.failing_program.as_deref() == Some(command.program.as_str()) {
                return Err(CharmError::Command {
                    program: command.program.clone(),
                    status: "exit status: 1".into(),
                    stderr: "boom".into(),
                });
            }
            Ok(self.stdout.clone())
        }

        fn install_file(&self, source: &Path, dest: &Path, mode: u32) -> Result<(), CharmError> {
            self.installed
                .borrow_mut()
                .push((source.to_path_buf(), dest.to_path_buf(), mode));
            Ok(())
        }

        fn write_file(
            &self,
            dest: &Path,
            contents: &str,
            _ownership: &DirectoryOwnership,
        ) -> Result<(), CharmError> {
            if self.write_through {
                fs::write(dest, contents).unwrap();
            }
            self.files
                .borrow_mut()
                .insert(dest.to_path_buf(), contents.to_string());
            Ok(())
        }

        fn create_dir(
            &self,
            path: &Path,
            ownership: &DirectoryOwnership,
        ) -> Result<(), CharmError> {
            self.dirs
                .borrow_mut()
                .push((path.to_path_buf(), ownership.clone()));
            Ok(())
        }
    }

    #[test]
    fn recording_provisioner_clones_share_state() {
        let a = RecordingProvisioner::default();
        let b = a.clone();
        b.provision(Path::new("/x"), &DirectoryOwnership::default())
            .unwrap();
        assert_eq!(a.paths(), vec![PathBuf::from("/x")]);
    }

    #[test]
    fn fake_services_track_running_units() {
        let services = FakeServices::default();
        assert!(!services.is_running("kteam-gitea"));
        services.start("kteam-gitea");
        assert!(services.is_running("kteam-gitea"));
        services.stop("kteam-gitea");
        assert!(!services.is_running("kteam-gitea"));
        assert_eq!(services.calls(), vec!["start kteam-gitea", "stop kteam-gitea"]);
    }
}
