//! [`SystemHost`] for a Linux machine.

use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use nix::unistd::{Group, User, chown};

use crate::error::{CharmError, ProvisionError};
use crate::host::{CommandSpec, SystemHost, SystemUser};
use crate::provision::{DirectoryOwnership, DirectoryProvisioner, OsProvisioner};

/// `useradd` exits with this when the account already exists.
const USERADD_EXISTS: i32 = 9;

#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxSystem;

impl LinuxSystem {
    fn user_exists(name: &str) -> Result<bool, CharmError> {
        User::from_name(name)
            .map(|u| u.is_some())
            .map_err(|e| account_error(name, ProvisionError::Lookup(e)))
    }

    fn status_of(program: &str, cmd: &mut Command, tolerated: &[i32]) -> Result<(), CharmError> {
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CharmError::Spawn {
                program: program.to_string(),
                source,
            })?;
        if output.status.success() || output.status.code().is_some_and(|c| tolerated.contains(&c)) {
            return Ok(());
        }
        Err(CharmError::Command {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn provision_error(path: &Path, source: ProvisionError) -> CharmError {
    CharmError::Provision {
        path: path.to_path_buf(),
        source,
    }
}

fn account_error(user: &str, source: ProvisionError) -> CharmError {
    CharmError::Account {
        user: user.to_string(),
        source,
    }
}

impl SystemHost for LinuxSystem {
    fn add_system_user(&self, user: &SystemUser) -> Result<(), CharmError> {
        if Self::user_exists(&user.name)? {
            tracing::debug!(user = %user.name, "system user exists");
            if !user.secondary_groups.is_empty() {
                let mut cmd = Command::new("usermod");
                cmd.arg("--append")
                    .arg("--groups")
                    .arg(user.secondary_groups.join(","))
                    .arg(&user.name);
                Self::status_of("usermod", &mut cmd, &[])?;
            }
            return Ok(());
        }

        let mut cmd = Command::new("useradd");
        cmd.arg("--system")
            .arg("--create-home")
            .arg("--home-dir")
            .arg(&user.home)
            .arg("--user-group");
        if !user.secondary_groups.is_empty() {
            cmd.arg("--groups").arg(user.secondary_groups.join(","));
        }
        cmd.arg(&user.name);
        Self::status_of("useradd", &mut cmd, &[USERADD_EXISTS])?;
        tracing::info!(user = %user.name, home = %user.home.display(), "created system user");
        Ok(())
    }

    fn run(&self, command: &CommandSpec) -> Result<String, CharmError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        if let Some(name) = &command.user {
            let user = User::from_name(name)
                .map_err(|e| account_error(name, ProvisionError::Lookup(e)))?
                .ok_or_else(|| account_error(name, ProvisionError::UnknownUser(name.clone())))?;
            cmd.uid(user.uid.as_raw())
                .gid(user.gid.as_raw())
                .env("HOME", &user.dir)
                .env("USER", name);
        }

        tracing::debug!(command = %command, user = ?command.user, "running");
        let output = cmd.output().map_err(|source| CharmError::Spawn {
            program: command.program.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(CharmError::Command {
                program: command.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn install_file(&self, source: &Path, dest: &Path, mode: u32) -> Result<(), CharmError> {
        let io_err = |source| CharmError::Io {
            path: dest.to_path_buf(),
            source,
        };
        fs::copy(source, dest).map_err(io_err)?;
        fs::set_permissions(dest, Permissions::from_mode(mode)).map_err(io_err)?;
        tracing::info!(from = %source.display(), to = %dest.display(), "installed file");
        Ok(())
    }

    fn write_file(
        &self,
        dest: &Path,
        contents: &str,
        ownership: &DirectoryOwnership,
    ) -> Result<(), CharmError> {
        fs::write(dest, contents).map_err(|source| CharmError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        fs::set_permissions(dest, Permissions::from_mode(ownership.mode)).map_err(|source| {
            CharmError::Io {
                path: dest.to_path_buf(),
                source,
            }
        })?;

        let user = User::from_name(&ownership.user)
            .map_err(|e| provision_error(dest, ProvisionError::Lookup(e)))?
            .ok_or_else(|| {
                provision_error(dest, ProvisionError::UnknownUser(ownership.user.clone()))
            })?;
        let group = Group::from_name(&ownership.group)
            .map_err(|e| provision_error(dest, ProvisionError::Lookup(e)))?
            .ok_or_else(|| {
                provision_error(dest, ProvisionError::UnknownGroup(ownership.group.clone()))
            })?;
        chown(dest, Some(user.uid), Some(group.gid))
            .map_err(|e| provision_error(dest, ProvisionError::Chown(e)))?;

        tracing::debug!(path = %dest.display(), "wrote file");
        Ok(())
    }

    fn create_dir(&self, path: &Path, ownership: &DirectoryOwnership) -> Result<(), CharmError> {
        OsProvisioner
            .provision(path, ownership)
            .map_err(|source| provision_error(path, source))
    }
}
