//! Directory provisioning for path-valued options.
//!
//! [`OsProvisioner`] creates the directory (and missing parents), then sets
//! the configured owner and mode on the leaf. Everything is idempotent: an
//! existing directory is simply re-owned and re-moded.

use std::fs::{self, DirBuilder, Permissions};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::Path;

use nix::unistd::{Group, User, chown};

use crate::error::ProvisionError;

/// Owner and mode applied to a provisioned directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryOwnership {
    pub user: String,
    pub group: String,
    pub mode: u32,
}

impl DirectoryOwnership {
    pub fn new(user: &str, group: &str, mode: u32) -> Self {
        Self {
            user: user.to_string(),
            group: group.to_string(),
            mode,
        }
    }

    /// Parse an `owner` in `user:group` form. A bare `user` uses the group of
    /// the same name.
    pub fn from_owner(owner: &str, mode: u32) -> Self {
        match owner.split_once(':') {
            Some((user, group)) => Self::new(user, group, mode),
            None => Self::new(owner, owner, mode),
        }
    }
}

impl Default for DirectoryOwnership {
    fn default() -> Self {
        Self::new("git", "git", 0o750)
    }
}

/// Makes sure a directory exists with the given ownership.
pub trait DirectoryProvisioner {
    fn provision(&self, path: &Path, ownership: &DirectoryOwnership)
    -> Result<(), ProvisionError>;
}

/// Provisions directories on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProvisioner;

impl DirectoryProvisioner for OsProvisioner {
    fn provision(
        &self,
        path: &Path,
        ownership: &DirectoryOwnership,
    ) -> Result<(), ProvisionError> {
        DirBuilder::new()
            .recursive(true)
            .mode(ownership.mode)
            .create(path)
            .map_err(ProvisionError::CreateDir)?;

        let user = User::from_name(&ownership.user)
            .map_err(ProvisionError::Lookup)?
            .ok_or_else(|| ProvisionError::UnknownUser(ownership.user.clone()))?;
        let group = Group::from_name(&ownership.group)
            .map_err(ProvisionError::Lookup)?
            .ok_or_else(|| ProvisionError::UnknownGroup(ownership.group.clone()))?;

        chown(path, Some(user.uid), Some(group.gid)).map_err(ProvisionError::Chown)?;
        // DirBuilder's mode is filtered by the umask.
        fs::set_permissions(path, Permissions::from_mode(ownership.mode))
            .map_err(ProvisionError::Chmod)?;

        tracing::debug!(
            path = %path.display(),
            owner = %format!("{}:{}", ownership.user, ownership.group),
            mode = %format!("{:o}", ownership.mode),
            "provisioned directory"
        );
        Ok(())
    }
}

/// Leaves the filesystem alone. Used when rendering a config for a host the
/// caller does not own.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipProvisioner;

impl DirectoryProvisioner for SkipProvisioner {
    fn provision(
        &self,
        path: &Path,
        _ownership: &DirectoryOwnership,
    ) -> Result<(), ProvisionError> {
        tracing::debug!(path = %path.display(), "skipping directory provisioning");
        Ok(())
    }
}
