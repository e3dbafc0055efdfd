//! Declarative mapping of one external key to one `app.ini` entry.

use std::path::Path;

use crate::error::ConfigError;
use crate::ini::IniDocument;
use crate::provision::{DirectoryOwnership, DirectoryProvisioner};
use crate::snapshot::Snapshot;
use crate::strategy::{AllowList, AllowedParams, Outcome, Strategy};

/// Maps `external_key` in the host configuration to `[section] key`.
///
/// When `provision` is set the option is path-valued: after a non-empty value
/// is written, the directory it names is created with that ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOption {
    pub external_key: String,
    pub section: String,
    pub key: String,
    pub strategy: Strategy,
    pub provision: Option<DirectoryOwnership>,
}

impl ConfigOption {
    pub fn new(external_key: &str, section: &str, key: &str, strategy: Strategy) -> Self {
        Self {
            external_key: external_key.to_string(),
            section: section.to_string(),
            key: key.to_string(),
            strategy,
            provision: None,
        }
    }

    /// Set when present, remove when unset.
    pub fn direct(external_key: &str, section: &str, key: &str) -> Self {
        Self::new(external_key, section, key, Strategy::NonEmptyOrRemove)
    }

    /// Must match one of `allowed` when set; removed when unset.
    pub fn allowed(external_key: &str, section: &str, key: &str, allowed: AllowList) -> Self {
        Self::new(
            external_key,
            section,
            key,
            Strategy::AllowedList(AllowedParams::new(allowed)),
        )
    }

    /// Comma-separated list whose items must each match one of `allowed`.
    pub fn multi_allowed(
        external_key: &str,
        section: &str,
        key: &str,
        allowed: AllowList,
    ) -> Self {
        Self::new(
            external_key,
            section,
            key,
            Strategy::MultiAllowedList(AllowedParams::new(allowed)),
        )
    }

    /// A directory path: set or removed like [`direct`](Self::direct), and the
    /// directory is provisioned with `ownership` when set.
    pub fn path(
        external_key: &str,
        section: &str,
        key: &str,
        ownership: DirectoryOwnership,
    ) -> Self {
        Self {
            provision: Some(ownership),
            ..Self::direct(external_key, section, key)
        }
    }

    /// Apply this option's value from `snapshot` to `doc`.
    ///
    /// Validation failures become [`ConfigError::InvalidConfigValue`] naming
    /// the external key. Provisioning failures are returned as
    /// [`ConfigError::Provision`] and are not rolled back.
    pub fn apply(
        &self,
        doc: &mut IniDocument,
        snapshot: &Snapshot,
        provisioner: &dyn DirectoryProvisioner,
    ) -> Result<Outcome, ConfigError> {
        let raw = snapshot.get(&self.external_key);
        let outcome = self.strategy.evaluate(raw.as_deref()).map_err(|cause| {
            tracing::warn!(key = %self.external_key, %cause, "rejected config value");
            ConfigError::InvalidConfigValue {
                key: self.external_key.clone(),
                cause,
            }
        })?;

        doc.ensure_section(&self.section);
        match &outcome {
            Outcome::Set(value) => {
                doc.set(&self.section, &self.key, value)?;
                tracing::debug!(section = %self.section, key = %self.key, "set");
            }
            Outcome::Remove => {
                if doc.remove(&self.section, &self.key)? {
                    tracing::debug!(section = %self.section, key = %self.key, "removed");
                }
            }
        }

        if let (Some(ownership), Outcome::Set(value)) = (&self.provision, &outcome)
            && !value.is_empty()
        {
            let path = Path::new(value);
            provisioner
                .provision(path, ownership)
                .map_err(|source| ConfigError::Provision {
                    path: path.to_path_buf(),
                    source,
                })?;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyError;
    use crate::fixtures::test::RecordingProvisioner;
    use std::error::Error as _;

    #[test]
    fn set_creates_section() {
        let mut doc = IniDocument::new();
        let opt = ConfigOption::direct("gitea-server-http-port", "server", "HTTP_PORT");
        let snap = Snapshot::new().with("gitea-server-http-port", "3000");
        opt.apply(&mut doc, &snap, &RecordingProvisioner::default())
            .unwrap();
        assert_eq!(doc.get("server", "HTTP_PORT"), Some("3000"));
    }

    #[test]
    fn unset_removes_stale_value() {
        let mut doc = IniDocument::parse("[server]\nDOMAIN = old.example\n").unwrap();
        let opt = ConfigOption::direct("gitea-server-domain", "server", "DOMAIN");
        let outcome = opt
            .apply(&mut doc, &Snapshot::new(), &RecordingProvisioner::default())
            .unwrap();
        assert_eq!(outcome, Outcome::Remove);
        assert_eq!(doc.get("server", "DOMAIN"), None);
    }

    #[test]
    fn remove_from_fresh_section_is_noop() {
        let mut doc = IniDocument::new();
        let opt = ConfigOption::direct("gitea-ui-themes", "ui", "THEMES");
        opt.apply(&mut doc, &Snapshot::new(), &RecordingProvisioner::default())
            .unwrap();
        assert!(doc.has_section("ui"));
        assert_eq!(doc.keys("ui").unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn invalid_value_names_external_key() {
        let mut doc = IniDocument::new();
        let opt = ConfigOption::allowed(
            "gitea-server-protocol",
            "server",
            "PROTOCOL",
            AllowList::literals(&["http", "https"]),
        );
        let snap = Snapshot::new().with("gitea-server-protocol", "ftp");
        let err = opt
            .apply(&mut doc, &snap, &RecordingProvisioner::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "value for 'gitea-server-protocol' is invalid");
        assert!(err.source().unwrap().to_string().contains("ftp"));
        assert!(!doc.has_section("server"));
    }

    #[test]
    fn multi_value_error_carries_token() {
        let mut doc = IniDocument::new();
        let opt = ConfigOption::multi_allowed(
            "units",
            "repository",
            "DISABLED_REPO_UNITS",
            AllowList::literals(&["a", "b", "c"]),
        );
        let err = opt
            .apply(
                &mut doc,
                &Snapshot::new().with("units", "a,z"),
                &RecordingProvisioner::default(),
            )
            .unwrap_err();
        match err {
            ConfigError::InvalidConfigValue {
                cause: StrategyError::TokenNotAllowed { token, .. },
                ..
            } => assert_eq!(token, "z"),
            other => panic!("Expected InvalidConfigValue, got {other:?}"),
        }
    }

    #[test]
    fn path_option_provisions_when_set() {
        let mut doc = IniDocument::new();
        let opt = ConfigOption::path(
            "gitea-repository-root",
            "repository",
            "ROOT",
            DirectoryOwnership::default(),
        );
        let provisioner = RecordingProvisioner::default();
        let snap = Snapshot::new().with("gitea-repository-root", "/srv/git/repos");
        opt.apply(&mut doc, &snap, &provisioner).unwrap();
        assert_eq!(doc.get("repository", "ROOT"), Some("/srv/git/repos"));
        assert_eq!(
            provisioner.paths(),
            vec![std::path::PathBuf::from("/srv/git/repos")]
        );
    }

    #[test]
    fn path_option_skips_provisioning_when_unset() {
        let mut doc = IniDocument::new();
        let opt = ConfigOption::path(
            "gitea-attachment-path",
            "attachment",
            "PATH",
            DirectoryOwnership::default(),
        );
        let provisioner = RecordingProvisioner::default();
        opt.apply(&mut doc, &Snapshot::new(), &provisioner).unwrap();
        assert!(provisioner.paths().is_empty());
    }

    #[test]
    fn provisioning_failure_propagates_raw() {
        let mut doc = IniDocument::new();
        let opt = ConfigOption::path(
            "gitea-packages-path",
            "packages",
            "PATH",
            DirectoryOwnership::default(),
        );
        let provisioner = RecordingProvisioner::failing();
        let snap = Snapshot::new().with("gitea-packages-path", "/data/packages");
        let err = opt.apply(&mut doc, &snap, &provisioner).unwrap_err();
        assert!(matches!(err, ConfigError::Provision { .. }));
        // the ini mutation happened before provisioning
        assert_eq!(doc.get("packages", "PATH"), Some("/data/packages"));
    }
}
