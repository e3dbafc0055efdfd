//! `GiteaConfig`: the managed `app.ini` file and the options projected onto it.
//!
//! The lifecycle is `load → apply → save`:
//!
//! - [`load`](GiteaConfig::load) re-reads the file into a fresh in-memory
//!   store, discarding unsaved changes. Gitea strips the leading `[DEFAULT]`
//!   marker when it rewrites the file itself, so a missing marker is put back
//!   (and written to disk) before parsing.
//! - [`apply`](GiteaConfig::apply) runs every option in declaration order and
//!   stops at the first failure. Earlier mutations stay in memory only.
//! - [`save`](GiteaConfig::save) rewrites the whole file from memory.
//!
//! Nothing reaches disk between `load` and `save` except directories
//! provisioned by path options.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::ini::{DEFAULT_MARKER, IniDocument};
use crate::option::ConfigOption;
use crate::provision::{DirectoryOwnership, DirectoryProvisioner, OsProvisioner};
use crate::snapshot::Snapshot;
use crate::table::gitea_options;

/// Database engine written by [`GiteaConfig::set_database_config`].
pub const DB_TYPE: &str = "postgres";
/// Database name requested from the database provider.
pub const DB_NAME: &str = "giteadb";

pub struct GiteaConfig {
    path: PathBuf,
    ini: Option<IniDocument>,
    options: Vec<ConfigOption>,
    provisioner: Box<dyn DirectoryProvisioner>,
}

impl GiteaConfig {
    /// The standard Gitea option table, provisioning directories as `git:git`
    /// with mode `0750`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::with_ownership(path, &DirectoryOwnership::default())
    }

    /// The standard Gitea option table with custom directory ownership.
    pub fn with_ownership(
        path: impl Into<PathBuf>,
        ownership: &DirectoryOwnership,
    ) -> Result<Self, ConfigError> {
        Ok(Self::with_options(path, gitea_options(ownership)?, OsProvisioner))
    }

    /// A document with an explicit option table and provisioner.
    pub fn with_options(
        path: impl Into<PathBuf>,
        options: Vec<ConfigOption>,
        provisioner: impl DirectoryProvisioner + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            ini: None,
            options,
            provisioner: Box::new(provisioner),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    pub fn is_loaded(&self) -> bool {
        self.ini.is_some()
    }

    /// The in-memory store, if loaded.
    pub fn document(&self) -> Option<&IniDocument> {
        self.ini.as_ref()
    }

    /// Read the file into a fresh store.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        self.read(true)
    }

    /// Like [`load`](Self::load), but never touches the file: a missing
    /// marker is restored in memory only.
    pub fn load_read_only(&mut self) -> Result<(), ConfigError> {
        self.read(false)
    }

    fn read(&mut self, repair_file: bool) -> Result<(), ConfigError> {
        let mut text = fs::read_to_string(&self.path).map_err(|source| self.file_error(source))?;

        if text.lines().next().map(str::trim_end) != Some(DEFAULT_MARKER) {
            text.insert_str(0, &format!("{DEFAULT_MARKER}\n"));
            if repair_file {
                fs::write(&self.path, &text).map_err(|source| self.file_error(source))?;
                tracing::info!(path = %self.path.display(), "restored missing [DEFAULT] marker");
            }
        }

        let doc = IniDocument::parse(&text).map_err(|e| ConfigError::Parse {
            path: self.path.clone(),
            line: e.line,
            reason: e.reason,
        })?;
        self.ini = Some(doc);
        tracing::debug!(path = %self.path.display(), "loaded");
        Ok(())
    }

    /// Apply every option to the in-memory store, stopping at the first error.
    pub fn apply(&mut self, snapshot: &Snapshot) -> Result<(), ConfigError> {
        let ini = self.ini.as_mut().ok_or_else(|| ConfigError::NotLoaded {
            path: self.path.clone(),
        })?;
        for option in &self.options {
            option.apply(ini, snapshot, self.provisioner.as_ref())?;
        }
        tracing::info!(options = self.options.len(), "applied configuration");
        Ok(())
    }

    /// Write the whole in-memory store to the file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let ini = self.loaded()?;
        fs::write(&self.path, ini.to_string()).map_err(|source| self.file_error(source))?;
        tracing::debug!(path = %self.path.display(), "saved");
        Ok(())
    }

    pub fn ensure_section(&mut self, section: &str) -> Result<(), ConfigError> {
        self.loaded_mut()?.ensure_section(section);
        Ok(())
    }

    pub fn set(&mut self, section: &str, key: &str, value: &str) -> Result<(), ConfigError> {
        self.loaded_mut()?.set(section, key, value)
    }

    /// Remove a key. Returns whether it was present.
    pub fn remove(&mut self, section: &str, key: &str) -> Result<bool, ConfigError> {
        self.loaded_mut()?.remove(section, key)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.ini.as_ref()?.get(section, key)
    }

    /// Write the `[database]` connection settings. These come from the
    /// database relation, not from operator config, and skip validation.
    pub fn set_database_config(
        &mut self,
        username: &str,
        password: &str,
        host: &str,
    ) -> Result<(), ConfigError> {
        let ini = self.loaded_mut()?;
        ini.ensure_section("database");
        ini.set("database", "DB_TYPE", DB_TYPE)?;
        ini.set("database", "SCHEMA", "")?;
        ini.set("database", "NAME", DB_NAME)?;
        ini.set("database", "USER", username)?;
        ini.set("database", "PASSWD", password)?;
        ini.set("database", "HOST", host)?;
        tracing::info!(%host, user = %username, "database settings updated");
        Ok(())
    }

    fn loaded(&self) -> Result<&IniDocument, ConfigError> {
        self.ini.as_ref().ok_or_else(|| ConfigError::NotLoaded {
            path: self.path.clone(),
        })
    }

    fn loaded_mut(&mut self) -> Result<&mut IniDocument, ConfigError> {
        self.ini.as_mut().ok_or_else(|| ConfigError::NotLoaded {
            path: self.path.clone(),
        })
    }

    fn file_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::ConfigFile {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{RecordingProvisioner, write_app_ini};
    use crate::strategy::AllowList;
    use tempfile::TempDir;

    fn standard(dir: &TempDir, content: &str) -> GiteaConfig {
        let path = write_app_ini(dir, content);
        GiteaConfig::with_options(
            path,
            gitea_options(&DirectoryOwnership::default()).unwrap(),
            RecordingProvisioner::default(),
        )
    }

    fn two_options(dir: &TempDir, content: &str) -> GiteaConfig {
        let path = write_app_ini(dir, content);
        GiteaConfig::with_options(
            path,
            vec![
                ConfigOption::direct("first", "server", "DOMAIN"),
                ConfigOption::allowed(
                    "second",
                    "server",
                    "PROTOCOL",
                    AllowList::literals(&["http", "https"]),
                ),
            ],
            RecordingProvisioner::default(),
        )
    }

    fn minimal_snapshot() -> Snapshot {
        Snapshot::new()
            .with("gitea-app-name", "Gitea")
            .with("gitea-log-mode", "console")
            .with("gitea-log-level", "Info")
    }

    #[test]
    fn load_save_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let original = "[DEFAULT]\nAPP_NAME = Gitea\nRUN_USER = git\n\n\
                        [server]\nHTTP_PORT = 3000\n\n\
                        [database]\nDB_TYPE = postgres\n\n";
        let mut config = standard(&dir, original);
        config.load().unwrap();
        config.save().unwrap();
        assert_eq!(fs::read_to_string(config.path()).unwrap(), original);
    }

    #[test]
    fn missing_marker_is_injected_and_persisted() {
        let dir = TempDir::new().unwrap();
        let mut config = standard(&dir, "APP_NAME = Gitea\n\n[server]\nHTTP_PORT = 3000\n");
        config.load().unwrap();
        assert_eq!(config.get("DEFAULT", "APP_NAME"), Some("Gitea"));
        assert_eq!(config.get("server", "HTTP_PORT"), Some("3000"));
        let on_disk = fs::read_to_string(config.path()).unwrap();
        assert!(on_disk.starts_with("[DEFAULT]\nAPP_NAME = Gitea\n"));
    }

    #[test]
    fn read_only_load_restores_marker_in_memory_only() {
        let dir = TempDir::new().unwrap();
        let original = "APP_NAME = Gitea\n\n[server]\nHTTP_PORT = 3000\n";
        let mut config = standard(&dir, original);
        config.load_read_only().unwrap();
        assert_eq!(config.get("DEFAULT", "APP_NAME"), Some("Gitea"));
        assert_eq!(fs::read_to_string(config.path()).unwrap(), original);
    }

    #[test]
    fn present_marker_is_untouched() {
        let dir = TempDir::new().unwrap();
        let original = "[DEFAULT]\n[server]\nHTTP_PORT = 3000\n";
        let mut config = standard(&dir, original);
        config.load().unwrap();
        assert_eq!(fs::read_to_string(config.path()).unwrap(), original);
    }

    #[test]
    fn empty_file_gets_marker() {
        let dir = TempDir::new().unwrap();
        let mut config = standard(&dir, "");
        config.load().unwrap();
        assert_eq!(fs::read_to_string(config.path()).unwrap(), "[DEFAULT]\n");
        config.save().unwrap();
        assert_eq!(fs::read_to_string(config.path()).unwrap(), "[DEFAULT]\n\n");
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let mut config = GiteaConfig::new(dir.path().join("absent.ini")).unwrap();
        assert!(matches!(config.load(), Err(ConfigError::ConfigFile { .. })));
    }

    #[test]
    fn load_malformed_file_reports_line() {
        let dir = TempDir::new().unwrap();
        let mut config = standard(&dir, "[DEFAULT]\n[a]\nX = 1\n[a]\n");
        match config.load() {
            Err(ConfigError::Parse { line, .. }) => assert_eq!(line, 4),
            other => panic!("Expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn operations_before_load_fail() {
        let dir = TempDir::new().unwrap();
        let mut config = standard(&dir, "");
        assert!(matches!(
            config.apply(&Snapshot::new()),
            Err(ConfigError::NotLoaded { .. })
        ));
        assert!(matches!(config.save(), Err(ConfigError::NotLoaded { .. })));
        assert!(matches!(
            config.set("server", "A", "b"),
            Err(ConfigError::NotLoaded { .. })
        ));
    }

    #[test]
    fn load_discards_unsaved_mutations() {
        let dir = TempDir::new().unwrap();
        let mut config = standard(&dir, "[DEFAULT]\n[server]\nHTTP_PORT = 3000\n");
        config.load().unwrap();
        config.set("server", "HTTP_PORT", "4000").unwrap();
        config.load().unwrap();
        assert_eq!(config.get("server", "HTTP_PORT"), Some("3000"));
    }

    #[test]
    fn set_requires_ensured_section() {
        let dir = TempDir::new().unwrap();
        let mut config = standard(&dir, "");
        config.load().unwrap();
        assert!(matches!(
            config.set("mailer", "FROM", "gitea@example.com"),
            Err(ConfigError::SectionNotFound { .. })
        ));
        config.ensure_section("mailer").unwrap();
        config.set("mailer", "FROM", "gitea@example.com").unwrap();
        assert!(config.remove("mailer", "FROM").unwrap());
    }

    #[test]
    fn end_to_end_server_section() {
        let dir = TempDir::new().unwrap();
        let path = write_app_ini(&dir, "");
        let mut config = GiteaConfig::with_options(
            &path,
            vec![
                ConfigOption::direct("gitea-server-http-port", "server", "HTTP_PORT"),
                ConfigOption::allowed(
                    "gitea-server-protocol",
                    "server",
                    "PROTOCOL",
                    AllowList::literals(&["http", "https"]),
                ),
            ],
            RecordingProvisioner::default(),
        );
        config.load().unwrap();
        config
            .apply(
                &Snapshot::new()
                    .with("gitea-server-http-port", "3000")
                    .with("gitea-server-protocol", "https"),
            )
            .unwrap();
        config.save().unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("[DEFAULT]\n"));
        assert!(written.contains("[server]\nHTTP_PORT = 3000\nPROTOCOL = https\n"));
    }

    #[test]
    fn end_to_end_with_full_table() {
        let dir = TempDir::new().unwrap();
        let mut config = standard(&dir, "");
        config.load().unwrap();
        config
            .apply(
                &minimal_snapshot()
                    .with("gitea-server-http-port", 3000)
                    .with("gitea-server-protocol", "https"),
            )
            .unwrap();
        config.save().unwrap();
        let written = fs::read_to_string(config.path()).unwrap();
        assert!(written.starts_with("[DEFAULT]\nAPP_NAME = Gitea\n"));
        assert!(written.contains("[server]\nHTTP_PORT = 3000\nPROTOCOL = https\n"));
        assert!(written.contains("[log]\nMODE = console\nLEVEL = Info\n"));
    }

    #[test]
    fn full_table_requires_app_name() {
        let dir = TempDir::new().unwrap();
        let mut config = standard(&dir, "");
        config.load().unwrap();
        let err = config.apply(&Snapshot::new()).unwrap_err();
        assert_eq!(err.to_string(), "value for 'gitea-app-name' is invalid");
    }

    #[test]
    fn remove_on_empty_drops_key() {
        let dir = TempDir::new().unwrap();
        let mut config = two_options(&dir, "[DEFAULT]\n[server]\nDOMAIN = foo\n");
        config.load().unwrap();
        config.apply(&Snapshot::new()).unwrap();
        assert_eq!(config.get("server", "DOMAIN"), None);
        config.save().unwrap();
        assert!(!fs::read_to_string(config.path()).unwrap().contains("DOMAIN"));
    }

    #[test]
    fn first_failure_aborts_and_save_is_the_durability_boundary() {
        let dir = TempDir::new().unwrap();
        let mut config = two_options(&dir, "[DEFAULT]\n[server]\nDOMAIN = old.example\n");
        config.load().unwrap();

        let snap = Snapshot::new()
            .with("first", "new.example")
            .with("second", "ftp");
        assert!(matches!(
            config.apply(&snap),
            Err(ConfigError::InvalidConfigValue { ref key, .. }) if key == "second"
        ));
        // partial application is visible in memory
        assert_eq!(config.get("server", "DOMAIN"), Some("new.example"));

        // the caller does not save; a fresh load shows the original value
        config.load().unwrap();
        assert_eq!(config.get("server", "DOMAIN"), Some("old.example"));
    }

    #[test]
    fn database_config_bypasses_options() {
        let dir = TempDir::new().unwrap();
        let path = write_app_ini(&dir, "");
        let mut config =
            GiteaConfig::with_options(&path, Vec::new(), RecordingProvisioner::default());
        config.load().unwrap();
        config
            .set_database_config("svcuser", "s3cr3t", "db-0:5432")
            .unwrap();
        assert_eq!(config.get("database", "DB_TYPE"), Some("postgres"));
        assert_eq!(config.get("database", "SCHEMA"), Some(""));
        assert_eq!(config.get("database", "NAME"), Some("giteadb"));
        assert_eq!(config.get("database", "USER"), Some("svcuser"));
        assert_eq!(config.get("database", "PASSWD"), Some("s3cr3t"));
        assert_eq!(config.get("database", "HOST"), Some("db-0:5432"));
    }

    #[test]
    fn path_options_provision_even_when_a_later_option_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_app_ini(&dir, "");
        let provisioner = RecordingProvisioner::default();
        let mut config = GiteaConfig::with_options(
            &path,
            vec![
                ConfigOption::path(
                    "gitea-repository-root",
                    "repository",
                    "ROOT",
                    DirectoryOwnership::default(),
                ),
                ConfigOption::new(
                    "gitea-app-name",
                    "default",
                    "APP_NAME",
                    crate::strategy::Strategy::NonEmpty,
                ),
            ],
            provisioner.clone(),
        );
        config.load().unwrap();
        let snap = Snapshot::new().with("gitea-repository-root", "/srv/git");
        assert!(config.apply(&snap).is_err());
        assert_eq!(provisioner.paths(), vec![PathBuf::from("/srv/git")]);
    }
}
