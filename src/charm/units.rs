//! Rendered systemd units and the seed `app.ini`.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::ini::{DEFAULT_SECTION, IniDocument};
use crate::settings::{GiteaSettings, RunnerSettings};

pub const SYSTEMD_DIR: &str = "/etc/systemd/system";

/// Where the unit file for `service` lives.
pub fn unit_path(service: &str) -> PathBuf {
    Path::new(SYSTEMD_DIR).join(format!("{service}.service"))
}

pub fn gitea_unit(settings: &GiteaSettings, group: &str) -> String {
    let work_dir = settings.work_dir.display();
    format!(
        "[Unit]
Description=Gitea (Git with a cup of tea)
After=syslog.target
After=network.target

[Service]
Type=simple
RestartSec=2s
User={user}
Group={group}
WorkingDirectory={work_dir}/
ExecStart={binary} web --config {app_ini}
Restart=always
Environment=USER={user} HOME={home} GITEA_WORK_DIR={work_dir}

[Install]
WantedBy=multi-user.target
",
        user = settings.user,
        home = settings.home.display(),
        binary = settings.binary.display(),
        app_ini = settings.app_ini.display(),
    )
}

pub fn runner_unit(settings: &RunnerSettings) -> String {
    format!(
        "[Unit]
Description=Gitea Actions runner
Documentation=https://gitea.com/gitea/act_runner
After=docker.service

[Service]
ExecStart={binary} daemon --config {config}
ExecReload=/bin/kill -s HUP $MAINPID
WorkingDirectory={state_dir}
TimeoutSec=0
RestartSec=10
Restart=always
User={user}

[Install]
WantedBy=multi-user.target
",
        binary = settings.binary.display(),
        config = settings.config_file().display(),
        state_dir = settings.state_dir.display(),
        user = settings.user,
    )
}

/// The `app.ini` written at install time, before any charm config or
/// database credentials are known.
pub fn seed_app_ini(settings: &GiteaSettings) -> Result<IniDocument, ConfigError> {
    let work_dir = settings.work_dir.display().to_string();
    let mut doc = IniDocument::new();
    doc.set(DEFAULT_SECTION, "RUN_USER", &settings.user)?;
    doc.set(DEFAULT_SECTION, "RUN_MODE", "prod")?;
    doc.set(DEFAULT_SECTION, "WORK_PATH", &work_dir)?;

    doc.ensure_section("server");
    doc.set("server", "HTTP_PORT", &settings.http_port.to_string())?;
    doc.set("server", "APP_DATA_PATH", &format!("{work_dir}/data"))?;

    doc.ensure_section("database");
    doc.set("database", "DB_TYPE", crate::document::DB_TYPE)?;

    doc.ensure_section("log");
    doc.set("log", "ROOT_PATH", &format!("{work_dir}/log"))?;

    doc.ensure_section("security");
    doc.set("security", "INSTALL_LOCK", "true")?;
    Ok(doc)
}
