//! The Gitea option table: every charm config key the charm manages in
//! `app.ini`, in the order it is applied.
//!
//! Keys not listed here are left alone, so operators can still hand-edit
//! the rest of the file.

use crate::error::ConfigError;
use crate::option::ConfigOption;
use crate::provision::DirectoryOwnership;
use crate::strategy::{AllowList, AllowedParams, Strategy};

pub const LOG_LEVELS: &[&str] = &[
    "Trace", "Debug", "Info", "Warn", "Error", "Critical", "Fatal", "None",
];

pub const PASSWORD_HASH_ALGOS: &[&str] = &[
    "argon2",
    "pbkdf2",
    "pbkdf2_v1",
    "pbkdf2_hi",
    "scrypt",
    "bcrypt",
];

pub const REPO_UNITS: &[&str] = &[
    "repo.code",
    "repo.releases",
    "repo.issues",
    "repo.ext_issues",
    "repo.pulls",
    "repo.wiki",
    "repo.ext_wiki",
    "repo.projects",
    "repo.packages",
    "repo.actions",
];

pub const STORAGE_TYPES: &[&str] = &["local", "minio"];

pub const PROTOCOLS: &[&str] = &["http", "https", "http+unix", "fcgi", "fcgi+unix"];

pub const LOG_MODES: &[&str] = &["console", "file", "conn"];

pub const TRUST_MODELS: &[&str] = &["collaborator", "committer", "collaboratorcommitter"];

pub const ACTIONS_URLS: &[&str] = &["self", "github"];

/// A size such as `500`, `10 GiB` or `512MB`.
pub const SIZE_PATTERN: &str = r"[0-9]+\s?(|(K|M|G|T|P)i?B)";

/// Build the full option table. Path options provision their directories
/// with `ownership`.
pub fn gitea_options(ownership: &DirectoryOwnership) -> Result<Vec<ConfigOption>, ConfigError> {
    use ConfigOption as O;

    const OWNER_SIZE_KEY: &str = "gitea-packages-limit-total-owner-size";
    let sizes = AllowList::regexes(&[SIZE_PATTERN]).map_err(|source| {
        ConfigError::InvalidPattern {
            key: OWNER_SIZE_KEY.to_string(),
            source,
        }
    })?;

    let path = |external: &str, section: &str, key: &str| {
        O::path(external, section, key, ownership.clone())
    };

    Ok(vec![
        // [DEFAULT]
        O::new("gitea-app-name", "default", "APP_NAME", Strategy::NonEmpty),
        // [server]
        O::direct("gitea-server-http-port", "server", "HTTP_PORT"),
        O::allowed(
            "gitea-server-protocol",
            "server",
            "PROTOCOL",
            AllowList::literals(PROTOCOLS),
        ),
        O::direct("gitea-server-domain", "server", "DOMAIN"),
        O::direct("gitea-server-root-url", "server", "ROOT_URL"),
        O::direct("gitea-server-static-url-prefix", "server", "STATIC_URL_PREFIX"),
        O::direct("gitea-server-ssh-domain", "server", "SSH_DOMAIN"),
        // [security]
        O::allowed(
            "gitea-security-password-hash-algo",
            "security",
            "PASSWORD_HASH_ALGO",
            AllowList::literals(PASSWORD_HASH_ALGOS),
        ),
        // [oauth2]
        O::direct("gitea-oauth2-enable", "oauth2", "ENABLE"),
        // [log]
        O::new(
            "gitea-log-mode",
            "log",
            "MODE",
            Strategy::MultiAllowedList(
                AllowedParams::new(AllowList::literals(LOG_MODES)).required(),
            ),
        ),
        O::new(
            "gitea-log-level",
            "log",
            "LEVEL",
            Strategy::AllowedList(AllowedParams::new(AllowList::literals(LOG_LEVELS)).required()),
        ),
        O::allowed(
            "gitea-log-logger-router-mode",
            "log",
            "logger.router.MODE",
            AllowList::literals(LOG_LEVELS),
        ),
        // [git.timeout]
        O::direct("gitea-git-timeout-default", "git.timeout", "DEFAULT"),
        O::direct("gitea-git-timeout-clone", "git.timeout", "CLONE"),
        O::direct("gitea-git-timeout-pull", "git.timeout", "PULL"),
        O::direct("gitea-git-timeout-gc", "git.timeout", "GC"),
        // [service]
        O::direct("gitea-service-register-email-confirm", "service", "REGISTER_EMAIL_CONFIRM"),
        O::direct("gitea-service-email-domain-allowlist", "service", "EMAIL_DOMAIN_ALLOWLIST"),
        O::direct(
            "gitea-service-allow-only-external-registration",
            "service",
            "ALLOW_ONLY_EXTERNAL_REGISTRATION",
        ),
        O::direct("gitea-service-enable-notify-mail", "service", "ENABLE_NOTIFY_MAIL"),
        O::direct("gitea-service-enable-timetracking", "service", "ENABLE_TIMETRACKING"),
        O::direct(
            "gitea-service-show-registration-button",
            "service",
            "SHOW_REGISTRATION_BUTTON",
        ),
        O::direct(
            "gitea-service-show-milestones-dashboard-page",
            "service",
            "SHOW_MILESTONES_DASHBOARD_PAGE",
        ),
        // [repository]
        path("gitea-repository-root", "repository", "ROOT"),
        O::direct("gitea-repository-max-creation-limit", "repository", "MAX_CREATION_LIMIT"),
        O::direct("gitea-repository-disable-http-git", "repository", "DISABLE_HTTP_GIT"),
        O::multi_allowed(
            "gitea-repository-disabled-repo-units",
            "repository",
            "DISABLED_REPO_UNITS",
            AllowList::literals(REPO_UNITS),
        ),
        O::multi_allowed(
            "gitea-repository-default-repo-units",
            "repository",
            "DEFAULT_REPO_UNITS",
            AllowList::literals(REPO_UNITS),
        ),
        O::direct(
            "gitea-repository-allow-adoption-of-unadopted-repositories",
            "repository",
            "ALLOW_ADOPTION_OF_UNADOPTED_REPOSITORIES",
        ),
        // [repository.upload]
        O::direct(
            "gitea-repository-upload-file-max-size",
            "repository.upload",
            "UPLOAD_FILE_MAX_SIZE",
        ),
        // [repository.pull-request]
        O::direct(
            "gitea-repository-pull-request-default-merge-style",
            "repository.pull-request",
            "DEFAULT_MERGE_STYLE",
        ),
        O::direct(
            "gitea-repository-pull-request-default-merge-message-official-approvers-only",
            "repository.pull-request",
            "DEFAULT_MERGE_MESSAGE_OFFICIAL_APPROVERS_ONLY",
        ),
        O::direct(
            "gitea-repository-pull-request-approver-trailer-token",
            "repository.pull-request",
            "APPROVER_TRAILER_TOKEN",
        ),
        O::direct(
            "gitea-repository-pull-request-append-attestation-trailers",
            "repository.pull-request",
            "APPEND_ATTESTATION_TRAILERS",
        ),
        // [repository.signing]
        O::allowed(
            "gitea-repository-signing-default-trust-model",
            "repository.signing",
            "DEFAULT_TRUST_MODEL",
            AllowList::literals(TRUST_MODELS),
        ),
        // [ui]
        O::direct("gitea-ui-themes", "ui", "THEMES"),
        O::direct("gitea-ui-author", "ui", "AUTHOR"),
        O::direct("gitea-ui-description", "ui", "DESCRIPTION"),
        O::direct("gitea-ui-keywords", "ui", "KEYWORDS"),
        // [admin]
        O::direct(
            "gitea-admin-disable-regular-org-creation",
            "admin",
            "DISABLE_REGULAR_ORG_CREATION",
        ),
        // [openid]
        O::direct("gitea-openid-enable-openid-signin", "openid", "ENABLE_OPENID_SIGNIN"),
        O::direct("gitea-openid-enable-openid-signup", "openid", "ENABLE_OPENID_SIGNUP"),
        O::direct("gitea-openid-whitelisted-uris", "openid", "WHITELISTED_URIS"),
        // [webhook]
        O::direct("gitea-webhook-allowed-host-list", "webhook", "ALLOWED_HOST_LIST"),
        // [mailer]
        O::direct("gitea-mailer-enabled", "mailer", "ENABLED"),
        O::direct("gitea-mailer-smtp-addr", "mailer", "SMTP_ADDR"),
        O::direct("gitea-mailer-smtp-port", "mailer", "SMTP_PORT"),
        O::direct("gitea-mailer-from", "mailer", "FROM"),
        O::direct("gitea-mailer-user", "mailer", "USER"),
        O::direct("gitea-mailer-passwd", "mailer", "PASSWD"),
        O::direct("gitea-mailer-send-as-plain-text", "mailer", "SEND_AS_PLAIN_TEXT"),
        // [session]
        O::direct("gitea-session-provider", "session", "PROVIDER"),
        // [picture]
        path("gitea-picture-avatar-upload-path", "picture", "AVATAR_UPLOAD_PATH"),
        path(
            "gitea-picture-repository-avatar-upload-path",
            "picture",
            "REPOSITORY_AVATAR_UPLOAD_PATH",
        ),
        // [attachment]
        O::direct("gitea-attachment-enabled", "attachment", "ENABLED"),
        path("gitea-attachment-path", "attachment", "PATH"),
        // [cron.*]
        O::direct(
            "gitea-cron-repo-health-check-enabled",
            "cron.repo_health_check",
            "ENABLED",
        ),
        O::direct("gitea-cron-update-checker-enabled", "cron.update_checker", "ENABLED"),
        // [metrics]
        O::direct("gitea-metrics-enabled", "metrics", "ENABLED"),
        O::direct("gitea-metrics-token", "metrics", "TOKEN"),
        O::direct("gitea-metrics-enabled-issue-by-label", "metrics", "ENABLED_ISSUE_BY_LABEL"),
        O::direct(
            "gitea-metrics-enabled-issue-by-repository",
            "metrics",
            "ENABLED_ISSUE_BY_REPOSITORY",
        ),
        // [packages]
        O::direct("gitea-packages-enabled", "packages", "ENABLED"),
        path("gitea-packages-path", "packages", "PATH"),
        O::direct(
            "gitea-packages-limit-total-owner-count",
            "packages",
            "LIMIT_TOTAL_OWNER_COUNT",
        ),
        O::allowed(OWNER_SIZE_KEY, "packages", "LIMIT_TOTAL_OWNER_SIZE", sizes),
        // [storage]
        O::allowed(
            "gitea-storage-storage-type",
            "storage",
            "STORAGE_TYPE",
            AllowList::literals(STORAGE_TYPES),
        ),
        O::allowed(
            "gitea-storage-repo-archive-storage-type",
            "storage.repo-archive",
            "STORAGE_TYPE",
            AllowList::literals(STORAGE_TYPES),
        ),
        path("gitea-storage-repo-archive-path", "storage.repo-archive", "PATH"),
        O::allowed(
            "gitea-storage-packages-storage-type",
            "storage.packages",
            "STORAGE_TYPE",
            AllowList::literals(STORAGE_TYPES),
        ),
        path("gitea-storage-packages-path", "storage.packages", "PATH"),
        // [proxy]
        O::direct("gitea-proxy-proxy-enabled", "proxy", "PROXY_ENABLED"),
        O::direct("gitea-proxy-proxy-url", "proxy", "PROXY_URL"),
        O::direct("gitea-proxy-proxy-hosts", "proxy", "PROXY_HOSTS"),
        // [actions]
        O::direct("gitea-actions-enabled", "actions", "ENABLED"),
        O::allowed(
            "gitea-actions-default-actions-url",
            "actions",
            "DEFAULT_ACTIONS_URL",
            AllowList::literals(ACTIONS_URLS),
        ),
        O::allowed(
            "gitea-storage-actions-log-storage-type",
            "storage.actions_log",
            "STORAGE_TYPE",
            AllowList::literals(STORAGE_TYPES),
        ),
        path("gitea-storage-actions-log-path", "storage.actions_log", "PATH"),
        O::allowed(
            "gitea-storage-actions-artifacts-storage-type",
            "storage.actions_artifacts",
            "STORAGE_TYPE",
            AllowList::literals(STORAGE_TYPES),
        ),
        path(
            "gitea-storage-actions-artifacts-path",
            "storage.actions_artifacts",
            "PATH",
        ),
    ])
}
