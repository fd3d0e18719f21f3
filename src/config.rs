//! Configuration handling
//!
//! Values come from the TOML file, then the environment (`.env` included),
//! then the command line, each layer overriding the previous one.
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

use home::home_dir;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    cli::MigrateCli,
    errors::{MigrateError, MigrateErrorKind},
    github::config::{GithubConfig, GithubSettings},
    gitlab::config::{GitlabConfig, GitlabSettings},
    model::Visibility,
    request::RetryPolicy,
};

/// Default GitHub API url
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default run log file
const DEFAULT_LOG_FILE: &str = "migration.log";

/// Content of the configuration file
#[derive(Deserialize, Serialize, Default, Clone, Debug)]
pub struct ConfigData {
    /// Gitlab configuration
    pub gitlab: Option<GitlabConfig>,

    /// Github configuration
    pub github: Option<GithubConfig>,

    /// Migration options
    pub migration: Option<MigrationSection>,
}

/// `[migration]` section of the configuration file
#[derive(Deserialize, Serialize, Default, Clone, Debug)]
pub struct MigrationSection {
    /// `mirror`, `private` or `public`
    pub visibility: Option<String>,

    /// Create every repository as private
    pub force_private: Option<bool>,

    /// Migrate labels
    pub labels: Option<bool>,

    /// Migrate milestones
    pub milestones: Option<bool>,

    /// Migrate issues
    pub issues: Option<bool>,

    /// Migrate merge requests
    pub merge_requests: Option<bool>,

    /// Copy comments of issues and merge requests
    pub comments: Option<bool>,

    /// Attempts per request when rate limited
    pub max_attempts: Option<u32>,

    /// Run log path
    pub log_file: Option<PathBuf>,
}

/// How destination repository visibility is chosen
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityPolicy {
    /// Same as the source, internal repositories become private
    #[default]
    Mirror,

    /// Always private
    Private,

    /// Always public
    Public,
}

impl VisibilityPolicy {
    /// Whether the destination repository must be private
    pub fn is_private(&self, source: Visibility, force_private: bool) -> bool {
        if force_private {
            return true;
        }
        match self {
            VisibilityPolicy::Mirror => source != Visibility::Public,
            VisibilityPolicy::Private => true,
            VisibilityPolicy::Public => false,
        }
    }
}

impl FromStr for VisibilityPolicy {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mirror" | "source" => Ok(VisibilityPolicy::Mirror),
            "private" => Ok(VisibilityPolicy::Private),
            "public" => Ok(VisibilityPolicy::Public),
            other => Err(format!(
                "Invalid visibility '{other}', expected mirror, private or public"
            )
            .into()),
        }
    }
}

/// Steps of the per repository migration that can be turned off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationSteps {
    /// Migrate labels
    pub labels: bool,

    /// Migrate milestones
    pub milestones: bool,

    /// Migrate issues
    pub issues: bool,

    /// Migrate merge requests
    pub merge_requests: bool,

    /// Copy comments
    pub comments: bool,
}

impl Default for MigrationSteps {
    fn default() -> Self {
        Self {
            labels: true,
            milestones: true,
            issues: true,
            merge_requests: true,
            comments: true,
        }
    }
}

/// Resolved, immutable configuration of a run
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Configuration file that was read, if any
    pub config_path: Option<PathBuf>,

    /// Source settings
    pub gitlab: GitlabSettings,

    /// Destination settings
    pub github: GithubSettings,

    /// Default visibility policy
    pub visibility: VisibilityPolicy,

    /// Override the policy and make every repository private
    pub force_private: bool,

    /// Only migrate this repository
    pub target_repo: Option<String>,

    /// Enabled steps
    pub steps: MigrationSteps,

    /// Rate limit retries
    pub retry: RetryPolicy,

    /// Append-only run log
    pub log_file: PathBuf,
}

impl MigrationConfig {
    /// Load the configuration from the file, the process environment and the CLI
    /// # Errors
    /// Error if the file can't be read or a required value is missing or invalid
    pub fn load(cli: &MigrateCli) -> Result<Self, MigrateError> {
        let config_path = match &cli.config {
            Some(path) => Some(path.clone()),
            None => Self::get_config_path().filter(|path| path.exists()),
        };
        let data = match &config_path {
            Some(path) => Self::read_file(path)?,
            None => ConfigData::default(),
        };
        Self::resolve(cli, config_path, data, |key| {
            std::env::var(key).ok().filter(|value| !value.is_empty())
        })
    }

    /// Default path of the configuration file
    pub fn get_config_path() -> Option<PathBuf> {
        match home_dir() {
            Some(path) if !path.as_os_str().is_empty() => Some(
                path.join(".config")
                    .join("gitlab2github")
                    .join("config.toml"),
            ),
            _ => None,
        }
    }

    /// Parse a configuration file
    /// # Errors
    /// Error if the file can't be read or isn't valid TOML
    pub fn read_file(path: &Path) -> Result<ConfigData, MigrateError> {
        let contents = read_to_string(path).map_err(|e| {
            MigrateError::with_source(MigrateErrorKind::Config, e)
                .with_text(&format!("Unable to open {}", path.display()))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Merge file data, environment lookups and CLI flags
    /// # Errors
    /// Error if a required value is missing or a value is invalid
    pub fn resolve(
        cli: &MigrateCli,
        config_path: Option<PathBuf>,
        data: ConfigData,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MigrateError> {
        let gitlab = data.gitlab.unwrap_or_default();
        let github = data.github.unwrap_or_default();
        let migration = data.migration.unwrap_or_default();

        let mut missing = vec![];
        let mut required = |key: &'static str, file_value: Option<String>| {
            match env(key).or(file_value) {
                Some(value) => value,
                None => {
                    missing.push(key);
                    String::new()
                }
            }
        };
        let gitlab_url = required("GITLAB_URL", gitlab.url);
        let gitlab_token = required("GITLAB_TOKEN", gitlab.token);
        let gitlab_group = required("GITLAB_GROUP_ID", gitlab.group);
        let github_token = required("GITHUB_TOKEN", github.token);
        let github_org = required("GITHUB_ORG", github.org);
        if !missing.is_empty() {
            return Err(format!(
                "Missing required settings: {} (set them in the environment, a .env file or the config file)",
                missing.join(", ")
            )
            .into());
        }

        let github_api_url = env("GITHUB_API_URL")
            .or(github.api_url)
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());

        let flag = |key: &str, file_value: Option<bool>| -> Result<bool, MigrateError> {
            match env(key) {
                Some(value) => parse_bool(key, &value),
                None => Ok(file_value.unwrap_or(true)),
            }
        };
        let steps = MigrationSteps {
            labels: flag("MIGRATE_LABELS", migration.labels)?,
            milestones: flag("MIGRATE_MILESTONES", migration.milestones)?,
            issues: flag("MIGRATE_ISSUES", migration.issues)?,
            merge_requests: flag("MIGRATE_MERGE_REQUESTS", migration.merge_requests)?,
            comments: flag("MIGRATE_COMMENTS", migration.comments)?,
        };

        let force_private = cli.force_private
            || match env("FORCE_PRIVATE") {
                Some(value) => parse_bool("FORCE_PRIVATE", &value)?,
                None => migration.force_private.unwrap_or(false),
            };

        let visibility = match env("DEFAULT_VISIBILITY").or(migration.visibility) {
            Some(value) => value.parse()?,
            None => VisibilityPolicy::default(),
        };

        let mut retry = RetryPolicy::default();
        let max_attempts = match env("RATE_LIMIT_MAX_ATTEMPTS") {
            Some(value) => Some(value.trim().parse::<u32>().map_err(|e| {
                MigrateError::with_source(MigrateErrorKind::Config, e)
                    .with_text("RATE_LIMIT_MAX_ATTEMPTS")
            })?),
            None => migration.max_attempts,
        };
        if let Some(max_attempts) = max_attempts {
            if max_attempts == 0 {
                return Err("RATE_LIMIT_MAX_ATTEMPTS must be at least 1".into());
            }
            retry.max_attempts = max_attempts;
        }

        let log_file = env("MIGRATION_LOG")
            .map(PathBuf::from)
            .or(migration.log_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        Ok(MigrationConfig {
            config_path,
            gitlab: GitlabSettings {
                url: parse_url("GITLAB_URL", &gitlab_url)?,
                token: gitlab_token,
                group: gitlab_group,
            },
            github: GithubSettings {
                api_url: parse_url("GITHUB_API_URL", &github_api_url)?,
                token: github_token,
                org: github_org,
            },
            visibility,
            force_private,
            target_repo: cli.repo.clone(),
            steps,
            retry,
            log_file,
        })
    }

    /// Whether the destination of a repository must be private
    pub fn is_private(&self, source: Visibility) -> bool {
        self.visibility.is_private(source, self.force_private)
    }
}

/// Parse a boolean flag
fn parse_bool(key: &str, value: &str) -> Result<bool, MigrateError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("Invalid boolean '{other}' for {key}").into()),
    }
}

/// Parse an http(s) url
fn parse_url(key: &str, value: &str) -> Result<Url, MigrateError> {
    let url = Url::parse(value.trim()).map_err(|e| {
        MigrateError::with_source(MigrateErrorKind::Config, e).with_text(&format!("{key}={value}"))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(format!("{key} must be an http(s) url, got '{scheme}'").into()),
    }
}

/// Give a short-lived test delay to the retry policy
#[cfg(test)]
pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        base_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(2),
    }
}
