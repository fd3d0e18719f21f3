//! GitLab API module, the source side of the migration.
pub(crate) mod config;
pub(crate) mod platform;
pub(crate) mod types;

/// Header carrying the GitLab token
const GITLAB_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Username GitLab expects when a token is used over HTTPS
const GITLAB_GIT_USERNAME: &str = "oauth2";
