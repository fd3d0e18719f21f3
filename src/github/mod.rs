//! GitHub API module, the destination side of the migration.
pub(crate) mod config;
pub(crate) mod platform;
pub(crate) mod types;

/// GitHub API Header
const GITHUB_API_HEADER: &str = "X-GitHub-Api-Version";

/// GitHub API Version
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Username GitHub expects when a token is used over HTTPS
const GITHUB_GIT_USERNAME: &str = "x-access-token";
