//! Github configuration
use serde::{Deserialize, Serialize};
use url::Url;

/// Github section of the configuration file
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct GithubConfig {
    /// Github API url, `https://api.github.com` unless using GitHub Enterprise
    pub api_url: Option<String>,

    /// Github token
    pub token: Option<String>,

    /// Organization receiving the repositories
    pub org: Option<String>,
}

/// Resolved Github settings
#[derive(Clone, PartialEq, Eq)]
pub struct GithubSettings {
    /// Github API url
    pub api_url: Url,

    /// Github token (needs repo and org write access)
    pub token: String,

    /// Organization receiving the repositories
    pub org: String,
}

impl std::fmt::Debug for GithubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubSettings")
            .field("api_url", &self.api_url.as_str())
            .field("token", &"***")
            .field("org", &self.org)
            .finish()
    }
}
