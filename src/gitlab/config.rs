//! Gitlab configuration
use serde::{Deserialize, Serialize};
use url::Url;

/// Gitlab section of the configuration file
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct GitlabConfig {
    /// Gitlab instance url
    pub url: Option<String>,

    /// Gitlab token
    pub token: Option<String>,

    /// Group id or full path
    pub group: Option<String>,
}

/// Resolved Gitlab settings
#[derive(Clone, PartialEq, Eq)]
pub struct GitlabSettings {
    /// Gitlab instance url
    pub url: Url,

    /// Gitlab token (read access is enough)
    pub token: String,

    /// Group id or full path
    pub group: String,
}

impl std::fmt::Debug for GitlabSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitlabSettings")
            .field("url", &self.url.as_str())
            .field("token", &"***")
            .field("group", &self.group)
            .finish()
    }
}
