//! Platform neutral records exchanged between the platforms and the migrator
use std::fmt;

use serde::{Deserialize, Serialize};

/// Visibility of a source repository
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only members can see it
    #[default]
    Private,

    /// Every authenticated user of the instance can see it
    Internal,

    /// Everyone can see it
    Public,
}

impl From<&str> for Visibility {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "public" => Visibility::Public,
            "internal" => Visibility::Internal,
            _ => Visibility::Private,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Private => write!(f, "private"),
            Visibility::Internal => write!(f, "internal"),
            Visibility::Public => write!(f, "public"),
        }
    }
}

/// Repository information, one migration unit
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct RepositoryDescriptor {
    /// Project id on the source platform
    pub source_id: u64,

    /// Name of the repository
    pub name: String,

    /// Path of the repository
    pub path: String,

    /// Description of the repository
    pub description: String,

    /// Default branch, absent for empty repositories
    pub default_branch: Option<String>,

    /// Visibility on the source platform
    pub visibility: Visibility,

    /// HTTPS clone url
    pub clone_url: String,

    /// Web url
    pub web_url: String,
}

impl RepositoryDescriptor {
    /// Show the full name of the repo, including its path (if different from the name)
    pub fn show_full_name(&self) -> String {
        let fmt_path = if self.name != self.path {
            format!(" at path '{}'", self.path)
        } else {
            "".into()
        };
        format!("{}{}", self.name, fmt_path)
    }
}

/// Open or closed, for issues and milestones
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// Still open
    #[default]
    Open,

    /// Closed
    Closed,
}

impl IssueState {
    /// Parse a source state, anything that isn't closed is open
    pub fn from_source(state: &str) -> Self {
        if state == "closed" {
            IssueState::Closed
        } else {
            IssueState::Open
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueState::Open => write!(f, "open"),
            IssueState::Closed => write!(f, "closed"),
        }
    }
}

/// State of a merge request on the source platform
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum MergeRequestState {
    /// Open
    #[default]
    Opened,

    /// Closed without merging
    Closed,

    /// Merged
    Merged,

    /// Locked
    Locked,
}

impl MergeRequestState {
    /// Whether the change is still pending
    pub fn is_open(&self) -> bool {
        matches!(self, MergeRequestState::Opened | MergeRequestState::Locked)
    }
}

impl From<&str> for MergeRequestState {
    fn from(s: &str) -> Self {
        match s {
            "closed" => MergeRequestState::Closed,
            "merged" => MergeRequestState::Merged,
            "locked" => MergeRequestState::Locked,
            _ => MergeRequestState::Opened,
        }
    }
}

impl fmt::Display for MergeRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeRequestState::Opened => write!(f, "opened"),
            MergeRequestState::Closed => write!(f, "closed"),
            MergeRequestState::Merged => write!(f, "merged"),
            MergeRequestState::Locked => write!(f, "locked"),
        }
    }
}

/// Label as listed on the source platform
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct SourceLabel {
    /// Label name
    pub name: String,

    /// Color, `#RRGGBB` on GitLab
    pub color: String,

    /// Label description
    pub description: Option<String>,
}

/// Milestone as listed on the source platform
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct SourceMilestone {
    /// Milestone title, used as lookup key
    pub title: String,

    /// Milestone description
    pub description: Option<String>,

    /// Open or closed
    pub state: IssueState,

    /// Due date (`YYYY-MM-DD`)
    pub due_date: Option<String>,
}

/// Issue as listed on the source platform
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct SourceIssue {
    /// Project scoped id
    pub iid: u64,

    /// Title
    pub title: String,

    /// Raw description
    pub description: Option<String>,

    /// Label names
    pub labels: Vec<String>,

    /// Milestone title
    pub milestone: Option<String>,

    /// Open or closed
    pub state: IssueState,

    /// Web url
    pub web_url: String,
}

/// Merge request as listed on the source platform
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct MergeRequestRecord {
    /// Project scoped id
    pub iid: u64,

    /// Title
    pub title: String,

    /// Raw description
    pub description: Option<String>,

    /// Branch holding the change
    pub source_branch: String,

    /// Branch the change targets
    pub target_branch: String,

    /// Label names
    pub labels: Vec<String>,

    /// Milestone title
    pub milestone: Option<String>,

    /// Source state
    pub state: MergeRequestState,

    /// Web url
    pub web_url: String,
}

/// Comment on an issue or merge request
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct SourceNote {
    /// Username of the author
    pub author: String,

    /// Markdown body
    pub body: String,

    /// Generated by the platform (label changes, commits pushed...)
    pub system: bool,
}

/// Destination repository ready to receive the mirror
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct DestinationRepo {
    /// Repository name
    pub name: String,

    /// HTTPS clone url
    pub clone_url: String,

    /// Whether it was created during this run
    pub created: bool,

    /// Whether it is private
    pub private: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn full_name_shows_path_only_when_different() {
        let mut repo = RepositoryDescriptor {
            name: "backend".to_string(),
            path: "backend".to_string(),
            ..Default::default()
        };
        assert_eq!(repo.show_full_name(), "backend");
        repo.path = "backend-api".to_string();
        assert_eq!(repo.show_full_name(), "backend at path 'backend-api'");
    }

    #[test]
    fn parse_source_states() {
        assert_eq!(Visibility::from("internal"), Visibility::Internal);
        assert_eq!(Visibility::from("PUBLIC"), Visibility::Public);
        assert_eq!(Visibility::from("unknown"), Visibility::Private);
        assert_eq!(IssueState::from_source("opened"), IssueState::Open);
        assert_eq!(IssueState::from_source("closed"), IssueState::Closed);
        assert_eq!(MergeRequestState::from("merged"), MergeRequestState::Merged);
        assert!(MergeRequestState::from("locked").is_open());
        assert!(!MergeRequestState::from("closed").is_open());
    }
}
