//! GitHub API payloads
use serde::{Deserialize, Serialize};

/// Github Repo
#[derive(Deserialize, Default, Debug, Clone)]
pub struct RepoGithub {
    /// Repository name
    pub name: String,

    /// Repository private status
    pub private: bool,

    /// HTTPS clone url
    pub clone_url: String,
}

/// Anything GitHub identifies by a number (issues, pull requests, milestones)
#[derive(Deserialize, Default, Debug, Clone)]
pub struct Numbered {
    /// Number within the repository
    pub number: u64,
}

/// Body of a repository creation
#[derive(Serialize, Debug, Clone)]
pub struct CreateRepo<'a> {
    /// Repository name
    pub name: &'a str,

    /// Repository description
    pub description: String,

    /// Repository private status
    pub private: bool,

    /// Always false, the mirror provides the content
    pub auto_init: bool,
}

/// Body of a repository edition
#[derive(Serialize, Debug, Clone, Default)]
pub struct EditRepo<'a> {
    /// Repository private status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,

    /// Branch shown and checked out by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<&'a str>,
}

/// Body of an issue creation
#[derive(Serialize, Debug, Clone)]
pub struct CreateIssue<'a> {
    /// Title
    pub title: &'a str,

    /// Body
    pub body: &'a str,

    /// Label names
    #[serde(skip_serializing_if = "no_labels")]
    pub labels: &'a [String],

    /// Milestone number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

/// Body of an issue or pull request edition
#[derive(Serialize, Debug, Default, Clone)]
pub struct EditIssue<'a> {
    /// New state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a str>,

    /// Label names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<&'a [String]>,

    /// Milestone number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

/// Body of a pull request creation
#[derive(Serialize, Debug, Clone)]
pub struct CreatePullRequest<'a> {
    /// Title
    pub title: &'a str,

    /// Body
    pub body: &'a str,

    /// Branch holding the change
    pub head: &'a str,

    /// Branch the change targets
    pub base: &'a str,
}

/// Body of a comment creation
#[derive(Serialize, Debug, Clone)]
pub struct CreateComment<'a> {
    /// Markdown body
    pub body: &'a str,
}

/// Labels are left out of the body when there are none
fn no_labels(labels: &&[String]) -> bool {
    labels.is_empty()
}
