//! GitLab API payloads and their conversion to neutral records
use crate::model::{
    IssueState, MergeRequestRecord, MergeRequestState, RepositoryDescriptor, SourceIssue,
    SourceLabel, SourceMilestone, SourceNote, Visibility,
};
use serde::Deserialize;

/// Gitlab project
#[derive(Deserialize, Default, Debug, Clone)]
pub struct GitlabProject {
    /// Project id
    pub id: u64,

    /// Project name
    pub name: String,

    /// Project path
    pub path: String,

    /// Project description
    pub description: Option<String>,

    /// `private`, `internal` or `public`
    pub visibility: String,

    /// Default branch, absent for empty projects
    pub default_branch: Option<String>,

    /// HTTPS clone url
    pub http_url_to_repo: String,

    /// Web url
    pub web_url: String,
}

impl From<GitlabProject> for RepositoryDescriptor {
    fn from(project: GitlabProject) -> Self {
        RepositoryDescriptor {
            source_id: project.id,
            name: project.name,
            path: project.path,
            description: project.description.unwrap_or_default(),
            default_branch: project.default_branch,
            visibility: Visibility::from(project.visibility.as_str()),
            clone_url: project.http_url_to_repo,
            web_url: project.web_url,
        }
    }
}

/// Gitlab label
#[derive(Deserialize, Default, Debug, Clone)]
pub struct GitlabLabel {
    /// Label name
    pub name: String,

    /// `#RRGGBB`
    pub color: String,

    /// Label description
    pub description: Option<String>,
}

impl From<GitlabLabel> for SourceLabel {
    fn from(label: GitlabLabel) -> Self {
        SourceLabel {
            name: label.name,
            color: label.color,
            description: label.description,
        }
    }
}

/// Gitlab milestone
#[derive(Deserialize, Default, Debug, Clone)]
pub struct GitlabMilestone {
    /// Milestone title
    pub title: String,

    /// Milestone description
    pub description: Option<String>,

    /// `active` or `closed`
    pub state: String,

    /// Due date
    pub due_date: Option<String>,
}

impl From<GitlabMilestone> for SourceMilestone {
    fn from(milestone: GitlabMilestone) -> Self {
        SourceMilestone {
            title: milestone.title,
            description: milestone.description,
            state: IssueState::from_source(&milestone.state),
            due_date: milestone.due_date,
        }
    }
}

/// Milestone as embedded in issues and merge requests
#[derive(Deserialize, Default, Debug, Clone)]
pub struct GitlabMilestoneRef {
    /// Milestone title
    pub title: String,
}

/// Gitlab issue
#[derive(Deserialize, Default, Debug, Clone)]
pub struct GitlabIssue {
    /// Project scoped id
    pub iid: u64,

    /// Title
    pub title: String,

    /// Description
    pub description: Option<String>,

    /// `opened` or `closed`
    pub state: String,

    /// Label names
    #[serde(default)]
    pub labels: Vec<String>,

    /// Milestone
    pub milestone: Option<GitlabMilestoneRef>,

    /// Web url
    pub web_url: String,
}

impl From<GitlabIssue> for SourceIssue {
    fn from(issue: GitlabIssue) -> Self {
        SourceIssue {
            iid: issue.iid,
            title: issue.title,
            description: issue.description,
            labels: issue.labels,
            milestone: issue.milestone.map(|m| m.title),
            state: IssueState::from_source(&issue.state),
            web_url: issue.web_url,
        }
    }
}

/// Gitlab merge request
#[derive(Deserialize, Default, Debug, Clone)]
pub struct GitlabMergeRequest {
    /// Project scoped id
    pub iid: u64,

    /// Title
    pub title: String,

    /// Description
    pub description: Option<String>,

    /// `opened`, `closed`, `merged` or `locked`
    pub state: String,

    /// Branch holding the change
    pub source_branch: String,

    /// Branch the change targets
    pub target_branch: String,

    /// Label names
    #[serde(default)]
    pub labels: Vec<String>,

    /// Milestone
    pub milestone: Option<GitlabMilestoneRef>,

    /// Web url
    pub web_url: String,
}

impl From<GitlabMergeRequest> for MergeRequestRecord {
    fn from(mr: GitlabMergeRequest) -> Self {
        MergeRequestRecord {
            iid: mr.iid,
            title: mr.title,
            description: mr.description,
            source_branch: mr.source_branch,
            target_branch: mr.target_branch,
            labels: mr.labels,
            milestone: mr.milestone.map(|m| m.title),
            state: MergeRequestState::from(mr.state.as_str()),
            web_url: mr.web_url,
        }
    }
}

/// Gitlab user as embedded in notes
#[derive(Deserialize, Default, Debug, Clone)]
pub struct GitlabUser {
    /// Username
    pub username: String,
}

/// Gitlab note (comment)
#[derive(Deserialize, Default, Debug, Clone)]
pub struct GitlabNote {
    /// Markdown body
    pub body: String,

    /// Generated by GitLab
    #[serde(default)]
    pub system: bool,

    /// Author
    pub author: GitlabUser,
}

impl From<GitlabNote> for SourceNote {
    fn from(note: GitlabNote) -> Self {
        SourceNote {
            author: note.author.username,
            body: note.body,
            system: note.system,
        }
    }
}
