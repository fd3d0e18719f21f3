//! Seams between the migrator and the two platforms
use std::{future::Future, pin::Pin};

use crate::{
    errors::MigrateError,
    mapper::{Associations, IssueRecord, LabelPayload, MilestonePayload, PullRequestPayload},
    model::{
        DestinationRepo, MergeRequestRecord, RepositoryDescriptor, SourceIssue, SourceLabel,
        SourceMilestone, SourceNote,
    },
};

/// Boxed future returned by platform operations
pub type PlatformFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, MigrateError>> + Send + 'a>>;

/// Read-only access to the platform repositories are migrated from
pub trait SourcePlatform: Sync + Send {
    /// Fail with an auth error when the token is rejected
    fn check_access(&self) -> PlatformFuture<'_, ()>;

    /// Every project of the configured group
    fn get_all_repos(&self) -> PlatformFuture<'_, Vec<RepositoryDescriptor>>;

    /// Labels of a project
    fn list_labels(&self, project_id: u64) -> PlatformFuture<'_, Vec<SourceLabel>>;

    /// Milestones of a project
    fn list_milestones(&self, project_id: u64) -> PlatformFuture<'_, Vec<SourceMilestone>>;

    /// Issues of a project, open and closed
    fn list_issues(&self, project_id: u64) -> PlatformFuture<'_, Vec<SourceIssue>>;

    /// Merge requests of a project, in every state
    fn list_merge_requests(&self, project_id: u64)
        -> PlatformFuture<'_, Vec<MergeRequestRecord>>;

    /// Notes of an issue
    fn list_issue_notes(&self, project_id: u64, iid: u64) -> PlatformFuture<'_, Vec<SourceNote>>;

    /// Notes of a merge request
    fn list_merge_request_notes(
        &self,
        project_id: u64,
        iid: u64,
    ) -> PlatformFuture<'_, Vec<SourceNote>>;

    /// Credentials used by the git mirror
    fn git_credentials(&self) -> GitCredentials;

    /// Host of the platform
    fn get_remote_url(&self) -> &str;
}

/// Write access to the platform repositories are migrated to
pub trait DestinationPlatform: Sync + Send {
    /// Fail with an auth or config error when the token or the organization is unusable
    fn check_access(&self) -> PlatformFuture<'_, ()>;

    /// Look the repository up, create it when missing, and apply the visibility
    fn ensure_repository<'a>(
        &'a self,
        repo: &'a RepositoryDescriptor,
        private: bool,
    ) -> PlatformFuture<'a, DestinationRepo>;

    /// Make `branch` the default branch of the repository
    fn set_default_branch<'a>(&'a self, repo: &'a str, branch: &'a str) -> PlatformFuture<'a, ()>;

    /// Whether a branch exists in the repository
    fn branch_exists<'a>(&'a self, repo: &'a str, branch: &'a str) -> PlatformFuture<'a, bool>;

    /// Create a label
    fn create_label<'a>(
        &'a self,
        repo: &'a str,
        label: &'a LabelPayload,
    ) -> PlatformFuture<'a, ()>;

    /// Create a milestone, returning its number
    fn create_milestone<'a>(
        &'a self,
        repo: &'a str,
        milestone: &'a MilestonePayload,
    ) -> PlatformFuture<'a, u64>;

    /// Create an issue, returning its number
    fn create_issue<'a>(
        &'a self,
        repo: &'a str,
        issue: &'a IssueRecord,
        associations: &'a Associations,
    ) -> PlatformFuture<'a, u64>;

    /// Close an issue
    fn close_issue<'a>(&'a self, repo: &'a str, number: u64) -> PlatformFuture<'a, ()>;

    /// Open a pull request, returning its number
    fn create_pull_request<'a>(
        &'a self,
        repo: &'a str,
        pull_request: &'a PullRequestPayload,
    ) -> PlatformFuture<'a, u64>;

    /// Attach labels and milestone to an existing issue or pull request
    fn assign<'a>(
        &'a self,
        repo: &'a str,
        number: u64,
        associations: &'a Associations,
    ) -> PlatformFuture<'a, ()>;

    /// Close a pull request
    fn close_pull_request<'a>(&'a self, repo: &'a str, number: u64) -> PlatformFuture<'a, ()>;

    /// Comment on an issue or pull request
    fn create_comment<'a>(
        &'a self,
        repo: &'a str,
        number: u64,
        body: &'a str,
    ) -> PlatformFuture<'a, ()>;

    /// Credentials used by the git mirror
    fn git_credentials(&self) -> GitCredentials;

    /// Host of the platform
    fn get_remote_url(&self) -> &str;
}

/// HTTPS credentials handed to git
#[derive(Clone, PartialEq, Eq)]
pub struct GitCredentials {
    /// Basic auth username
    pub username: String,

    /// Token used as password
    pub token: String,
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("token", &"***")
            .finish()
    }
}

/// Supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformType {
    /// GitLab, the source
    Gitlab,

    /// GitHub, the destination
    Github,
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformType::Gitlab => write!(f, "gitlab"),
            PlatformType::Github => write!(f, "github"),
        }
    }
}
