//! Full git mirror of a repository: every branch and tag pushed, then stale refs removed
use std::collections::BTreeSet;

use git2::{AutotagOption, Cred, FetchOptions, PushOptions, RemoteCallbacks, Repository};
use log::{debug, info};
use tempfile::TempDir;

use crate::{
    errors::{BoxError, MigrateError, MigrateErrorKind},
    platform::GitCredentials,
};

/// Refs copied from the source, heads and tags only (no merge request refs)
const MIRROR_REFSPECS: [&str; 2] = ["+refs/heads/*:refs/heads/*", "+refs/tags/*:refs/tags/*"];

/// Prefix the destination refs are fetched under, kept apart from the source refs
const DESTINATION_NAMESPACE: &str = "refs/destination/";

/// Where the destination heads and tags land in the workspace
const DESTINATION_REFSPECS: [&str; 2] = [
    "+refs/heads/*:refs/destination/heads/*",
    "+refs/tags/*:refs/destination/tags/*",
];

/// Refs sent to the destination, and the ones left to delete
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorSummary {
    /// Branches pushed
    pub branches: usize,

    /// Tags pushed
    pub tags: usize,

    /// Destination refs the source no longer has
    pub stale: Vec<String>,
}

/// Copy the git content of a repository to another location
pub trait RepositoryMirror: Send + Sync {
    /// Force-push every branch and tag of `source_url` to `destination_url`
    /// # Errors
    /// `Transfer` when the clone or the push fails, or when a ref is rejected
    fn push(&self, source_url: &str, destination_url: &str)
        -> Result<MirrorSummary, MigrateError>;

    /// Delete refs of `destination_url`, returning how many were deleted
    /// # Errors
    /// `Transfer` when the push fails or a deletion is rejected
    fn prune(&self, destination_url: &str, stale: &[String]) -> Result<usize, MigrateError>;
}

/// Mirror through libgit2, in a temporary bare repository
#[derive(Debug, Default, Clone)]
pub struct GitMirror {
    /// Credentials for the source remote
    source: Option<GitCredentials>,

    /// Credentials for the destination remote
    destination: Option<GitCredentials>,
}

impl GitMirror {
    /// Mirror authenticating on both remotes
    pub fn new(source: GitCredentials, destination: GitCredentials) -> Self {
        Self {
            source: Some(source),
            destination: Some(destination),
        }
    }

    /// Push refspecs to the destination, failing when any ref is rejected
    fn push_refspecs(
        &self,
        repo: &Repository,
        destination_url: &str,
        refspecs: &[String],
    ) -> Result<(), MigrateError> {
        let mut destination = repo
            .remote_anonymous(destination_url)
            .map_err(|e| transfer_error("open remote", destination_url, e))?;
        let mut rejected = vec![];
        {
            let mut push_callbacks = callbacks(self.destination.as_ref());
            push_callbacks.push_update_reference(|name, status| {
                if let Some(message) = status {
                    rejected.push(format!("{name} ({message})"));
                }
                Ok(())
            });
            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(push_callbacks);
            destination
                .push(refspecs, Some(&mut push_options))
                .map_err(|e| transfer_error("push to", destination_url, e))?;
        }
        if !rejected.is_empty() {
            return Err(MigrateError::new(MigrateErrorKind::Transfer).with_text(&format!(
                "'{destination_url}' rejected {}",
                rejected.join(", ")
            )));
        }
        Ok(())
    }
}

/// Callbacks answering the first credential request, then giving up
fn callbacks(credentials: Option<&GitCredentials>) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(credentials) = credentials {
        let mut asked = false;
        callbacks.credentials(move |url, _username_from_url, _allowed| {
            if asked {
                return Err(git2::Error::from_str(&format!(
                    "credentials rejected by {url}"
                )));
            }
            asked = true;
            Cred::userpass_plaintext(&credentials.username, &credentials.token)
        });
    }
    callbacks
}

/// Only heads and tags take part in the mirror
fn is_mirrored(name: &str) -> bool {
    name.starts_with("refs/heads/") || name.starts_with("refs/tags/")
}

/// Attach the step and remote to a failure
fn transfer_error<E: Into<BoxError>>(step: &str, url: &str, e: E) -> MigrateError {
    MigrateError::with_source(MigrateErrorKind::Transfer, e)
        .with_text(&format!("{step} '{url}'"))
}

/// Empty bare repository in a temporary directory, removed on drop
fn workspace(url: &str) -> Result<(TempDir, Repository), MigrateError> {
    let dir = tempfile::Builder::new()
        .prefix("gitlab2github-")
        .tempdir()
        .map_err(|e| transfer_error("create workspace for", url, e))?;
    let repo = Repository::init_bare(dir.path())
        .map_err(|e| transfer_error("create workspace for", url, e))?;
    debug!("Workspace for '{url}' in {}", dir.path().display());
    Ok((dir, repo))
}

/// Fetch refs from a remote into the workspace
fn fetch(
    repo: &Repository,
    url: &str,
    refspecs: &[&str],
    credentials: Option<&GitCredentials>,
) -> Result<(), MigrateError> {
    let mut remote = repo
        .remote_anonymous(url)
        .map_err(|e| transfer_error("open remote", url, e))?;
    let mut fetch_options = FetchOptions::new();
    fetch_options
        .remote_callbacks(callbacks(credentials))
        .download_tags(AutotagOption::None);
    remote
        .fetch(refspecs, Some(&mut fetch_options), None)
        .map_err(|e| transfer_error("fetch from", url, e))
}

/// Names of the workspace refs, `refs/destination/` ones mapped back to their remote name
fn ref_sets(
    repo: &Repository,
) -> Result<(BTreeSet<String>, BTreeSet<String>), git2::Error> {
    let mut local = BTreeSet::new();
    let mut remote = BTreeSet::new();
    for reference in repo.references()? {
        let reference = reference?;
        let Some(name) = reference.name() else {
            continue;
        };
        if let Some(rest) = name.strip_prefix(DESTINATION_NAMESPACE) {
            remote.insert(format!("refs/{rest}"));
        } else if is_mirrored(name) {
            local.insert(name.to_string());
        }
    }
    Ok((local, remote))
}

impl RepositoryMirror for GitMirror {
    fn push(
        &self,
        source_url: &str,
        destination_url: &str,
    ) -> Result<MirrorSummary, MigrateError> {
        let (_dir, repo) = workspace(source_url)?;
        fetch(&repo, source_url, &MIRROR_REFSPECS, self.source.as_ref())?;
        fetch(
            &repo,
            destination_url,
            &DESTINATION_REFSPECS,
            self.destination.as_ref(),
        )?;
        let (local, remote) =
            ref_sets(&repo).map_err(|e| transfer_error("read refs of", source_url, e))?;

        let summary = MirrorSummary {
            branches: local.iter().filter(|n| n.starts_with("refs/heads/")).count(),
            tags: local.iter().filter(|n| n.starts_with("refs/tags/")).count(),
            stale: remote.difference(&local).cloned().collect(),
        };
        if local.is_empty() {
            info!("'{source_url}' has no branches or tags, nothing to push");
            return Ok(summary);
        }
        let refspecs: Vec<String> = local.iter().map(|name| format!("+{name}:{name}")).collect();
        self.push_refspecs(&repo, destination_url, &refspecs)?;
        info!(
            "Pushed {} branches and {} tags to '{destination_url}'",
            summary.branches, summary.tags
        );
        Ok(summary)
    }

    fn prune(&self, destination_url: &str, stale: &[String]) -> Result<usize, MigrateError> {
        if stale.is_empty() {
            return Ok(0);
        }
        let (_dir, repo) = workspace(destination_url)?;
        let refspecs: Vec<String> = stale.iter().map(|name| format!(":{name}")).collect();
        self.push_refspecs(&repo, destination_url, &refspecs)?;
        info!("Deleted {} refs from '{destination_url}'", stale.len());
        Ok(stale.len())
    }
}
