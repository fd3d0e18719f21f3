//! Per repository migration: destination repository, code, then metadata
use log::{debug, info, warn};

use crate::{
    config::MigrationConfig,
    errors::MigrateError,
    mapper::{
        map_issue, map_label, map_merge_request, map_milestone, map_note, BranchExistence,
        DestinationIndex, IssueRecord, MergeRequestMapping, PullRequestPayload,
    },
    mirror::RepositoryMirror,
    model::{DestinationRepo, IssueState, MergeRequestRecord, RepositoryDescriptor, SourceNote},
    platform::{DestinationPlatform, SourcePlatform},
    report::{LogEvent, MigrationResult, RepoStage, RunLog, RunReport},
};

/// Where the comments of a destination issue come from
#[derive(Debug, Clone, Copy)]
enum Noteable {
    /// Source issue
    Issue(u64),

    /// Source merge request
    MergeRequest(u64),
}

/// Runs the migration of repositories one after the other
pub struct Migrator<'a> {
    /// Resolved configuration
    config: &'a MigrationConfig,

    /// Platform read from
    source: &'a dyn SourcePlatform,

    /// Platform written to
    destination: &'a dyn DestinationPlatform,

    /// Git content transfer
    mirror: &'a dyn RepositoryMirror,

    /// Append-only run log
    run_log: &'a RunLog,
}

/// Results and run log of the repository being migrated
struct Progress<'a> {
    /// Result being filled
    result: MigrationResult,

    /// Run log
    run_log: &'a RunLog,
}

impl Progress<'_> {
    /// Entity written to the destination
    fn migrated(&self, entity: &str, detail: &str) {
        debug!("{}: {entity} migrated ({detail})", self.result.repo_name);
        self.run_log
            .record(&self.result.repo_name, LogEvent::Migrated, entity, detail);
    }

    /// Entity failed
    fn error(&mut self, entity: &str, error: &MigrateError) {
        warn!("{}: {entity} failed: {error}", self.result.repo_name);
        self.run_log.record(
            &self.result.repo_name,
            LogEvent::Error,
            entity,
            &error.to_string(),
        );
        self.result.push_error(entity, error);
    }

    /// Entity left out
    fn skip(&mut self, entity: &str, reason: &str) {
        info!("{}: {entity} skipped: {reason}", self.result.repo_name);
        self.run_log
            .record(&self.result.repo_name, LogEvent::Skipped, entity, reason);
        self.result.push_skip(entity, reason);
    }

    /// Follow-up step failed after the entity was created
    fn warning(&mut self, entity: &str, error: &MigrateError) {
        let message = format!("{entity}: {error}");
        warn!("{}: {message}", self.result.repo_name);
        self.run_log.record(
            &self.result.repo_name,
            LogEvent::Warning,
            entity,
            &error.to_string(),
        );
        self.result.warnings.push(message);
    }

    /// Association that doesn't exist on the destination
    fn dropped(&self, entity: &str, association: &str) {
        info!(
            "{}: {entity} created without {association}",
            self.result.repo_name
        );
        self.run_log.record(
            &self.result.repo_name,
            LogEvent::Warning,
            entity,
            &format!("dropped {association}"),
        );
    }
}

impl<'a> Migrator<'a> {
    /// Create a migrator
    pub fn new(
        config: &'a MigrationConfig,
        source: &'a dyn SourcePlatform,
        destination: &'a dyn DestinationPlatform,
        mirror: &'a dyn RepositoryMirror,
        run_log: &'a RunLog,
    ) -> Self {
        Self {
            config,
            source,
            destination,
            mirror,
            run_log,
        }
    }

    /// Migrate every repository in order, errors are recorded and never stop the run
    pub async fn run(&self, repos: &[RepositoryDescriptor]) -> RunReport {
        let mut report = RunReport::default();
        let total = repos.len();
        for (idx, repo) in repos.iter().enumerate() {
            info!("[{}/{total}] Migrating {}", idx + 1, repo.show_full_name());
            let result = self.migrate_repository(repo).await;
            info!(
                "[{}/{total}] {}: {} ({} errors)",
                idx + 1,
                repo.name,
                result.stage,
                result.errors.len()
            );
            report.results.push(result);
        }
        report
    }

    /// Migrate one repository
    pub async fn migrate_repository(&self, repo: &RepositoryDescriptor) -> MigrationResult {
        let mut progress = Progress {
            result: MigrationResult::new(&repo.name),
            run_log: self.run_log,
        };

        let private = self.config.is_private(repo.visibility);
        let destination = match self.destination.ensure_repository(repo, private).await {
            Ok(destination) => destination,
            Err(e) => {
                progress.error("repository", &e);
                return progress.result;
            }
        };
        progress.migrated(
            "repository",
            &format!(
                "{} {} (private: {})",
                if destination.created {
                    "created"
                } else {
                    "reused"
                },
                destination.name,
                destination.private
            ),
        );

        progress.result.stage = RepoStage::CodeMigrating;
        self.migrate_code(repo, &destination, &mut progress).await;

        progress.result.stage = RepoStage::MetadataMigrating;
        let steps = self.config.steps;
        let mut index = DestinationIndex::default();
        if steps.labels {
            self.migrate_labels(repo, &destination.name, &mut index, &mut progress)
                .await;
        }
        if steps.milestones {
            self.migrate_milestones(repo, &destination.name, &mut index, &mut progress)
                .await;
        }
        if steps.issues {
            self.migrate_issues(repo, &destination.name, &index, &mut progress)
                .await;
        }
        if steps.merge_requests {
            self.migrate_merge_requests(repo, &destination.name, &index, &mut progress)
                .await;
        }
        progress.result.stage = RepoStage::Done;
        progress.result
    }

    /// Push the git content, point the default branch at the source one, then delete stale refs
    async fn migrate_code(
        &self,
        repo: &RepositoryDescriptor,
        destination: &DestinationRepo,
        progress: &mut Progress<'_>,
    ) {
        let summary = match self.mirror.push(&repo.clone_url, &destination.clone_url) {
            Ok(summary) => summary,
            Err(e) => return progress.error("code", &e),
        };
        if let Some(branch) = repo.default_branch.as_deref().filter(|_| summary.branches > 0) {
            match self
                .destination
                .set_default_branch(&destination.name, branch)
                .await
            {
                Ok(()) => progress.migrated("default branch", branch),
                Err(e) => progress.warning("default branch", &e),
            }
        }
        match self.mirror.prune(&destination.clone_url, &summary.stale) {
            Ok(deleted) => {
                progress.result.code_migrated = true;
                progress.migrated(
                    "code",
                    &format!(
                        "{} branches, {} tags, {deleted} deleted",
                        summary.branches, summary.tags
                    ),
                );
            }
            Err(e) => progress.error("code", &e),
        }
    }

    /// Create the labels, remembering the names that exist on the destination
    async fn migrate_labels(
        &self,
        repo: &RepositoryDescriptor,
        destination: &str,
        index: &mut DestinationIndex,
        progress: &mut Progress<'_>,
    ) {
        let mut labels = match self.source.list_labels(repo.source_id).await {
            Ok(labels) => labels,
            Err(e) => return progress.error("labels", &e),
        };
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        for label in &labels {
            let entity = format!("label '{}'", label.name);
            let Some(payload) = map_label(label) else {
                progress.skip(&entity, &format!("invalid color '{}'", label.color));
                continue;
            };
            match self.destination.create_label(destination, &payload).await {
                Ok(()) => {
                    index.labels.insert(label.name.clone());
                    progress.result.labels_migrated += 1;
                    progress.migrated(&entity, &payload.color);
                }
                Err(e) => progress.error(&entity, &e),
            }
        }
    }

    /// Create the milestones, remembering their destination numbers
    async fn migrate_milestones(
        &self,
        repo: &RepositoryDescriptor,
        destination: &str,
        index: &mut DestinationIndex,
        progress: &mut Progress<'_>,
    ) {
        let mut milestones = match self.source.list_milestones(repo.source_id).await {
            Ok(milestones) => milestones,
            Err(e) => return progress.error("milestones", &e),
        };
        milestones.sort_by(|a, b| a.title.cmp(&b.title));
        for milestone in &milestones {
            let entity = format!("milestone '{}'", milestone.title);
            let payload = map_milestone(milestone);
            match self.destination.create_milestone(destination, &payload).await {
                Ok(number) => {
                    index.milestones.insert(milestone.title.clone(), number);
                    progress.result.milestones_migrated += 1;
                    progress.migrated(&entity, &format!("#{number}"));
                }
                Err(e) => progress.error(&entity, &e),
            }
        }
    }

    /// Create the issues, closing the ones closed on the source
    async fn migrate_issues(
        &self,
        repo: &RepositoryDescriptor,
        destination: &str,
        index: &DestinationIndex,
        progress: &mut Progress<'_>,
    ) {
        let mut issues = match self.source.list_issues(repo.source_id).await {
            Ok(issues) => issues,
            Err(e) => return progress.error("issues", &e),
        };
        issues.sort_by_key(|issue| issue.iid);
        for issue in &issues {
            let entity = format!("issue #{}", issue.iid);
            let record = map_issue(issue);
            let Some(number) = self
                .create_issue(destination, &record, index, &entity, progress)
                .await
            else {
                continue;
            };
            progress.result.issues_migrated += 1;
            progress.migrated(&entity, &format!("created #{number}"));
            if record.state == IssueState::Closed {
                if let Err(e) = self.destination.close_issue(destination, number).await {
                    progress.warning(&entity, &e);
                }
            }
            self.copy_notes(
                repo,
                destination,
                Noteable::Issue(issue.iid),
                number,
                &entity,
                progress,
            )
            .await;
        }
    }

    /// Turn each merge request into a pull request, or a closed issue when a branch is gone
    async fn migrate_merge_requests(
        &self,
        repo: &RepositoryDescriptor,
        destination: &str,
        index: &DestinationIndex,
        progress: &mut Progress<'_>,
    ) {
        let mut merge_requests = match self.source.list_merge_requests(repo.source_id).await {
            Ok(merge_requests) => merge_requests,
            Err(e) => return progress.error("merge requests", &e),
        };
        merge_requests.sort_by_key(|mr| mr.iid);
        for merge_request in &merge_requests {
            let entity = format!("merge request !{}", merge_request.iid);
            let branches = match self.branch_existence(destination, merge_request).await {
                Ok(branches) => branches,
                Err(e) => {
                    progress.error(&entity, &e);
                    continue;
                }
            };
            let number = match map_merge_request(merge_request, branches) {
                MergeRequestMapping::PullRequest(pull_request) => {
                    self.open_pull_request(destination, &pull_request, index, &entity, progress)
                        .await
                }
                MergeRequestMapping::FallbackIssue(issue) => {
                    self.open_fallback_issue(destination, &issue, index, &entity, progress)
                        .await
                }
            };
            if let Some(number) = number {
                self.copy_notes(
                    repo,
                    destination,
                    Noteable::MergeRequest(merge_request.iid),
                    number,
                    &entity,
                    progress,
                )
                .await;
            }
        }
    }

    /// Check both branches of a merge request on the destination
    async fn branch_existence(
        &self,
        destination: &str,
        merge_request: &MergeRequestRecord,
    ) -> Result<BranchExistence, MigrateError> {
        Ok(BranchExistence {
            source_branch_exists: self
                .destination
                .branch_exists(destination, &merge_request.source_branch)
                .await?,
            target_branch_exists: self
                .destination
                .branch_exists(destination, &merge_request.target_branch)
                .await?,
        })
    }

    /// Create an issue with the associations that exist on the destination
    async fn create_issue(
        &self,
        destination: &str,
        record: &IssueRecord,
        index: &DestinationIndex,
        entity: &str,
        progress: &mut Progress<'_>,
    ) -> Option<u64> {
        let (associations, dropped) = index.resolve(&record.labels, record.milestone.as_deref());
        for association in &dropped {
            progress.dropped(entity, association);
        }
        match self
            .destination
            .create_issue(destination, record, &associations)
            .await
        {
            Ok(number) => Some(number),
            Err(e) => {
                progress.error(entity, &e);
                None
            }
        }
    }

    /// Open a pull request, then attach labels and close it like the source
    async fn open_pull_request(
        &self,
        destination: &str,
        pull_request: &PullRequestPayload,
        index: &DestinationIndex,
        entity: &str,
        progress: &mut Progress<'_>,
    ) -> Option<u64> {
        let number = match self
            .destination
            .create_pull_request(destination, pull_request)
            .await
        {
            Ok(number) => number,
            Err(e) => {
                progress.error(entity, &e);
                return None;
            }
        };
        progress.result.mrs_migrated_as_pr += 1;
        progress.migrated(entity, &format!("pull request #{number}"));

        let (associations, dropped) =
            index.resolve(&pull_request.labels, pull_request.milestone.as_deref());
        for association in &dropped {
            progress.dropped(entity, association);
        }
        if let Err(e) = self
            .destination
            .assign(destination, number, &associations)
            .await
        {
            progress.warning(entity, &e);
        }
        if !pull_request.state.is_open() {
            if let Err(e) = self
                .destination
                .close_pull_request(destination, number)
                .await
            {
                progress.warning(entity, &e);
            }
        }
        Some(number)
    }

    /// Create the issue standing in for a merge request, it only counts once closed
    async fn open_fallback_issue(
        &self,
        destination: &str,
        issue: &IssueRecord,
        index: &DestinationIndex,
        entity: &str,
        progress: &mut Progress<'_>,
    ) -> Option<u64> {
        let number = self
            .create_issue(destination, issue, index, entity, progress)
            .await?;
        match self.destination.close_issue(destination, number).await {
            Ok(()) => {
                progress.result.mrs_migrated_as_issue += 1;
                progress.migrated(entity, &format!("closed issue #{number}"));
            }
            Err(e) => progress.error(entity, &e),
        }
        Some(number)
    }

    /// Copy the user comments of a source issue or merge request
    async fn copy_notes(
        &self,
        repo: &RepositoryDescriptor,
        destination: &str,
        noteable: Noteable,
        number: u64,
        entity: &str,
        progress: &mut Progress<'_>,
    ) {
        if !self.config.steps.comments {
            return;
        }
        let notes: Result<Vec<SourceNote>, MigrateError> = match noteable {
            Noteable::Issue(iid) => self.source.list_issue_notes(repo.source_id, iid).await,
            Noteable::MergeRequest(iid) => {
                self.source
                    .list_merge_request_notes(repo.source_id, iid)
                    .await
            }
        };
        let notes = match notes {
            Ok(notes) => notes,
            Err(e) => return progress.warning(entity, &e),
        };
        for body in notes.iter().filter_map(map_note) {
            if let Err(e) = self
                .destination
                .create_comment(destination, number, &body)
                .await
            {
                progress.warning(entity, &e);
            }
        }
    }
}
