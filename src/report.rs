//! Per repository results, the final report and the append-only run log
use std::{
    fmt,
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use log::warn;

use crate::errors::{MigrateError, MigrateErrorKind};

/// How far the migration of a repository went
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RepoStage {
    /// Nothing written yet
    #[default]
    Pending,

    /// Git content being mirrored
    CodeMigrating,

    /// Labels, milestones, issues and merge requests being migrated
    MetadataMigrating,

    /// Every step was attempted
    Done,
}

impl fmt::Display for RepoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoStage::Pending => write!(f, "pending"),
            RepoStage::CodeMigrating => write!(f, "code migrating"),
            RepoStage::MetadataMigrating => write!(f, "metadata migrating"),
            RepoStage::Done => write!(f, "done"),
        }
    }
}

/// One failed or skipped entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Classification
    pub kind: MigrateErrorKind,

    /// What was being migrated (`code`, `issue #3`, `label 'bug'`...)
    pub entity: String,

    /// Verbatim error message
    pub message: String,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.entity, self.message)
    }
}

/// Outcome of the migration of one repository
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    /// Source repository name
    pub repo_name: String,

    /// Last stage reached
    pub stage: RepoStage,

    /// Whether the mirror succeeded
    pub code_migrated: bool,

    /// Labels created
    pub labels_migrated: usize,

    /// Milestones created
    pub milestones_migrated: usize,

    /// Issues created
    pub issues_migrated: usize,

    /// Merge requests that became pull requests
    pub mrs_migrated_as_pr: usize,

    /// Merge requests that became closed issues
    pub mrs_migrated_as_issue: usize,

    /// Failures, in the order they happened
    pub errors: Vec<ErrorRecord>,

    /// Entities left out because the destination can't represent them
    pub skipped: Vec<ErrorRecord>,

    /// Follow-up steps that failed after the entity was created
    pub warnings: Vec<String>,
}

impl MigrationResult {
    /// Empty result for a repository
    pub fn new(repo_name: &str) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            ..Default::default()
        }
    }

    /// Record a failure against an entity
    pub(crate) fn push_error(&mut self, entity: &str, error: &MigrateError) {
        self.errors.push(ErrorRecord {
            kind: error.kind(),
            entity: entity.to_string(),
            message: error.to_string(),
        });
    }

    /// Record an entity that was not migrated
    pub(crate) fn push_skip(&mut self, entity: &str, reason: &str) {
        self.skipped.push(ErrorRecord {
            kind: MigrateErrorKind::ValidationSkip,
            entity: entity.to_string(),
            message: reason.to_string(),
        });
    }

    /// Errors of a given kind
    pub fn errors_of(&self, kind: MigrateErrorKind) -> impl Iterator<Item = &ErrorRecord> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }
}

impl fmt::Display for MigrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {}, code {}",
            self.repo_name,
            self.stage,
            if self.code_migrated {
                "migrated"
            } else {
                "NOT migrated"
            }
        )?;
        writeln!(
            f,
            "  labels: {}, milestones: {}, issues: {}, merge requests: {} as pull request, {} as issue",
            self.labels_migrated,
            self.milestones_migrated,
            self.issues_migrated,
            self.mrs_migrated_as_pr,
            self.mrs_migrated_as_issue
        )?;
        if !self.errors.is_empty() {
            writeln!(f, "  errors ({}):", self.errors.len())?;
            for error in &self.errors {
                writeln!(f, "    {error}")?;
            }
        }
        if !self.skipped.is_empty() {
            writeln!(f, "  skipped ({}):", self.skipped.len())?;
            for skip in &self.skipped {
                writeln!(f, "    {}: {}", skip.entity, skip.message)?;
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  warnings ({}):", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        Ok(())
    }
}

/// Results of a whole run, in processing order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per repository
    pub results: Vec<MigrationResult>,
}

impl RunReport {
    /// Repositories that recorded at least one error
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.errors.is_empty()).count()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Migration report ===")?;
        for result in &self.results {
            writeln!(f)?;
            write!(f, "{result}")?;
        }
        writeln!(f)?;
        write!(
            f,
            "{} repositories processed, {} with errors",
            self.results.len(),
            self.failed()
        )
    }
}

/// Kind of a run log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// Entity written to the destination
    Migrated,

    /// Entity left out
    Skipped,

    /// Follow-up step failed
    Warning,

    /// Entity failed
    Error,
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::Migrated => write!(f, "migrated"),
            LogEvent::Skipped => write!(f, "skipped"),
            LogEvent::Warning => write!(f, "warning"),
            LogEvent::Error => write!(f, "error"),
        }
    }
}

/// Append-only, tab separated log of every migrated, skipped or failed entity
#[derive(Debug)]
pub struct RunLog {
    /// Opened in append mode
    file: File,
}

impl RunLog {
    /// Open the log, creating it if needed
    /// # Errors
    /// Error if the file can't be opened for writing
    pub fn open(path: &Path) -> Result<Self, MigrateError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                MigrateError::with_source(MigrateErrorKind::Io, e)
                    .with_text(&format!("Unable to open {}", path.display()))
            })?;
        Ok(Self { file })
    }

    /// Append one line, a write failure is logged and otherwise ignored
    pub fn record(&self, repo: &str, event: LogEvent, entity: &str, detail: &str) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let line = format!(
            "{timestamp}\t{}\t{event}\t{}\t{}\n",
            single_field(repo),
            single_field(entity),
            single_field(detail)
        );
        if let Err(e) = (&self.file).write_all(line.as_bytes()) {
            warn!("Unable to write to the run log: {e}");
        }
    }
}

/// Keep a value on one tab separated field
fn single_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_log_appends_tab_separated_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migration.log");
        {
            let log = RunLog::open(&path).unwrap();
            log.record("api", LogEvent::Migrated, "issue #1", "created #4");
        }
        let log = RunLog::open(&path).unwrap();
        log.record("api", LogEvent::Error, "code", "push\trejected\nby remote");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Vec<&str>> = contents.lines().map(|l| l.split('\t').collect()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0][1..], ["api", "migrated", "issue #1", "created #4"]);
        assert_eq!(lines[1][2..], ["error", "code", "push rejected by remote"]);
        assert!(lines[1][0].parse::<u64>().is_ok());
    }

    #[test]
    fn report_lists_errors_and_totals() {
        let mut failed = MigrationResult::new("api");
        failed.stage = RepoStage::Done;
        failed.push_error(
            "code",
            &MigrateError::new(MigrateErrorKind::Transfer).with_text("push rejected"),
        );
        failed.push_skip("label 'odd'", "invalid color 'red'");
        let mut clean = MigrationResult::new("web");
        clean.code_migrated = true;
        clean.mrs_migrated_as_pr = 2;

        let report = RunReport {
            results: vec![failed, clean],
        };
        assert_eq!(report.failed(), 1);
        let printed = report.to_string();
        assert!(printed.contains("api: done, code NOT migrated"));
        assert!(printed.contains("[TransferError] code: TransferError: push rejected"));
        assert!(printed.contains("label 'odd': invalid color 'red'"));
        assert!(printed.contains("2 as pull request"));
        assert!(printed.ends_with("2 repositories processed, 1 with errors"));
        assert_eq!(
            report.results[0]
                .errors_of(MigrateErrorKind::Transfer)
                .count(),
            1
        );
    }
}
