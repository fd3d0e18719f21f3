//! Pure conversions from source records to destination payloads
//!
//! Nothing in here performs I/O: the migrator decides what to do with a skipped
//! label or a merge request that can't become a pull request.
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{
    IssueState, MergeRequestRecord, MergeRequestState, SourceIssue, SourceLabel, SourceMilestone,
    SourceNote,
};

/// Maximum number of characters GitHub accepts in an issue or pull request body
pub const MAX_BODY_CHARS: usize = 65_536;

/// Maximum number of characters GitHub accepts in a label description
const MAX_LABEL_DESCRIPTION_CHARS: usize = 100;

/// Appended to bodies cut at [`MAX_BODY_CHARS`]
const TRUNCATION_MARKER: &str = "\n\n_[truncated during migration]_";

/// Inserted after `@` so a source username doesn't mention a destination user
const ZERO_WIDTH_SPACE: char = '\u{200B}';

/// Label ready to be created on the destination
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LabelPayload {
    /// Label name
    pub name: String,

    /// Six hex digits, without `#`
    pub color: String,

    /// Label description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Milestone ready to be created on the destination
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MilestonePayload {
    /// Milestone title
    pub title: String,

    /// Sanitized description
    pub description: String,

    /// Open or closed
    pub state: IssueState,

    /// ISO 8601 due date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<String>,
}

/// Issue produced from a source issue or from an un-migratable merge request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRecord {
    /// Source iid (issue or merge request)
    pub iid: u64,

    /// Title
    pub title: String,

    /// Sanitized body
    pub description: String,

    /// Source label names
    pub labels: BTreeSet<String>,

    /// Source milestone title
    pub milestone: Option<String>,

    /// State the destination issue must end in
    pub state: IssueState,
}

/// Pull request produced from a merge request whose branches both exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestPayload {
    /// Source iid
    pub iid: u64,

    /// Title
    pub title: String,

    /// Sanitized body
    pub body: String,

    /// Branch holding the change
    pub head: String,

    /// Branch the change targets
    pub base: String,

    /// Source label names
    pub labels: BTreeSet<String>,

    /// Source milestone title
    pub milestone: Option<String>,

    /// Source state, a closed or merged request is closed after creation
    pub state: MergeRequestState,
}

/// Presence of both merge request branches in the mirrored repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchExistence {
    /// Source branch is present
    pub source_branch_exists: bool,

    /// Target branch is present
    pub target_branch_exists: bool,
}

impl BranchExistence {
    /// A pull request can only be opened when both branches exist
    pub fn mergeable(&self) -> bool {
        self.source_branch_exists && self.target_branch_exists
    }
}

/// Outcome of [`map_merge_request`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeRequestMapping {
    /// Both branches exist
    PullRequest(PullRequestPayload),

    /// At least one branch is gone, keep the content as a closed issue
    FallbackIssue(IssueRecord),
}

/// Labels and milestone associations the destination accepts
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Associations {
    /// Label names that exist on the destination
    pub labels: Vec<String>,

    /// Destination milestone number
    pub milestone: Option<u64>,
}

/// What the destination repository already holds, built while migrating labels and milestones
#[derive(Debug, Default, Clone)]
pub struct DestinationIndex {
    /// Created label names
    pub labels: BTreeSet<String>,

    /// Milestone title to destination number
    pub milestones: BTreeMap<String, u64>,
}

impl DestinationIndex {
    /// Keep only the associations that were created, returning the dropped names
    pub fn resolve(
        &self,
        labels: &BTreeSet<String>,
        milestone: Option<&str>,
    ) -> (Associations, Vec<String>) {
        let mut dropped = vec![];
        let mut kept = vec![];
        for label in labels {
            if self.labels.contains(label) {
                kept.push(label.clone());
            } else {
                dropped.push(format!("label '{label}'"));
            }
        }
        let milestone = milestone.and_then(|title| match self.milestones.get(title) {
            Some(number) => Some(*number),
            None => {
                dropped.push(format!("milestone '{title}'"));
                None
            }
        });
        (
            Associations {
                labels: kept,
                milestone,
            },
            dropped,
        )
    }
}

/// Convert a label, `None` when its color isn't a six digit hex value
pub fn map_label(label: &SourceLabel) -> Option<LabelPayload> {
    let color = label.color.strip_prefix('#').unwrap_or(&label.color);
    if color.len() != 6 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let description = label
        .description
        .as_deref()
        .map(|d| {
            sanitize_single_line(d)
                .chars()
                .take(MAX_LABEL_DESCRIPTION_CHARS)
                .collect::<String>()
        })
        .filter(|d| !d.is_empty());
    Some(LabelPayload {
        name: label.name.clone(),
        color: color.to_string(),
        description,
    })
}

/// Convert a milestone
pub fn map_milestone(milestone: &SourceMilestone) -> MilestonePayload {
    MilestonePayload {
        title: sanitize_single_line(&milestone.title),
        description: sanitize_description(milestone.description.as_deref().unwrap_or_default()),
        state: milestone.state,
        due_on: milestone
            .due_date
            .as_ref()
            .map(|date| format!("{date}T00:00:00Z")),
    }
}

/// Convert an issue
pub fn map_issue(issue: &SourceIssue) -> IssueRecord {
    IssueRecord {
        iid: issue.iid,
        title: sanitize_single_line(&issue.title),
        description: sanitize_description(issue.description.as_deref().unwrap_or_default()),
        labels: issue.labels.iter().cloned().collect(),
        milestone: issue.milestone.clone(),
        state: issue.state,
    }
}

/// Convert a merge request, given which of its branches exist on the destination
pub fn map_merge_request(
    merge_request: &MergeRequestRecord,
    branches: BranchExistence,
) -> MergeRequestMapping {
    let labels: BTreeSet<String> = merge_request.labels.iter().cloned().collect();
    if branches.mergeable() {
        return MergeRequestMapping::PullRequest(PullRequestPayload {
            iid: merge_request.iid,
            title: sanitize_single_line(&merge_request.title),
            body: sanitize_description(
                merge_request.description.as_deref().unwrap_or_default(),
            ),
            head: merge_request.source_branch.clone(),
            base: merge_request.target_branch.clone(),
            labels,
            milestone: merge_request.milestone.clone(),
            state: merge_request.state,
        });
    }
    MergeRequestMapping::FallbackIssue(IssueRecord {
        iid: merge_request.iid,
        title: sanitize_single_line(&format!(
            "[Unmigrated MR !{}] {}",
            merge_request.iid, merge_request.title
        )),
        description: sanitize_description(&fallback_body(merge_request, branches)),
        labels,
        milestone: merge_request.milestone.clone(),
        state: IssueState::Closed,
    })
}

/// Convert a comment, `None` for system notes and empty bodies
pub fn map_note(note: &SourceNote) -> Option<String> {
    if note.system || note.body.trim().is_empty() {
        return None;
    }
    Some(sanitize_description(&format!(
        "_Originally posted by {} on GitLab_\n\n{}",
        note.author, note.body
    )))
}

/// Body of the closed issue standing in for a merge request
fn fallback_body(merge_request: &MergeRequestRecord, branches: BranchExistence) -> String {
    let source = format!("the source branch `{}`", merge_request.source_branch);
    let target = format!("the target branch `{}`", merge_request.target_branch);
    let missing = match (branches.source_branch_exists, branches.target_branch_exists) {
        (false, false) => format!("{source} and {target} no longer exist"),
        (false, true) => format!("{source} no longer exists"),
        _ => format!("{target} no longer exists"),
    };
    let description = match merge_request.description.as_deref() {
        Some(d) if !d.trim().is_empty() => d,
        _ => "_No description._",
    };
    format!(
        "> **Reconstructed merge request.** GitLab merge request !{iid} could not be migrated \
         as a pull request because {missing} in the migrated repository. This issue keeps its \
         content and was closed on purpose.\n\n\
         | Field | Value |\n\
         |---|---|\n\
         | Original title | {title} |\n\
         | Original state | {state} |\n\
         | Source branch | `{source_branch}` |\n\
         | Target branch | `{target_branch}` |\n\
         | Original URL | {url} |\n\n\
         ### Original description\n\n{description}",
        iid = merge_request.iid,
        title = sanitize_single_line(&merge_request.title).replace('|', "\\|"),
        state = merge_request.state,
        source_branch = merge_request.source_branch,
        target_branch = merge_request.target_branch,
        url = merge_request.web_url,
    )
}

/// Make a markdown body safe for the destination
///
/// Control characters other than line breaks and tabs are removed, `@mentions`
/// are broken with a zero width space, and the result is capped at
/// [`MAX_BODY_CHARS`]. Applying it twice gives the same result as once.
pub fn sanitize_description(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().filter(|c| !is_stripped_control(*c)).peekable();
    let mut previous: Option<char> = None;
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '@'
            && previous.map_or(true, |p| !is_word_char(p))
            && chars.peek().is_some_and(|next| is_word_char(*next))
        {
            out.push(ZERO_WIDTH_SPACE);
        }
        previous = Some(c);
    }
    truncate_body(out)
}

/// Remove every control character, including line breaks
pub fn sanitize_single_line(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// ASCII control characters that the destination rejects in bodies
fn is_stripped_control(c: char) -> bool {
    c.is_ascii_control() && !matches!(c, '\n' | '\r' | '\t')
}

/// Characters that can appear in a username
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Cap the body length, keeping room for the marker
fn truncate_body(body: String) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        return body;
    }
    let keep = MAX_BODY_CHARS - TRUNCATION_MARKER.chars().count();
    let mut truncated: String = body.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str, color: &str) -> SourceLabel {
        SourceLabel {
            name: name.to_string(),
            color: color.to_string(),
            description: None,
        }
    }

    fn merge_request(state: MergeRequestState) -> MergeRequestRecord {
        MergeRequestRecord {
            iid: 7,
            title: "Add login page".to_string(),
            description: Some("Implements the login form".to_string()),
            source_branch: "feature/login".to_string(),
            target_branch: "main".to_string(),
            labels: vec!["frontend".to_string()],
            milestone: Some("v1.0".to_string()),
            state,
            web_url: "https://gitlab.example.com/group/app/-/merge_requests/7".to_string(),
        }
    }

    const BOTH: BranchExistence = BranchExistence {
        source_branch_exists: true,
        target_branch_exists: true,
    };

    #[test]
    fn valid_colors_pass_through() {
        for color in ["#FF0000", "#00ff7f", "a1B2c3"] {
            let payload = map_label(&label("bug", color)).unwrap();
            assert_eq!(payload.name, "bug");
            assert_eq!(payload.color, color.trim_start_matches('#'));
        }
    }

    #[test]
    fn invalid_colors_are_skipped() {
        for color in ["red", "#FFF", "#GG0000", "", "#FF00000"] {
            assert_eq!(map_label(&label("bug", color)), None, "{color}");
        }
    }

    #[test]
    fn label_description_is_capped() {
        let mut source = label("docs", "#428BCA");
        source.description = Some("x".repeat(300));
        let payload = map_label(&source).unwrap();
        assert_eq!(payload.description.unwrap().len(), 100);
    }

    #[test]
    fn milestone_due_date_becomes_timestamp() {
        let payload = map_milestone(&SourceMilestone {
            title: "v1.0".to_string(),
            description: None,
            state: IssueState::Closed,
            due_date: Some("2024-05-01".to_string()),
        });
        assert_eq!(payload.due_on.as_deref(), Some("2024-05-01T00:00:00Z"));
        assert_eq!(payload.state, IssueState::Closed);
        assert_eq!(payload.description, "");
    }

    #[test]
    fn both_branches_give_a_pull_request() {
        for state in [
            MergeRequestState::Opened,
            MergeRequestState::Closed,
            MergeRequestState::Merged,
        ] {
            match map_merge_request(&merge_request(state), BOTH) {
                MergeRequestMapping::PullRequest(pr) => {
                    assert_eq!(pr.head, "feature/login");
                    assert_eq!(pr.base, "main");
                    assert_eq!(pr.state, state);
                    assert!(pr.labels.contains("frontend"));
                }
                other => panic!("expected a pull request, got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_branch_gives_a_closed_issue() {
        let cases = [
            (false, true, "the source branch `feature/login` no longer exists"),
            (true, false, "the target branch `main` no longer exists"),
            (false, false, "`feature/login` and the target branch `main` no longer exist"),
        ];
        for state in [MergeRequestState::Opened, MergeRequestState::Merged] {
            for (source_branch_exists, target_branch_exists, reason) in cases {
                let branches = BranchExistence {
                    source_branch_exists,
                    target_branch_exists,
                };
                let MergeRequestMapping::FallbackIssue(issue) =
                    map_merge_request(&merge_request(state), branches)
                else {
                    panic!("expected a fallback issue");
                };
                assert_eq!(issue.state, IssueState::Closed);
                assert_eq!(issue.title, "[Unmigrated MR !7] Add login page");
                assert!(issue.description.contains("Reconstructed merge request"));
                assert!(issue.description.contains("Add login page"));
                assert!(issue.description.contains("Implements the login form"));
                assert!(issue.description.contains("`feature/login`"));
                assert!(issue.description.contains("`main`"));
                assert!(issue.description.contains(&state.to_string()));
                assert!(issue.description.contains(reason), "{reason}");
            }
        }
    }

    #[test]
    fn fallback_table_row_stays_on_one_line() {
        let mut record = merge_request(MergeRequestState::Closed);
        record.title = "Fix `login`\n| page\u{7}".to_string();
        let branches = BranchExistence {
            source_branch_exists: false,
            target_branch_exists: true,
        };
        let MergeRequestMapping::FallbackIssue(issue) = map_merge_request(&record, branches)
        else {
            panic!("expected a fallback issue");
        };
        assert!(
            issue
                .description
                .lines()
                .any(|line| line == "| Original title | Fix `login`\\| page |"),
            "{}",
            issue.description
        );
    }

    #[test]
    fn sanitize_strips_controls_and_keeps_line_breaks() {
        assert_eq!(
            sanitize_description("line\u{0}one\r\n\tline\u{7f}two\u{1b}"),
            "lineone\r\n\tlinetwo"
        );
    }

    #[test]
    fn sanitize_breaks_mentions_but_not_emails() {
        let sanitized = sanitize_description("cc @alice, (@bob) and mail me at dev@example.com");
        assert!(sanitized.contains("@\u{200B}alice"));
        assert!(sanitized.contains("(@\u{200B}bob)"));
        assert!(sanitized.contains("dev@example.com"));
    }

    #[test]
    fn sanitize_caps_length() {
        let sanitized = sanitize_description(&"a".repeat(MAX_BODY_CHARS * 2));
        assert_eq!(sanitized.chars().count(), MAX_BODY_CHARS);
        assert!(sanitized.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let long_mention = format!("{}@carol", "b".repeat(MAX_BODY_CHARS));
        let inputs = [
            "",
            "plain text",
            "@@double and @ alone @",
            "ping @dave\u{0} please\u{1}",
            "ünïcödé @émile",
            long_mention.as_str(),
        ];
        for input in inputs {
            let once = sanitize_description(input);
            assert_eq!(sanitize_description(&once), once, "{input:?}");
        }
    }

    #[test]
    fn unknown_associations_are_dropped() {
        let index = DestinationIndex {
            labels: ["bug".to_string()].into_iter().collect(),
            milestones: [("v1.0".to_string(), 3)].into_iter().collect(),
        };
        let labels = ["bug".to_string(), "bad-color".to_string()]
            .into_iter()
            .collect();
        let (associations, dropped) = index.resolve(&labels, Some("v2.0"));
        assert_eq!(associations.labels, vec!["bug".to_string()]);
        assert_eq!(associations.milestone, None);
        assert_eq!(dropped.len(), 2);

        let (associations, dropped) = index.resolve(&BTreeSet::new(), Some("v1.0"));
        assert_eq!(associations.milestone, Some(3));
        assert!(dropped.is_empty());
    }

    #[test]
    fn system_notes_are_not_copied() {
        let mut note = SourceNote {
            author: "alice".to_string(),
            body: "changed the description".to_string(),
            system: true,
        };
        assert_eq!(map_note(&note), None);
        note.system = false;
        let body = map_note(&note).unwrap();
        assert!(body.starts_with("_Originally posted by alice on GitLab_"));
    }
}
