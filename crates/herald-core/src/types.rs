use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pull request as seen by the reminder jobs.
///
/// # Examples
///
/// ```
/// use herald_core::PullRequest;
///
/// let pr = PullRequest {
///     number: 7,
///     title: "Add login page".into(),
///     html_url: "https://github.com/acme/web/pull/7".into(),
///     author: "alice".into(),
///     draft: false,
///     created_at: None,
///     base_branch: "main".into(),
///     requested_reviewers: vec!["bob".into()],
/// };
/// assert_eq!(pr.requested_reviewers.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// PR number within the repository.
    pub number: u64,
    /// PR title.
    pub title: String,
    /// Browser URL of the PR.
    pub html_url: String,
    /// Login of the PR author.
    pub author: String,
    /// Whether the PR is still a draft.
    pub draft: bool,
    /// When the PR was opened.
    pub created_at: Option<DateTime<Utc>>,
    /// Name of the branch the PR merges into.
    pub base_branch: String,
    /// Logins of reviewers whose review is still requested.
    #[serde(default)]
    pub requested_reviewers: Vec<String>,
}

/// A single submitted review on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEvent {
    /// Login of the reviewer.
    pub reviewer: String,
    /// Review verdict.
    pub state: ReviewState,
    /// Review body, if the reviewer wrote one.
    pub body: Option<String>,
    /// PR the review belongs to.
    pub pr_number: u64,
    /// Submission time. Pending reviews have none.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Review verdict as reported by the GitHub review API.
///
/// Unknown API values are kept verbatim in [`ReviewState::Other`].
///
/// # Examples
///
/// ```
/// use herald_core::ReviewState;
///
/// let state: ReviewState = serde_json::from_str("\"CHANGES_REQUESTED\"").unwrap();
/// assert_eq!(state, ReviewState::ChangesRequested);
/// assert_eq!(state.label(), "Changes Requested");
///
/// let pending = ReviewState::from("PENDING");
/// assert_eq!(pending.label(), "pending");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReviewState {
    /// The reviewer approved the changes.
    Approved,
    /// The reviewer asked for changes.
    ChangesRequested,
    /// The reviewer left comments without a verdict.
    Commented,
    /// A previous review was dismissed.
    Dismissed,
    /// Any other state string returned by the API.
    Other(String),
}

impl ReviewState {
    /// The raw API spelling of this state.
    pub fn as_api_str(&self) -> &str {
        match self {
            ReviewState::Approved => "APPROVED",
            ReviewState::ChangesRequested => "CHANGES_REQUESTED",
            ReviewState::Commented => "COMMENTED",
            ReviewState::Dismissed => "DISMISSED",
            ReviewState::Other(raw) => raw,
        }
    }

    /// Human-readable label used in reviewer tags.
    ///
    /// Only the three verdicts have a label of their own; everything else
    /// falls back to the lower-cased API string.
    pub fn label(&self) -> String {
        match self {
            ReviewState::Approved => "Approved".into(),
            ReviewState::ChangesRequested => "Changes Requested".into(),
            ReviewState::Commented => "Commented".into(),
            other => other.as_api_str().to_lowercase(),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ReviewState::Approved)
    }
}

impl From<&str> for ReviewState {
    fn from(raw: &str) -> Self {
        match raw {
            "APPROVED" => ReviewState::Approved,
            "CHANGES_REQUESTED" => ReviewState::ChangesRequested,
            "COMMENTED" => ReviewState::Commented,
            "DISMISSED" => ReviewState::Dismissed,
            other => ReviewState::Other(other.to_string()),
        }
    }
}

impl From<String> for ReviewState {
    fn from(raw: String) -> Self {
        ReviewState::from(raw.as_str())
    }
}

impl From<ReviewState> for String {
    fn from(state: ReviewState) -> Self {
        state.as_api_str().to_string()
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// Repository approval rules that decide whether a PR may be merged.
///
/// The default is the conservative policy used when the lookups fail:
/// no approvals required, collaborators assumed to exist.
///
/// # Examples
///
/// ```
/// use herald_core::ApprovalPolicy;
///
/// let policy = ApprovalPolicy::default();
/// assert_eq!(policy.required_approving_review_count, 0);
/// assert!(policy.has_collaborators);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalPolicy {
    /// Minimum number of approving reviews from branch protection.
    pub required_approving_review_count: u32,
    /// Whether branch protection demands a code-owner review.
    pub require_code_owner_reviews: bool,
    /// Whether the repository has any collaborators at all.
    pub has_collaborators: bool,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            required_approving_review_count: 0,
            require_code_owner_reviews: false,
            has_collaborators: true,
        }
    }
}
