use std::path::Path;

use herald_core::{HeraldError, PullRequest, ReviewEvent};
use serde::Deserialize;

use crate::github::{RawPullRequest, RawReview};

/// PR actions that trigger the PR alarm.
pub const HANDLED_PR_ACTIONS: [&str; 4] = ["opened", "reopened", "synchronize", "ready_for_review"];

#[derive(Debug, Default, Deserialize)]
struct RawPayload {
    action: Option<String>,
    pull_request: Option<RawPullRequest>,
    review: Option<RawReview>,
}

/// The workflow event that started this run.
///
/// # Examples
///
/// ```
/// use herald_review::event::WorkflowEvent;
///
/// let event = WorkflowEvent::from_json(
///     "pull_request",
///     r#"{"action": "opened", "pull_request": {"number": 4, "title": "t", "html_url": "u", "user": {"login": "alice"}}}"#,
/// ).unwrap();
/// assert!(event.is_handled_pr_action());
/// assert_eq!(event.pull_request.unwrap().author, "alice");
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowEvent {
    /// `GITHUB_EVENT_NAME`, e.g. `pull_request` or `schedule`.
    pub name: String,
    pub action: Option<String>,
    pub pull_request: Option<PullRequest>,
    /// The submitted review, for `pull_request_review` events.
    pub review: Option<ReviewEvent>,
}

impl WorkflowEvent {
    /// Read the event payload written by the runner at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Event`] if the file cannot be read or parsed.
    pub fn load(name: &str, path: &Path) -> Result<Self, HeraldError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HeraldError::Event(format!("failed to read event payload {}: {e}", path.display()))
        })?;
        Self::from_json(name, &content)
    }

    /// Parse an event payload.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Event`] if the payload is not valid JSON.
    pub fn from_json(name: &str, json: &str) -> Result<Self, HeraldError> {
        let raw: RawPayload = serde_json::from_str(json)
            .map_err(|e| HeraldError::Event(format!("failed to parse event payload: {e}")))?;
        let pull_request: Option<PullRequest> = raw.pull_request.map(PullRequest::from);
        let review = match (&pull_request, raw.review) {
            (Some(pr), Some(review)) => Some(review.into_event(pr.number)),
            _ => None,
        };
        Ok(Self {
            name: name.to_string(),
            action: raw.action,
            pull_request,
            review,
        })
    }

    /// An event with no payload, for scheduled or manual runs.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            action: None,
            pull_request: None,
            review: None,
        }
    }

    /// Whether this is a `pull_request` event the PR alarm reacts to.
    pub fn is_handled_pr_action(&self) -> bool {
        self.name == "pull_request"
            && self
                .action
                .as_deref()
                .is_some_and(|a| HANDLED_PR_ACTIONS.contains(&a))
    }
}
