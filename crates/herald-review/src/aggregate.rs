use std::collections::HashMap;

use herald_core::{ApprovalPolicy, MentionDirectory, PullRequest, ReviewEvent, ReviewState};
use log::debug;
use serde::Serialize;

/// Latest review state of one reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerStatus {
    pub reviewer: String,
    pub state: ReviewState,
}

/// Review status of a pull request, ready to be rendered.
///
/// # Examples
///
/// ```
/// use herald_core::{ApprovalPolicy, MentionDirectory, PullRequest};
/// use herald_review::aggregate::ReviewStatusAggregator;
///
/// let pr = PullRequest {
///     number: 1,
///     title: "Fix".into(),
///     html_url: "https://github.com/acme/web/pull/1".into(),
///     author: "alice".into(),
///     draft: false,
///     created_at: None,
///     base_branch: "main".into(),
///     requested_reviewers: vec!["bob".into()],
/// };
/// let mentions = MentionDirectory::default();
/// let summary = ReviewStatusAggregator::new(&mentions).classify(
///     &pr,
///     &[],
///     &pr.requested_reviewers,
///     &ApprovalPolicy::default(),
/// );
/// assert_eq!(summary.tags, vec!["<@bob>(X)"]);
/// assert!(!summary.can_merge);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    /// Reviewers with at least one review, in first-seen order.
    pub responded: Vec<ReviewerStatus>,
    /// Requested reviewers without any review.
    pub not_started: Vec<String>,
    /// Rendered reviewer tags: responded first, then not started.
    pub tags: Vec<String>,
    pub approved_count: usize,
    pub has_requested_reviewers: bool,
    pub has_collaborators: bool,
    pub is_approval_complete: bool,
    pub all_requested_approved: bool,
    pub can_merge: bool,
}

impl ReviewSummary {
    /// Latest state of `reviewer`, if they reviewed at all.
    pub fn state_of(&self, reviewer: &str) -> Option<&ReviewState> {
        self.responded
            .iter()
            .find(|s| s.reviewer == reviewer)
            .map(|s| &s.state)
    }
}

/// Turns review events into a [`ReviewSummary`].
pub struct ReviewStatusAggregator<'a> {
    mentions: &'a MentionDirectory,
}

impl<'a> ReviewStatusAggregator<'a> {
    pub fn new(mentions: &'a MentionDirectory) -> Self {
        Self { mentions }
    }

    /// Classify the review status of `pr`.
    ///
    /// The latest review per reviewer wins. Reviews are ordered by
    /// submission time; reviews without one go last in delivery order.
    /// The author's own reviews are ignored.
    pub fn classify(
        &self,
        pr: &PullRequest,
        reviews: &[ReviewEvent],
        requested_reviewers: &[String],
        policy: &ApprovalPolicy,
    ) -> ReviewSummary {
        let responded = latest_states(pr, reviews);
        let index: HashMap<&str, &ReviewState> = responded
            .iter()
            .map(|s| (s.reviewer.as_str(), &s.state))
            .collect();

        let not_started: Vec<String> = requested_reviewers
            .iter()
            .filter(|r| !index.contains_key(r.as_str()) && **r != pr.author)
            .cloned()
            .collect();

        let mut tags: Vec<String> = responded
            .iter()
            .map(|s| self.status_tag(&s.reviewer, &s.state))
            .collect();
        tags.extend(
            not_started
                .iter()
                .map(|r| format!("{}(X)", self.mentions.lookup(r).tag())),
        );

        let approved_count = responded.iter().filter(|s| s.state.is_approved()).count();
        let required = policy.required_approving_review_count as usize;
        let is_approval_complete =
            !policy.has_collaborators || required == 0 || approved_count >= required;
        let all_requested_approved = requested_reviewers
            .iter()
            .all(|r| index.get(r.as_str()).is_some_and(|s| s.is_approved()));
        let can_merge = is_approval_complete && not_started.is_empty();

        debug!(
            "PR #{}: responded={:?} not_started={:?} approved={approved_count}/{required} \
             complete={is_approval_complete} all_requested_approved={all_requested_approved} \
             can_merge={can_merge}",
            pr.number,
            responded
                .iter()
                .map(|s| format!("{}={}", s.reviewer, s.state))
                .collect::<Vec<_>>(),
            not_started,
        );

        ReviewSummary {
            responded,
            not_started,
            tags,
            approved_count,
            has_requested_reviewers: !requested_reviewers.is_empty(),
            has_collaborators: policy.has_collaborators,
            is_approval_complete,
            all_requested_approved,
            can_merge,
        }
    }

    /// Approved reviewers are named without a ping; everyone else is pinged.
    fn status_tag(&self, reviewer: &str, state: &ReviewState) -> String {
        let mention = self.mentions.lookup(reviewer);
        if state.is_approved() {
            format!("{}({})", mention.display_name, state.label())
        } else {
            format!("{}({})", mention.tag(), state.label())
        }
    }
}

/// Latest state per reviewer, excluding the PR author, in first-seen order.
pub(crate) fn latest_states(pr: &PullRequest, reviews: &[ReviewEvent]) -> Vec<ReviewerStatus> {
    let mut ordered: Vec<&ReviewEvent> = reviews.iter().collect();
    // stable: equal timestamps keep delivery order
    ordered.sort_by_key(|r| (r.submitted_at.is_none(), r.submitted_at));

    let mut statuses: Vec<ReviewerStatus> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for review in ordered {
        if review.reviewer == pr.author {
            continue;
        }
        match positions.get(review.reviewer.as_str()) {
            Some(&i) => statuses[i].state = review.state.clone(),
            None => {
                positions.insert(review.reviewer.as_str(), statuses.len());
                statuses.push(ReviewerStatus {
                    reviewer: review.reviewer.clone(),
                    state: review.state.clone(),
                });
            }
        }
    }
    statuses
}
