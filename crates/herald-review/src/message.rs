use herald_core::{MentionDirectory, MessageTemplates, PullRequest, ReviewEvent, ReviewState};

use crate::aggregate::ReviewSummary;

/// Which congratulation a mergeable PR gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Celebration {
    NoCollaborators,
    NoApprovalRequired,
    /// Approved, but nobody was requested as reviewer.
    ApprovedWithoutRequest,
    AllApproved,
    QuorumReached,
}

impl Celebration {
    /// Pick the phrasing for a mergeable PR, or `None` if it is still pending.
    ///
    /// # Examples
    ///
    /// ```
    /// use herald_review::message::Celebration;
    ///
    /// assert_eq!(Celebration::select(false, true, true, 0, true), None);
    /// assert_eq!(Celebration::select(true, false, true, 0, true), Some(Celebration::NoCollaborators));
    /// assert_eq!(Celebration::select(true, true, true, 2, false), Some(Celebration::QuorumReached));
    /// assert_eq!(
    ///     Celebration::select(true, true, false, 1, true),
    ///     Some(Celebration::ApprovedWithoutRequest)
    /// );
    /// ```
    pub fn select(
        can_merge: bool,
        has_collaborators: bool,
        has_requested_reviewers: bool,
        approved_count: usize,
        all_requested_approved: bool,
    ) -> Option<Self> {
        if !can_merge {
            return None;
        }
        Some(
            match (
                has_collaborators,
                approved_count > 0,
                has_requested_reviewers,
                all_requested_approved,
            ) {
                (false, _, _, _) => Celebration::NoCollaborators,
                (true, false, _, _) => Celebration::NoApprovalRequired,
                (true, true, false, _) => Celebration::ApprovedWithoutRequest,
                (true, true, true, true) => Celebration::AllApproved,
                (true, true, true, false) => Celebration::QuorumReached,
            },
        )
    }

    fn template(self, templates: &MessageTemplates) -> &str {
        match self {
            Celebration::NoCollaborators => &templates.no_collaborators,
            Celebration::NoApprovalRequired => &templates.no_approval_required,
            Celebration::ApprovedWithoutRequest => &templates.approved_without_request,
            Celebration::AllApproved => &templates.all_approved,
            Celebration::QuorumReached => &templates.quorum_reached,
        }
    }
}

/// Markdown link line used at the top of every PR message.
pub fn pr_link(pr: &PullRequest) -> String {
    format!("[[PR] {}](<{}>)", pr.title, pr.html_url)
}

/// Render the reminder line for one PR.
///
/// Mergeable PRs get a congratulation addressed to the author; everything
/// else lists the reviewer tags only.
pub fn render_pr_message(
    pr: &PullRequest,
    summary: &ReviewSummary,
    mentions: &MentionDirectory,
    templates: &MessageTemplates,
) -> String {
    let mut message = format!(
        "{}\n{} {}",
        pr_link(pr),
        templates.reviewers_label,
        summary.tags.join(", ")
    );

    let celebration = Celebration::select(
        summary.can_merge,
        summary.has_collaborators,
        summary.has_requested_reviewers,
        summary.approved_count,
        summary.all_requested_approved,
    );
    if let Some(celebration) = celebration {
        let author = mentions.lookup(&pr.author).tag();
        message.push('\n');
        message.push_str(&celebration.template(templates).replace("{author}", &author));
    }
    message
}

/// Short verdict shown when a single review is submitted.
pub fn verdict<'t>(state: &ReviewState, templates: &'t MessageTemplates) -> &'t str {
    match state {
        ReviewState::Approved => &templates.verdict_approved,
        ReviewState::ChangesRequested => &templates.verdict_changes_requested,
        ReviewState::Commented => &templates.verdict_commented,
        _ => &templates.verdict_unknown,
    }
}

/// Render the notification for a freshly submitted review.
///
/// `pending` are the reviewers still expected to act; they are pinged at
/// the end of the message.
pub fn render_review_submitted(
    pr: &PullRequest,
    review: &ReviewEvent,
    pending: &[String],
    mentions: &MentionDirectory,
    templates: &MessageTemplates,
) -> String {
    let reviewer = mentions.lookup(&review.reviewer);
    let body = review
        .body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or(&templates.empty_review_body);

    let mut message = format!(
        "{}\n{} {} ({})\n{} {}\n\n{}\n```\n{}\n```",
        pr_link(pr),
        templates.reviewers_label,
        reviewer.tag(),
        reviewer.display_name,
        templates.review_state_label,
        verdict(&review.state, templates),
        templates.review_body_label,
        body,
    );

    if !pending.is_empty() {
        let pings = pending
            .iter()
            .map(|r| mentions.lookup(r).tag())
            .collect::<Vec<_>>()
            .join(" ");
        message.push('\n');
        message.push_str(&templates.pending_reviewers.replace("{reviewers}", &pings));
    }
    message
}

/// Header line for the PR alarm, with the event action filled in.
pub fn pr_alarm_header(templates: &MessageTemplates, action: &str) -> String {
    templates.pr_alarm_header.replace("{action}", action)
}

/// Join a header and per-PR messages into one chat post.
pub fn compose(header: &str, messages: &[String]) -> String {
    format!("{header}\n\n{}", messages.join("\n\n"))
}
