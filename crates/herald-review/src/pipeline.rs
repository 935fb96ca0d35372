use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use herald_core::{ApprovalPolicy, HeraldError, PullRequest, ReviewState, Settings};
use log::{debug, info, warn};

use crate::aggregate::{latest_states, ReviewStatusAggregator};
use crate::assign::{assign, AssignOutcome};
use crate::discord::ChatNotifier;
use crate::event::WorkflowEvent;
use crate::github::RepositoryApi;
use crate::message;

/// Result of a job run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Nothing matched; no side effects happened.
    NothingToDo(String),
    /// One chat message carrying this many PR entries was delivered.
    Sent { entries: usize },
    Assigned(AssignOutcome),
}

/// Whether the repository has anyone to review.
///
/// A failed lookup assumes collaborators exist.
pub async fn has_collaborators(api: &dyn RepositoryApi, owner: &str, repo: &str) -> bool {
    match api.list_collaborators(owner, repo).await {
        Ok(logins) => !logins.is_empty(),
        Err(e) => {
            warn!("collaborator lookup failed, assuming collaborators exist: {e}");
            true
        }
    }
}

/// Approval policy of `branch`.
///
/// A failed branch-protection lookup (including unprotected branches)
/// means no approvals are required.
pub async fn resolve_policy(
    api: &dyn RepositoryApi,
    owner: &str,
    repo: &str,
    branch: &str,
    has_collaborators: bool,
) -> ApprovalPolicy {
    let mut policy = ApprovalPolicy {
        has_collaborators,
        ..ApprovalPolicy::default()
    };
    match api.branch_protection(owner, repo, branch).await {
        Ok(protection) => {
            policy.required_approving_review_count = protection.required_approving_review_count;
            policy.require_code_owner_reviews = protection.require_code_owner_reviews;
        }
        Err(e) => warn!("branch protection lookup for '{branch}' failed, requiring no approvals: {e}"),
    }
    debug!("policy for '{branch}': {policy:?}");
    policy
}

/// Fetch reviews and policy for `pr` and render its reminder line.
///
/// # Errors
///
/// Returns [`HeraldError::GitHub`] if the reviews cannot be listed.
pub async fn build_pr_message(
    api: &dyn RepositoryApi,
    settings: &Settings,
    pr: &PullRequest,
    has_collaborators: bool,
) -> Result<String, HeraldError> {
    info!("processing PR #{} \"{}\"", pr.number, pr.title);
    let reviews = api
        .list_reviews(&settings.owner, &settings.repo, pr.number)
        .await?;
    let policy = resolve_policy(
        api,
        &settings.owner,
        &settings.repo,
        &pr.base_branch,
        has_collaborators,
    )
    .await;

    let summary = ReviewStatusAggregator::new(&settings.mentions).classify(
        pr,
        &reviews,
        &pr.requested_reviewers,
        &policy,
    );
    Ok(message::render_pr_message(
        pr,
        &summary,
        &settings.mentions,
        &settings.templates,
    ))
}

/// Notify the channel about the PR of a `pull_request` event.
///
/// # Errors
///
/// Returns an error if the reviews cannot be fetched or delivery fails.
pub async fn run_pr_alarm(
    api: &dyn RepositoryApi,
    notifier: &dyn ChatNotifier,
    settings: &Settings,
    event: &WorkflowEvent,
) -> Result<JobOutcome, HeraldError> {
    if !event.is_handled_pr_action() {
        return Ok(nothing_to_do(format!(
            "event '{}' with action '{}' is not handled",
            event.name,
            event.action.as_deref().unwrap_or("-")
        )));
    }
    let Some(pr) = &event.pull_request else {
        return Ok(nothing_to_do("event carries no pull request"));
    };

    let collaborators = has_collaborators(api, &settings.owner, &settings.repo).await;
    let entry = build_pr_message(api, settings, pr, collaborators).await?;

    let action = event.action.as_deref().unwrap_or_default();
    let header = message::pr_alarm_header(&settings.templates, action);
    notifier.send(&message::compose(&header, &[entry])).await?;
    Ok(JobOutcome::Sent { entries: 1 })
}

/// Post the scheduled reminder for every open PR.
///
/// PRs are listed oldest first; drafts are skipped unless configured
/// otherwise. Per-PR lookups run concurrently.
///
/// # Errors
///
/// Returns an error if listing PRs or reviews fails, or delivery fails.
pub async fn run_review_reminder(
    api: &dyn RepositoryApi,
    notifier: &dyn ChatNotifier,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<JobOutcome, HeraldError> {
    if let Some(until) = settings.active_until {
        if now > until {
            return Ok(nothing_to_do(format!("reminders ended at {until}")));
        }
    }

    let mut prs = api
        .list_open_pull_requests(&settings.owner, &settings.repo)
        .await?;
    if settings.skip_drafts {
        prs.retain(|pr| !pr.draft);
    }
    prs.sort_by_key(|pr| (pr.created_at.is_none(), pr.created_at));

    if prs.is_empty() {
        return Ok(nothing_to_do("no open pull requests"));
    }

    let collaborators = has_collaborators(api, &settings.owner, &settings.repo).await;
    let entries = try_join_all(
        prs.iter()
            .map(|pr| build_pr_message(api, settings, pr, collaborators)),
    )
    .await?;
    if entries.is_empty() {
        return Ok(nothing_to_do("no messages generated"));
    }

    notifier
        .send(&message::compose(&settings.templates.reminder_header, &entries))
        .await?;
    Ok(JobOutcome::Sent {
        entries: entries.len(),
    })
}

/// Tell the channel about a submitted review and ping who is still pending.
///
/// # Errors
///
/// Returns an error if the reviews cannot be fetched or delivery fails.
pub async fn run_review_submitted(
    api: &dyn RepositoryApi,
    notifier: &dyn ChatNotifier,
    settings: &Settings,
    event: &WorkflowEvent,
) -> Result<JobOutcome, HeraldError> {
    let (Some(pr), Some(review)) = (&event.pull_request, &event.review) else {
        return Ok(nothing_to_do("event carries no pull request or review"));
    };

    let reviews = api
        .list_reviews(&settings.owner, &settings.repo, pr.number)
        .await?;
    let latest = latest_states(pr, &reviews);

    // a comment or a dismissed review still leaves the reviewer owing a verdict
    let pending: Vec<String> = pr
        .requested_reviewers
        .iter()
        .filter(|r| {
            match latest.iter().find(|s| &s.reviewer == *r) {
                None => true,
                Some(s) => matches!(s.state, ReviewState::Commented | ReviewState::Dismissed),
            }
        })
        .cloned()
        .collect();
    debug!("PR #{}: pending reviewers {pending:?}", pr.number);

    let entry = message::render_review_submitted(
        pr,
        review,
        &pending,
        &settings.mentions,
        &settings.templates,
    );
    notifier
        .send(&message::compose(&settings.templates.reminder_header, &[entry]))
        .await?;
    Ok(JobOutcome::Sent { entries: 1 })
}

/// Assign the author of the event PR.
///
/// # Errors
///
/// Returns [`HeraldError::Config`] if no assignee table is configured,
/// or [`HeraldError::GitHub`] if the assignment call fails.
pub async fn run_assign(
    api: &dyn RepositoryApi,
    settings: &Settings,
    event: &WorkflowEvent,
) -> Result<JobOutcome, HeraldError> {
    let table = settings.assignee_table()?;
    let Some(pr) = &event.pull_request else {
        return Ok(nothing_to_do("event carries no pull request"));
    };

    let outcome = assign(
        api,
        &settings.owner,
        &settings.repo,
        pr.number,
        &pr.author,
        table,
        settings.request_reviewers,
    )
    .await?;
    Ok(JobOutcome::Assigned(outcome))
}

fn nothing_to_do(reason: impl Into<String>) -> JobOutcome {
    let reason = reason.into();
    info!("nothing to do: {reason}");
    JobOutcome::NothingToDo(reason)
}
