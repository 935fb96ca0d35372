use std::collections::HashMap;

use herald_core::HeraldError;
use log::info;

use crate::github::RepositoryApi;

/// What the assignment step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    /// The author has no entry in the table.
    NoMapping,
    Assigned {
        assignee: String,
        /// Reviewers requested alongside, if enabled.
        requested: Vec<String>,
    },
}

/// Assign the PR author to their own PR if they appear in `table`.
///
/// With `request_reviewers` set, the mapped reviewers (minus the author)
/// are requested first. Failures are returned as-is; nothing is retried.
///
/// # Errors
///
/// Returns [`HeraldError::GitHub`] if an API call fails.
pub async fn assign(
    api: &dyn RepositoryApi,
    owner: &str,
    repo: &str,
    pr_number: u64,
    author: &str,
    table: &HashMap<String, Vec<String>>,
    request_reviewers: bool,
) -> Result<AssignOutcome, HeraldError> {
    let Some(reviewers) = table.get(author) else {
        info!("no reviewer mapping for {author}, nothing to assign");
        return Ok(AssignOutcome::NoMapping);
    };

    let mut requested = Vec::new();
    if request_reviewers {
        requested = reviewers
            .iter()
            .filter(|r| r.as_str() != author)
            .cloned()
            .collect();
        if !requested.is_empty() {
            api.request_reviewers(owner, repo, pr_number, &requested)
                .await?;
        }
    }

    api.add_assignees(owner, repo, pr_number, &[author.to_string()])
        .await?;

    info!(
        "PR #{pr_number}: assigned {author} (reviewers: {})",
        reviewers.join(", ")
    );
    Ok(AssignOutcome::Assigned {
        assignee: author.to_string(),
        requested,
    })
}
