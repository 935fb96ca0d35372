use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::{HeraldError, PullRequest, ReviewEvent, ReviewState};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const PER_PAGE: u8 = 100;
const MAX_PAGES: u32 = 10;

/// Review rules of a protected branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchProtection {
    pub required_approving_review_count: u32,
    pub require_code_owner_reviews: bool,
}

/// The repository calls the jobs need.
///
/// Implementations must be `Send + Sync` so per-PR work can run
/// concurrently.
#[async_trait]
pub trait RepositoryApi: Send + Sync {
    /// Open pull requests of the repository, in API order.
    async fn list_open_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequest>, HeraldError>;

    /// All reviews submitted on a pull request.
    async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<ReviewEvent>, HeraldError>;

    /// Protection rules of `branch`. Unprotected branches are an error.
    async fn branch_protection(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<BranchProtection, HeraldError>;

    /// Logins of the repository collaborators.
    async fn list_collaborators(&self, owner: &str, repo: &str)
        -> Result<Vec<String>, HeraldError>;

    /// Add assignees to an issue or pull request.
    async fn add_assignees(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        assignees: &[String],
    ) -> Result<(), HeraldError>;

    /// Request reviews on a pull request.
    async fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        reviewers: &[String],
    ) -> Result<(), HeraldError>;
}

/// GitHub REST client backed by octocrab.
///
/// # Examples
///
/// ```no_run
/// use herald_review::github::GitHubClient;
///
/// # async fn run() {
/// let client = GitHubClient::new("ghs_xxxx").unwrap();
/// # }
/// ```
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
}

impl GitHubClient {
    /// Create a client authenticated with `token`.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::GitHub`] if the client cannot be built.
    pub fn new(token: &str) -> Result<Self, HeraldError> {
        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| HeraldError::GitHub(format!("failed to create GitHub client: {e}")))?;
        Ok(Self { octocrab })
    }

    /// GET every page of a list endpoint.
    async fn get_all<T: DeserializeOwned + Send>(
        &self,
        route: &str,
        state: Option<&str>,
    ) -> Result<Vec<T>, HeraldError> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let params = PageParams {
                state,
                per_page: PER_PAGE,
                page,
            };
            let batch: Vec<T> = self
                .octocrab
                .get(route, Some(&params))
                .await
                .map_err(|e| HeraldError::GitHub(format!("GET {route} failed: {e}")))?;
            let last = is_last_page(route, page, batch.len());
            items.extend(batch);
            if last {
                break;
            }
            page += 1;
        }
        debug!("GET {route}: {} items", items.len());
        Ok(items)
    }

    async fn post(&self, route: &str, body: serde_json::Value) -> Result<(), HeraldError> {
        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&body))
            .await
            .map_err(|e| HeraldError::GitHub(format!("POST {route} failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl RepositoryApi for GitHubClient {
    async fn list_open_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequest>, HeraldError> {
        let route = format!("/repos/{owner}/{repo}/pulls");
        let raw: Vec<RawPullRequest> = self.get_all(&route, Some("open")).await?;
        Ok(raw.into_iter().map(PullRequest::from).collect())
    }

    async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<ReviewEvent>, HeraldError> {
        let route = format!("/repos/{owner}/{repo}/pulls/{pr_number}/reviews");
        let raw: Vec<RawReview> = self.get_all(&route, None).await?;
        Ok(raw.into_iter().map(|r| r.into_event(pr_number)).collect())
    }

    async fn branch_protection(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<BranchProtection, HeraldError> {
        let route = format!("/repos/{owner}/{repo}/branches/{branch}/protection");
        let raw: RawBranchProtection = self
            .octocrab
            .get(&route, None::<&()>)
            .await
            .map_err(|e| HeraldError::GitHub(format!("GET {route} failed: {e}")))?;
        Ok(raw.into())
    }

    async fn list_collaborators(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<String>, HeraldError> {
        let route = format!("/repos/{owner}/{repo}/collaborators");
        let raw: Vec<RawUser> = self.get_all(&route, None).await?;
        Ok(raw.into_iter().map(|u| u.login).collect())
    }

    async fn add_assignees(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        assignees: &[String],
    ) -> Result<(), HeraldError> {
        let route = format!("/repos/{owner}/{repo}/issues/{issue_number}/assignees");
        self.post(&route, serde_json::json!({ "assignees": assignees }))
            .await
    }

    async fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        reviewers: &[String],
    ) -> Result<(), HeraldError> {
        let route = format!("/repos/{owner}/{repo}/pulls/{pr_number}/requested_reviewers");
        self.post(&route, serde_json::json!({ "reviewers": reviewers }))
            .await
    }
}

/// Whether pagination stops after `page`, which returned `batch_len` items.
///
/// Hitting the page cap stops with a warning since the list may be cut short.
fn is_last_page(route: &str, page: u32, batch_len: usize) -> bool {
    if batch_len < PER_PAGE as usize {
        return true;
    }
    if page >= MAX_PAGES {
        warn!("GET {route}: stopped after {MAX_PAGES} pages, results may be truncated");
        return true;
    }
    false
}

#[derive(Debug, Serialize)]
struct PageParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    per_page: u8,
    page: u32,
}

/// Login used by GitHub for deleted accounts.
const GHOST: &str = "ghost";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawUser {
    pub(crate) login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawBranchRef {
    #[serde(rename = "ref")]
    name: String,
}

/// Pull request as returned by the REST API and carried in event payloads.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPullRequest {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    html_url: String,
    user: Option<RawUser>,
    #[serde(default)]
    draft: Option<bool>,
    created_at: Option<DateTime<Utc>>,
    base: Option<RawBranchRef>,
    #[serde(default)]
    requested_reviewers: Option<Vec<RawUser>>,
}

impl From<RawPullRequest> for PullRequest {
    fn from(raw: RawPullRequest) -> Self {
        PullRequest {
            number: raw.number,
            title: raw.title,
            html_url: raw.html_url,
            author: raw.user.map(|u| u.login).unwrap_or_else(|| GHOST.into()),
            draft: raw.draft.unwrap_or(false),
            created_at: raw.created_at,
            base_branch: raw.base.map(|b| b.name).unwrap_or_default(),
            requested_reviewers: raw
                .requested_reviewers
                .unwrap_or_default()
                .into_iter()
                .map(|u| u.login)
                .collect(),
        }
    }
}

/// Review as returned by the REST API and carried in event payloads.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawReview {
    user: Option<RawUser>,
    state: String,
    body: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
}

impl RawReview {
    pub(crate) fn into_event(self, pr_number: u64) -> ReviewEvent {
        ReviewEvent {
            reviewer: self.user.map(|u| u.login).unwrap_or_else(|| GHOST.into()),
            // webhook payloads spell states in lower case
            state: ReviewState::from(self.state.to_uppercase()),
            body: self.body,
            pr_number,
            submitted_at: self.submitted_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBranchProtection {
    required_pull_request_reviews: Option<RawRequiredReviews>,
}

#[derive(Debug, Deserialize)]
struct RawRequiredReviews {
    #[serde(default)]
    required_approving_review_count: Option<u32>,
    #[serde(default)]
    require_code_owner_reviews: Option<bool>,
}

impl From<RawBranchProtection> for BranchProtection {
    fn from(raw: RawBranchProtection) -> Self {
        match raw.required_pull_request_reviews {
            Some(reviews) => BranchProtection {
                required_approving_review_count: reviews
                    .required_approving_review_count
                    .unwrap_or(0),
                require_code_owner_reviews: reviews.require_code_owner_reviews.unwrap_or(false),
            },
            None => BranchProtection::default(),
        }
    }
}
