use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HeraldError;
use crate::mentions::MentionDirectory;

/// Environment variable holding the Discord webhook URL.
pub const ENV_WEBHOOK: &str = "DISCORD_WEBHOOK";
/// Environment variable holding the login → chat id JSON object.
pub const ENV_MENTIONS: &str = "DISCORD_MENTION";
/// Environment variable holding the author → reviewers JSON object.
pub const ENV_ASSIGNEES: &str = "ASSIGNEE_MAP";
/// Environment variable holding `owner/repo`, set by GitHub Actions.
pub const ENV_REPOSITORY: &str = "GITHUB_REPOSITORY";

/// Top-level configuration loaded from `.herald.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
/// Secrets never live here; they come from the workflow environment.
///
/// # Examples
///
/// ```
/// use herald_core::HeraldConfig;
///
/// let config = HeraldConfig::default();
/// assert_eq!(config.discord.timeout_secs, 10);
/// assert!(config.reminder.skip_drafts);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    /// Chat webhook settings.
    #[serde(default)]
    pub discord: DiscordConfig,
    /// Auto-assignment settings.
    #[serde(default)]
    pub assign: AssignConfig,
    /// Scheduled reminder settings.
    #[serde(default)]
    pub reminder: ReminderConfig,
    /// Message phrasing.
    #[serde(default)]
    pub messages: MessageTemplates,
}

impl HeraldConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Io`] if the file cannot be read, or
    /// [`HeraldError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, HeraldError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use herald_core::HeraldConfig;
    ///
    /// let toml = r#"
    /// [discord]
    /// timeout_secs = 5
    /// "#;
    /// let config = HeraldConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.discord.timeout_secs, 5);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, HeraldError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Discord webhook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Client-side timeout for the webhook POST (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Auto-assignment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignConfig {
    /// Also request review from the mapped reviewers (default: false).
    #[serde(default)]
    pub request_reviewers: bool,
    /// Author login → reviewer logins. `ASSIGNEE_MAP` replaces this table.
    #[serde(default)]
    pub reviewers: HashMap<String, Vec<String>>,
}

/// Scheduled reminder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Leave draft PRs out of the reminder (default: true).
    #[serde(default = "default_true")]
    pub skip_drafts: bool,
    /// Stop sending scheduled reminders after this instant (RFC 3339 string).
    #[serde(default)]
    pub active_until: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            skip_drafts: true,
            active_until: None,
        }
    }
}

/// Phrasing for chat messages.
///
/// `{author}` expands to the PR author's mention token and `{action}` to
/// the workflow event action. `{reviewers}` expands to a list of mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplates {
    pub reminder_header: String,
    pub pr_alarm_header: String,
    pub reviewers_label: String,
    /// Every requested reviewer approved.
    pub all_approved: String,
    /// Enough approvals for branch protection, but not from everyone.
    pub quorum_reached: String,
    /// Approved, with no reviewer requested on the PR.
    pub approved_without_request: String,
    /// Branch protection asks for no approvals.
    pub no_approval_required: String,
    /// The repository has nobody to review.
    pub no_collaborators: String,
    pub pending_reviewers: String,
    pub review_state_label: String,
    pub review_body_label: String,
    pub empty_review_body: String,
    pub verdict_approved: String,
    pub verdict_changes_requested: String,
    pub verdict_commented: String,
    /// Any state without a verdict of its own, e.g. dismissed.
    pub verdict_unknown: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            reminder_header: "🍀 리뷰가 필요한 PR 목록 🍀".into(),
            pr_alarm_header: "🔔 PR 알림 ({action}) 🔔".into(),
            reviewers_label: "리뷰어:".into(),
            all_approved: "{author}, 모든 리뷰어의 승인 완료! 코멘트를 확인 후 머지해 주세요 🚀"
                .into(),
            quorum_reached:
                "{author}, 필요한 승인 수를 충족했어요! 코멘트를 확인 후 머지해 주세요 🚀".into(),
            approved_without_request:
                "{author}, 승인을 받았어요! 코멘트를 확인 후 머지해 주세요 🚀".into(),
            no_approval_required: "{author}, 승인 조건이 없는 브랜치예요. 확인 후 머지해 주세요 🚀"
                .into(),
            no_collaborators: "{author}, 리뷰할 협업자가 없는 저장소예요. 바로 머지해 주세요 🚀"
                .into(),
            pending_reviewers:
                "⏳ 아직 리뷰하지 않은 리뷰어들: {reviewers}\n리뷰를 완료해 주세요! 🔍".into(),
            review_state_label: "리뷰 상태:".into(),
            review_body_label: "리뷰 내용:".into(),
            empty_review_body: "상세 리뷰 내용 없음".into(),
            verdict_approved: "승인 ✅".into(),
            verdict_changes_requested: "변경 요청 ⚠️".into(),
            verdict_commented: "코멘트 💬".into(),
            verdict_unknown: "리뷰 상태 알 수 없음 ❓".into(),
        }
    }
}

/// Values given on the command line that win over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `owner/repo`.
    pub repository: Option<String>,
    pub webhook_url: Option<String>,
}

/// Validated per-invocation settings.
///
/// Built once at startup from [`HeraldConfig`], the environment and
/// [`Overrides`], then passed to every job.
#[derive(Debug, Clone)]
pub struct Settings {
    pub owner: String,
    pub repo: String,
    pub github_token: String,
    webhook_url: Option<String>,
    pub mentions: MentionDirectory,
    assignees: Option<HashMap<String, Vec<String>>>,
    pub request_reviewers: bool,
    pub discord_timeout: Duration,
    pub skip_drafts: bool,
    pub active_until: Option<DateTime<Utc>>,
    pub templates: MessageTemplates,
}

impl Settings {
    /// Resolve settings from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Settings::resolve`].
    pub fn from_env(config: HeraldConfig, overrides: &Overrides) -> Result<Self, HeraldError> {
        Self::resolve(config, overrides, |key| std::env::var(key).ok())
    }

    /// Resolve settings using `lookup` to read environment variables.
    ///
    /// Empty variables count as unset, since Actions expands missing secrets
    /// to the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] if the repository or token is missing,
    /// the repository is not `owner/repo`, or `ASSIGNEE_MAP` is not valid JSON.
    pub fn resolve(
        config: HeraldConfig,
        overrides: &Overrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, HeraldError> {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let repository = overrides
            .repository
            .clone()
            .or_else(|| env(ENV_REPOSITORY))
            .ok_or_else(|| {
                HeraldError::Config(format!(
                    "{ENV_REPOSITORY} not set. Pass --repo owner/repo or run inside GitHub Actions"
                ))
            })?;
        let (owner, repo) = parse_repository(&repository)?;

        let github_token = env("GITHUB_TOKEN").or_else(|| env("GH_TOKEN")).ok_or_else(|| {
            HeraldError::Config("GITHUB_TOKEN not set. Pass it through the workflow env".into())
        })?;

        let webhook_url = overrides.webhook_url.clone().or_else(|| env(ENV_WEBHOOK));
        let mentions = MentionDirectory::from_json_lenient(env(ENV_MENTIONS).as_deref());

        let assignees = match env(ENV_ASSIGNEES) {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
                HeraldError::Config(format!("{ENV_ASSIGNEES} is not a JSON object of lists: {e}"))
            })?),
            None if config.assign.reviewers.is_empty() => None,
            None => Some(config.assign.reviewers),
        };

        Ok(Self {
            owner,
            repo,
            github_token,
            webhook_url,
            mentions,
            assignees,
            request_reviewers: config.assign.request_reviewers,
            discord_timeout: Duration::from_secs(config.discord.timeout_secs),
            skip_drafts: config.reminder.skip_drafts,
            active_until: config.reminder.active_until,
            templates: config.messages,
        })
    }

    /// The chat webhook URL, required by every notification job.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] if no webhook was configured.
    pub fn webhook_url(&self) -> Result<&str, HeraldError> {
        self.webhook_url.as_deref().ok_or_else(|| {
            HeraldError::Config(format!("{ENV_WEBHOOK} not set. Add the webhook secret"))
        })
    }

    /// The author → reviewers table, required by the assign job.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] if neither `ASSIGNEE_MAP` nor
    /// `[assign.reviewers]` provided a table.
    pub fn assignee_table(&self) -> Result<&HashMap<String, Vec<String>>, HeraldError> {
        self.assignees.as_ref().ok_or_else(|| {
            HeraldError::Config(format!(
                "{ENV_ASSIGNEES} not set and .herald.toml has no [assign.reviewers] table"
            ))
        })
    }
}

/// Parse a repository reference string (`owner/repo`) into its components.
///
/// # Errors
///
/// Returns [`HeraldError::Config`] if the format is invalid.
///
/// # Examples
///
/// ```
/// use herald_core::parse_repository;
///
/// let (owner, repo) = parse_repository("octocat/hello-world").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_repository(reference: &str) -> Result<(String, String), HeraldError> {
    match reference.trim().split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(HeraldError::Config(format!(
            "invalid repository '{reference}', expected owner/repo"
        ))),
    }
}
