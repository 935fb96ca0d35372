use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use herald_core::{
    HeraldConfig, HeraldError, Overrides, PullRequest, ReviewEvent, ReviewState, Settings,
};
use herald_review::assign::AssignOutcome;
use herald_review::discord::ChatNotifier;
use herald_review::event::WorkflowEvent;
use herald_review::github::{BranchProtection, RepositoryApi};
use herald_review::pipeline::{
    run_assign, run_pr_alarm, run_review_reminder, run_review_submitted, JobOutcome,
};

const MENTIONS: &str = r#"{
    "alice": {"id": "100", "displayName": "Alice"},
    "bob": {"id": "200", "displayName": "Bob"},
    "carol": {"id": "300", "displayName": "Carol"}
}"#;

#[derive(Default)]
struct FakeRepository {
    prs: Vec<PullRequest>,
    reviews: HashMap<u64, Vec<ReviewEvent>>,
    /// Branches missing here answer with an error, like an unprotected branch.
    protection: HashMap<String, BranchProtection>,
    /// `None` makes the collaborator lookup fail.
    collaborators: Option<Vec<String>>,
    fail_reviews: bool,
    fail_assign: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeRepository {
    fn with_collaborators() -> Self {
        Self {
            collaborators: Some(vec!["alice".into(), "bob".into(), "carol".into()]),
            ..Self::default()
        }
    }

    fn protect(mut self, branch: &str, required: u32) -> Self {
        self.protection.insert(
            branch.into(),
            BranchProtection {
                required_approving_review_count: required,
                require_code_owner_reviews: false,
            },
        );
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RepositoryApi for FakeRepository {
    async fn list_open_pull_requests(
        &self,
        _owner: &str,
        _repo: &str,
    ) -> Result<Vec<PullRequest>, HeraldError> {
        self.record("list_prs".into());
        Ok(self.prs.clone())
    }

    async fn list_reviews(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
    ) -> Result<Vec<ReviewEvent>, HeraldError> {
        self.record(format!("reviews:{pr_number}"));
        if self.fail_reviews {
            return Err(HeraldError::GitHub("reviews unavailable".into()));
        }
        Ok(self.reviews.get(&pr_number).cloned().unwrap_or_default())
    }

    async fn branch_protection(
        &self,
        _owner: &str,
        _repo: &str,
        branch: &str,
    ) -> Result<BranchProtection, HeraldError> {
        self.protection
            .get(branch)
            .copied()
            .ok_or_else(|| HeraldError::GitHub("Branch not protected".into()))
    }

    async fn list_collaborators(
        &self,
        _owner: &str,
        _repo: &str,
    ) -> Result<Vec<String>, HeraldError> {
        self.collaborators
            .clone()
            .ok_or_else(|| HeraldError::GitHub("Must have push access".into()))
    }

    async fn add_assignees(
        &self,
        _owner: &str,
        _repo: &str,
        issue_number: u64,
        assignees: &[String],
    ) -> Result<(), HeraldError> {
        if self.fail_assign {
            return Err(HeraldError::GitHub("403 Forbidden".into()));
        }
        self.record(format!("assign:{issue_number}:{}", assignees.join(",")));
        Ok(())
    }

    async fn request_reviewers(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
        reviewers: &[String],
    ) -> Result<(), HeraldError> {
        self.record(format!("request:{pr_number}:{}", reviewers.join(",")));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatNotifier for RecordingNotifier {
    async fn send(&self, content: &str) -> Result<(), HeraldError> {
        if self.fail {
            return Err(HeraldError::Delivery("webhook returned 500".into()));
        }
        self.sent.lock().unwrap().push(content.to_string());
        Ok(())
    }
}

fn settings_with(config: HeraldConfig, assignees: Option<&str>) -> Settings {
    Settings::resolve(config, &Overrides::default(), |key| match key {
        "GITHUB_REPOSITORY" => Some("acme/web".into()),
        "GITHUB_TOKEN" => Some("token".into()),
        "DISCORD_WEBHOOK" => Some("http://localhost/webhook".into()),
        "DISCORD_MENTION" => Some(MENTIONS.into()),
        "ASSIGNEE_MAP" => assignees.map(String::from),
        _ => None,
    })
    .unwrap()
}

fn settings() -> Settings {
    settings_with(HeraldConfig::default(), None)
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, d, 9, 0, 0).unwrap()
}

fn pr(number: u64, title: &str, requested: &[&str]) -> PullRequest {
    PullRequest {
        number,
        title: title.into(),
        html_url: format!("https://github.com/acme/web/pull/{number}"),
        author: "alice".into(),
        draft: false,
        created_at: Some(day(1)),
        base_branch: "main".into(),
        requested_reviewers: requested.iter().map(|s| s.to_string()).collect(),
    }
}

fn review(pr_number: u64, reviewer: &str, state: ReviewState, at: u32) -> ReviewEvent {
    ReviewEvent {
        reviewer: reviewer.into(),
        state,
        body: None,
        pr_number,
        submitted_at: Some(day(at)),
    }
}

fn pr_event(action: &str, pr: PullRequest) -> WorkflowEvent {
    WorkflowEvent {
        name: "pull_request".into(),
        action: Some(action.into()),
        pull_request: Some(pr),
        review: None,
    }
}

#[tokio::test]
async fn reminder_all_requested_approved() {
    let mut api = FakeRepository::with_collaborators().protect("main", 1);
    api.prs = vec![pr(7, "Add search", &["bob"])];
    api.reviews
        .insert(7, vec![review(7, "bob", ReviewState::Approved, 2)]);
    let notifier = RecordingNotifier::default();

    let outcome = run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Sent { entries: 1 });
    assert_eq!(
        notifier.sent(),
        vec!["🍀 리뷰가 필요한 PR 목록 🍀\n\n\
              [[PR] Add search](<https://github.com/acme/web/pull/7>)\n\
              리뷰어: Bob(Approved)\n\
              <@100>, 모든 리뷰어의 승인 완료! 코멘트를 확인 후 머지해 주세요 🚀"
            .to_string()]
    );
}

#[tokio::test]
async fn reminder_pending_reviewer_blocks_celebration() {
    let mut api = FakeRepository::with_collaborators().protect("main", 1);
    api.prs = vec![pr(8, "Fix login", &["bob", "carol"])];
    api.reviews
        .insert(8, vec![review(8, "bob", ReviewState::Approved, 2)]);
    let notifier = RecordingNotifier::default();

    run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap();

    let sent = notifier.sent();
    assert!(sent[0].contains("리뷰어: Bob(Approved), <@300>(X)"));
    assert!(!sent[0].contains("🚀"));
}

#[tokio::test]
async fn reminder_quorum_reached_with_comment() {
    let mut api = FakeRepository::with_collaborators().protect("main", 1);
    api.prs = vec![pr(9, "Tune cache", &["bob", "carol"])];
    api.reviews.insert(
        9,
        vec![
            review(9, "carol", ReviewState::Commented, 2),
            review(9, "bob", ReviewState::Approved, 3),
        ],
    );
    let notifier = RecordingNotifier::default();

    run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap();

    let sent = notifier.sent();
    assert!(sent[0].contains("리뷰어: <@300>(Commented), Bob(Approved)"));
    assert!(sent[0].contains("<@100>, 필요한 승인 수를 충족했어요!"));
}

#[tokio::test]
async fn reminder_approval_without_requested_reviewers() {
    let mut api = FakeRepository::with_collaborators().protect("main", 1);
    api.prs = vec![pr(13, "Hotfix", &[])];
    api.reviews
        .insert(13, vec![review(13, "bob", ReviewState::Approved, 2)]);
    let notifier = RecordingNotifier::default();

    run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap();

    let sent = &notifier.sent()[0];
    assert!(sent.contains("리뷰어: Bob(Approved)\n<@100>, 승인을 받았어요!"));
    assert!(!sent.contains("모든 리뷰어의 승인 완료"));
}

#[tokio::test]
async fn reminder_unprotected_branch_needs_no_approval() {
    let mut api = FakeRepository::with_collaborators();
    api.prs = vec![pr(10, "Docs", &[])];
    let notifier = RecordingNotifier::default();

    run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap();

    assert!(notifier.sent()[0].contains("<@100>, 승인 조건이 없는 브랜치예요."));
}

#[tokio::test]
async fn reminder_without_collaborators_can_merge() {
    let mut api = FakeRepository::default().protect("main", 2);
    api.collaborators = Some(vec![]);
    api.prs = vec![pr(11, "Solo work", &[])];
    let notifier = RecordingNotifier::default();

    run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap();

    assert!(notifier.sent()[0].contains("<@100>, 리뷰할 협업자가 없는 저장소예요."));
}

#[tokio::test]
async fn reminder_failed_collaborator_lookup_assumes_collaborators() {
    let mut api = FakeRepository::default().protect("main", 1);
    api.collaborators = None;
    api.prs = vec![pr(12, "Refactor", &[])];
    let notifier = RecordingNotifier::default();

    run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap();

    let sent = notifier.sent();
    assert!(sent[0].contains("리뷰어: "));
    assert!(!sent[0].contains("🚀"));
}

#[tokio::test]
async fn reminder_skips_drafts_and_orders_oldest_first() {
    let mut api = FakeRepository::with_collaborators();
    let mut third = pr(3, "third", &["bob"]);
    third.created_at = Some(day(3));
    let mut undated = pr(4, "undated", &["bob"]);
    undated.created_at = None;
    let mut first = pr(1, "first", &["bob"]);
    first.created_at = Some(day(1));
    let mut draft = pr(5, "draft", &["bob"]);
    draft.draft = true;
    let mut second = pr(2, "second", &["bob"]);
    second.created_at = Some(day(2));
    api.prs = vec![third, undated, first, draft, second];
    let notifier = RecordingNotifier::default();

    let outcome = run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Sent { entries: 4 });
    let sent = &notifier.sent()[0];
    assert!(!sent.contains("[[PR] draft]"));
    let positions: Vec<usize> = ["first", "second", "third", "undated"]
        .iter()
        .map(|t| sent.find(&format!("[[PR] {t}]")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn reminder_includes_drafts_when_configured() {
    let mut config = HeraldConfig::default();
    config.reminder.skip_drafts = false;
    let mut api = FakeRepository::with_collaborators();
    let mut draft = pr(5, "draft", &["bob"]);
    draft.draft = true;
    api.prs = vec![draft];
    let notifier = RecordingNotifier::default();

    let outcome = run_review_reminder(&api, &notifier, &settings_with(config, None), day(5))
        .await
        .unwrap();
    assert_eq!(outcome, JobOutcome::Sent { entries: 1 });
}

#[tokio::test]
async fn reminder_with_no_open_prs_sends_nothing() {
    let mut api = FakeRepository::with_collaborators();
    let mut draft = pr(5, "draft", &["bob"]);
    draft.draft = true;
    api.prs = vec![draft];
    let notifier = RecordingNotifier::default();

    let outcome = run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap();

    assert!(matches!(outcome, JobOutcome::NothingToDo(_)));
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn reminder_after_active_until_does_nothing() {
    let mut config = HeraldConfig::default();
    config.reminder.active_until = Some(day(4));
    let mut api = FakeRepository::with_collaborators();
    api.prs = vec![pr(7, "Add search", &["bob"])];
    let notifier = RecordingNotifier::default();

    let outcome = run_review_reminder(
        &api,
        &notifier,
        &settings_with(config, None),
        day(4) + Duration::minutes(1),
    )
    .await
    .unwrap();

    assert!(matches!(outcome, JobOutcome::NothingToDo(_)));
    assert!(api.calls().is_empty());
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn reminder_review_failure_sends_nothing() {
    let mut api = FakeRepository::with_collaborators();
    api.prs = vec![pr(7, "Add search", &["bob"])];
    api.fail_reviews = true;
    let notifier = RecordingNotifier::default();

    let err = run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap_err();

    assert!(matches!(err, HeraldError::GitHub(_)));
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn reminder_delivery_failure_is_reported() {
    let mut api = FakeRepository::with_collaborators();
    api.prs = vec![pr(7, "Add search", &["bob"])];
    let notifier = RecordingNotifier {
        fail: true,
        ..RecordingNotifier::default()
    };

    let err = run_review_reminder(&api, &notifier, &settings(), day(5))
        .await
        .unwrap_err();
    assert!(matches!(err, HeraldError::Delivery(_)));
}

#[tokio::test]
async fn pr_alarm_uses_action_header() {
    let api = FakeRepository::with_collaborators();
    let notifier = RecordingNotifier::default();
    let event = pr_event("opened", pr(21, "New API", &["bob"]));

    let outcome = run_pr_alarm(&api, &notifier, &settings(), &event)
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Sent { entries: 1 });
    let sent = notifier.sent();
    assert!(sent[0].starts_with("🔔 PR 알림 (opened) 🔔\n\n[[PR] New API]"));
    assert!(sent[0].contains("리뷰어: <@200>(X)"));
}

#[tokio::test]
async fn pr_alarm_ignores_unhandled_action() {
    let api = FakeRepository::with_collaborators();
    let notifier = RecordingNotifier::default();
    let event = pr_event("closed", pr(21, "New API", &["bob"]));

    let outcome = run_pr_alarm(&api, &notifier, &settings(), &event)
        .await
        .unwrap();

    assert!(matches!(outcome, JobOutcome::NothingToDo(_)));
    assert!(api.calls().is_empty());
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn review_submitted_pings_pending_reviewers() {
    let mut api = FakeRepository::with_collaborators();
    api.reviews.insert(
        30,
        vec![
            review(30, "carol", ReviewState::Commented, 2),
            review(30, "bob", ReviewState::Approved, 3),
        ],
    );
    let notifier = RecordingNotifier::default();
    let mut submitted = review(30, "bob", ReviewState::Approved, 3);
    submitted.body = Some("LGTM".into());
    let event = WorkflowEvent {
        name: "pull_request_review".into(),
        action: Some("submitted".into()),
        pull_request: Some(pr(30, "Cache layer", &["carol", "dave"])),
        review: Some(submitted),
    };

    run_review_submitted(&api, &notifier, &settings(), &event)
        .await
        .unwrap();

    let sent = &notifier.sent()[0];
    assert!(sent.starts_with("🍀 리뷰가 필요한 PR 목록 🍀\n\n[[PR] Cache layer]"));
    assert!(sent.contains("리뷰어: <@200> (Bob)\n리뷰 상태: 승인 ✅"));
    assert!(sent.contains("```\nLGTM\n```"));
    assert!(sent.contains("⏳ 아직 리뷰하지 않은 리뷰어들: <@300> <@dave>"));
}

#[tokio::test]
async fn review_submitted_without_pending_has_no_ping() {
    let mut api = FakeRepository::with_collaborators();
    api.reviews
        .insert(31, vec![review(31, "carol", ReviewState::ChangesRequested, 2)]);
    let notifier = RecordingNotifier::default();
    let event = WorkflowEvent {
        name: "pull_request_review".into(),
        action: Some("submitted".into()),
        pull_request: Some(pr(31, "Schema", &["carol"])),
        review: Some(review(31, "carol", ReviewState::ChangesRequested, 2)),
    };

    run_review_submitted(&api, &notifier, &settings(), &event)
        .await
        .unwrap();

    let sent = &notifier.sent()[0];
    assert!(sent.contains("리뷰 상태: 변경 요청 ⚠️"));
    assert!(sent.contains("상세 리뷰 내용 없음"));
    assert!(!sent.contains("⏳"));
}

#[tokio::test]
async fn review_submitted_without_review_does_nothing() {
    let api = FakeRepository::with_collaborators();
    let notifier = RecordingNotifier::default();
    let event = pr_event("submitted", pr(31, "Schema", &["carol"]));

    let outcome = run_review_submitted(&api, &notifier, &settings(), &event)
        .await
        .unwrap();
    assert!(matches!(outcome, JobOutcome::NothingToDo(_)));
}

#[tokio::test]
async fn assign_author_and_request_reviewers() {
    let mut config = HeraldConfig::default();
    config.assign.request_reviewers = true;
    let api = FakeRepository::default();
    let settings = settings_with(config, Some(r#"{"alice": ["bob", "alice"]}"#));
    let event = pr_event("opened", pr(40, "Feature", &[]));

    let outcome = run_assign(&api, &settings, &event).await.unwrap();

    assert_eq!(
        outcome,
        JobOutcome::Assigned(AssignOutcome::Assigned {
            assignee: "alice".into(),
            requested: vec!["bob".into()],
        })
    );
    assert_eq!(api.calls(), vec!["request:40:bob", "assign:40:alice"]);
}

#[tokio::test]
async fn assign_unknown_author_is_no_mapping() {
    let api = FakeRepository::default();
    let settings = settings_with(HeraldConfig::default(), Some(r#"{"zed": ["bob"]}"#));
    let event = pr_event("opened", pr(41, "Feature", &[]));

    let outcome = run_assign(&api, &settings, &event).await.unwrap();

    assert_eq!(outcome, JobOutcome::Assigned(AssignOutcome::NoMapping));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn assign_without_table_is_config_error() {
    let api = FakeRepository::default();
    let event = pr_event("opened", pr(42, "Feature", &[]));

    let err = run_assign(&api, &settings(), &event).await.unwrap_err();

    assert!(matches!(err, HeraldError::Config(_)));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn assign_api_failure_is_reported() {
    let api = FakeRepository {
        fail_assign: true,
        ..FakeRepository::default()
    };
    let settings = settings_with(HeraldConfig::default(), Some(r#"{"alice": ["bob"]}"#));
    let event = pr_event("opened", pr(43, "Feature", &[]));

    let err = run_assign(&api, &settings, &event).await.unwrap_err();
    assert!(matches!(err, HeraldError::GitHub(_)));
}
