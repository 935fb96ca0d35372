use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use herald_core::{
    parse_repository, HeraldConfig, HeraldError, MentionDirectory, Overrides, Settings,
    ENV_ASSIGNEES, ENV_MENTIONS, ENV_REPOSITORY, ENV_WEBHOOK,
};
use herald_review::discord::DiscordWebhook;
use herald_review::event::WorkflowEvent;
use herald_review::github::GitHubClient;
use herald_review::pipeline::{self, JobOutcome};
use log::{debug, info};
use miette::{IntoDiagnostic, Result};

const CONFIG_FILE: &str = ".herald.toml";

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    about = "Pull request review notifications for GitHub Actions",
    long_about = "Herald watches pull request reviews and tells the team chat what is\n\
                   still pending and what is ready to merge.\n\n\
                   Each subcommand is one workflow job and reads the GitHub Actions\n\
                   environment (GITHUB_REPOSITORY, GITHUB_TOKEN, GITHUB_EVENT_NAME,\n\
                   GITHUB_EVENT_PATH) plus DISCORD_WEBHOOK, DISCORD_MENTION and ASSIGNEE_MAP.\n\n\
                   Examples:\n  \
                     herald assign              Assign the PR author on pull_request events\n  \
                     herald pr-alarm            Announce opened or updated PRs\n  \
                     herald reminder            Post the scheduled review reminder\n  \
                     herald review-submitted    Announce a submitted review\n  \
                     herald doctor              Check the workflow environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .herald.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Repository as owner/repo (default: $GITHUB_REPOSITORY)
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Event name (default: $GITHUB_EVENT_NAME)
    #[arg(long, global = true)]
    event_name: Option<String>,

    /// Event payload file (default: $GITHUB_EVENT_PATH)
    #[arg(long, global = true)]
    event_path: Option<PathBuf>,

    /// Chat webhook URL (default: $DISCORD_WEBHOOK)
    #[arg(long, global = true)]
    webhook: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Assign the PR author to their own pull request
    #[command(long_about = "Assign the PR author to their own pull request.\n\n\
        Looks the author up in ASSIGNEE_MAP (or [assign.reviewers] in .herald.toml).\n\
        Authors without an entry are left alone.\n\n\
        Examples:\n  herald assign\n  herald assign --event-path event.json --repo acme/web")]
    Assign,
    /// Announce an opened, reopened or updated pull request
    #[command(long_about = "Announce an opened, reopened or updated pull request.\n\n\
        Handles pull_request events with action opened, reopened, synchronize or\n\
        ready_for_review. Other events exit successfully without sending anything.")]
    PrAlarm,
    /// Post the review status of every open pull request
    #[command(long_about = "Post the review status of every open pull request.\n\n\
        Meant for a scheduled workflow. Draft PRs are skipped unless\n\
        [reminder] skip_drafts = false. Nothing is sent after [reminder] active_until.")]
    Reminder,
    /// Announce a submitted review and ping pending reviewers
    ReviewSubmitted,
    /// Create a default .herald.toml in the current directory
    Init,
    /// Check the workflow environment and configuration
    Doctor {
        /// Print checks as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> std::result::Result<HeraldConfig, HeraldError> {
    match path {
        Some(path) => HeraldConfig::from_file(path),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                HeraldConfig::from_file(default_path)
            } else {
                Ok(HeraldConfig::default())
            }
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn load_event(cli: &Cli) -> std::result::Result<WorkflowEvent, HeraldError> {
    let name = cli
        .event_name
        .clone()
        .or_else(|| env_var("GITHUB_EVENT_NAME"))
        .unwrap_or_default();
    let path = cli
        .event_path
        .clone()
        .or_else(|| env_var("GITHUB_EVENT_PATH").map(PathBuf::from));
    match path {
        Some(path) => WorkflowEvent::load(&name, &path),
        None => {
            debug!("no event payload, continuing with event '{name}' only");
            Ok(WorkflowEvent::empty(&name))
        }
    }
}

/// The subcommands that run as workflow jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Assign,
    PrAlarm,
    Reminder,
    ReviewSubmitted,
}

/// Chat and repository clients for the notification jobs.
///
/// The webhook is checked first so a misconfigured workflow fails without
/// touching GitHub.
fn notification_clients(
    settings: &Settings,
) -> std::result::Result<(DiscordWebhook, GitHubClient), HeraldError> {
    let notifier = DiscordWebhook::new(settings.webhook_url()?, settings.discord_timeout)?;
    let github = GitHubClient::new(&settings.github_token)?;
    Ok((notifier, github))
}

async fn run_job(cli: &Cli, job: Job) -> std::result::Result<JobOutcome, HeraldError> {
    let config = load_config(cli.config.as_deref())?;
    let overrides = Overrides {
        repository: cli.repo.clone(),
        webhook_url: cli.webhook.clone(),
    };
    let settings = Settings::from_env(config, &overrides)?;
    debug!(
        "running {job:?} for {}/{}, {} chat mentions",
        settings.owner,
        settings.repo,
        settings.mentions.len()
    );

    match job {
        Job::Assign => {
            let event = load_event(cli)?;
            settings.assignee_table()?;
            let github = GitHubClient::new(&settings.github_token)?;
            pipeline::run_assign(&github, &settings, &event).await
        }
        Job::PrAlarm => {
            let (notifier, github) = notification_clients(&settings)?;
            let event = load_event(cli)?;
            pipeline::run_pr_alarm(&github, &notifier, &settings, &event).await
        }
        Job::Reminder => {
            let (notifier, github) = notification_clients(&settings)?;
            pipeline::run_review_reminder(&github, &notifier, &settings, Utc::now()).await
        }
        Job::ReviewSubmitted => {
            let (notifier, github) = notification_clients(&settings)?;
            let event = load_event(cli)?;
            pipeline::run_review_submitted(&github, &notifier, &settings, &event).await
        }
    }
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self, use_color: bool) -> &'static str {
        match (self.status, use_color) {
            ("pass", true) => "\x1b[32m\u{2713}\x1b[0m",
            ("fail", true) => "\x1b[31m\u{2717}\x1b[0m",
            (_, true) => "\x1b[33m~\x1b[0m",
            ("pass", false) => "\u{2713}",
            ("fail", false) => "\u{2717}",
            (_, false) => "~",
        }
    }
}

fn run_doctor(config_path: Option<&Path>, json: bool) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Config file
    let path = config_path.unwrap_or(Path::new(CONFIG_FILE));
    if path.exists() {
        match HeraldConfig::from_file(path) {
            Ok(config) => checks.push(CheckResult::pass(
                "config_file",
                format!(
                    "{} found ({} assignee entries)",
                    path.display(),
                    config.assign.reviewers.len()
                ),
            )),
            Err(e) => checks.push(CheckResult::fail(
                "config_file",
                format!("{} is invalid: {e}", path.display()),
                "fix the file or regenerate it with 'herald init'",
            )),
        }
    } else {
        checks.push(CheckResult::info(
            "config_file",
            format!("{} not found, using defaults", path.display()),
        ));
    }

    // 2. Repository
    match env_var(ENV_REPOSITORY) {
        Some(repository) => match parse_repository(&repository) {
            Ok((owner, repo)) => {
                checks.push(CheckResult::pass("repository", format!("{owner}/{repo}")))
            }
            Err(e) => checks.push(CheckResult::fail(
                "repository",
                e.to_string(),
                "use the owner/repo form",
            )),
        },
        None => checks.push(CheckResult::fail(
            "repository",
            format!("{ENV_REPOSITORY} not set"),
            "pass --repo owner/repo or run inside GitHub Actions",
        )),
    }

    // 3. Token
    if env_var("GITHUB_TOKEN").is_some() || env_var("GH_TOKEN").is_some() {
        checks.push(CheckResult::pass("github_token", "set"));
    } else {
        checks.push(CheckResult::fail(
            "github_token",
            "GITHUB_TOKEN not set",
            "add 'GITHUB_TOKEN: ${{ secrets.GITHUB_TOKEN }}' to the step env",
        ));
    }

    // 4. Webhook
    if env_var(ENV_WEBHOOK).is_some() {
        checks.push(CheckResult::pass("discord_webhook", format!("{ENV_WEBHOOK} set")));
    } else {
        checks.push(CheckResult::fail(
            "discord_webhook",
            format!("{ENV_WEBHOOK} not set"),
            "add the webhook URL as a repository secret",
        ));
    }

    // 5. Mentions
    match env_var(ENV_MENTIONS) {
        Some(raw) => match MentionDirectory::from_json(&raw) {
            Ok(dir) => checks.push(CheckResult::pass(
                "discord_mentions",
                format!("{} users mapped", dir.len()),
            )),
            Err(e) => checks.push(CheckResult::fail(
                "discord_mentions",
                format!("{ENV_MENTIONS} is not valid JSON: {e}"),
                "expected an object of login to id or {id, displayName}",
            )),
        },
        None => checks.push(CheckResult::info(
            "discord_mentions",
            format!("{ENV_MENTIONS} not set, logins are shown as-is"),
        )),
    }

    // 6. Assignees
    match env_var(ENV_ASSIGNEES) {
        Some(raw) => {
            match serde_json::from_str::<std::collections::HashMap<String, Vec<String>>>(&raw) {
                Ok(table) => checks.push(CheckResult::pass(
                    "assignee_map",
                    format!("{} authors mapped", table.len()),
                )),
                Err(e) => checks.push(CheckResult::fail(
                    "assignee_map",
                    format!("{ENV_ASSIGNEES} is not valid JSON: {e}"),
                    "expected an object of author to reviewer lists",
                )),
            }
        }
        None => checks.push(CheckResult::info(
            "assignee_map",
            format!("{ENV_ASSIGNEES} not set, only needed by 'herald assign'"),
        )),
    }

    // 7. Event
    match (env_var("GITHUB_EVENT_NAME"), env_var("GITHUB_EVENT_PATH")) {
        (Some(name), Some(path)) => {
            checks.push(CheckResult::info("event", format!("{name} ({path})")))
        }
        (Some(name), None) => checks.push(CheckResult::info("event", format!("{name}, no payload"))),
        _ => checks.push(CheckResult::info("event", "not running inside a workflow")),
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&checks).into_diagnostic()?
        );
        return Ok(());
    }

    let use_color = std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err();
    for check in &checks {
        println!("{} {:<18} {}", check.symbol(use_color), check.name, check.detail);
        if let Some(hint) = &check.hint {
            println!("  {hint}");
        }
    }
    let passed = checks.iter().filter(|c| c.status == "pass").count();
    let failed = checks.iter().filter(|c| c.status == "fail").count();
    let info = checks.iter().filter(|c| c.status == "info").count();
    println!("\n{passed} checks passed, {failed} failed, {info} info");
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Herald Configuration
# Secrets (GITHUB_TOKEN, DISCORD_WEBHOOK) come from the workflow environment.

[discord]
# timeout_secs = 10

[assign]
# request_reviewers = false

# Author login -> reviewer logins. ASSIGNEE_MAP replaces this table.
[assign.reviewers]
# alice = ["bob", "carol"]

[reminder]
# skip_drafts = true
# active_until = "2025-12-31T23:59:59Z"

[messages]
# reminder_header = "🍀 리뷰가 필요한 PR 목록 🍀"
# pr_alarm_header = "🔔 PR 알림 ({action}) 🔔"
# reviewers_label = "리뷰어:"
# empty_review_body = "상세 리뷰 내용 없음"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(command) = &cli.command else {
        Cli::command().print_help().into_diagnostic()?;
        return Ok(());
    };

    let job = match command {
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
            return Ok(());
        }
        Command::Doctor { json } => return run_doctor(cli.config.as_deref(), *json),
        Command::Assign => Job::Assign,
        Command::PrAlarm => Job::PrAlarm,
        Command::Reminder => Job::Reminder,
        Command::ReviewSubmitted => Job::ReviewSubmitted,
    };

    match run_job(&cli, job).await {
        Ok(JobOutcome::NothingToDo(reason)) => info!("done, nothing to do ({reason})"),
        Ok(JobOutcome::Sent { entries }) => info!("done, sent {entries} PR entries"),
        Ok(JobOutcome::Assigned(outcome)) => info!("done, {outcome:?}"),
        Err(e) => {
            // workflow annotation on stdout, diagnostic on stderr
            println!("::error::{e}");
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(1);
        }
    }

    Ok(())
}
