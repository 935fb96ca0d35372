//! Core types, configuration, and error handling for Herald.
//!
//! This crate provides the shared foundation used by the review crate and
//! the binary:
//! - [`HeraldError`]: unified error type using `thiserror`
//! - [`HeraldConfig`] / [`Settings`]: `.herald.toml` plus workflow environment
//! - [`MentionDirectory`]: GitHub login to chat identity
//! - Shared types: [`PullRequest`], [`ReviewEvent`], [`ReviewState`],
//!   [`ApprovalPolicy`]

mod config;
mod error;
mod mentions;
mod types;

pub use config::{
    parse_repository, AssignConfig, DiscordConfig, HeraldConfig, MessageTemplates, Overrides,
    ReminderConfig, Settings, ENV_ASSIGNEES, ENV_MENTIONS, ENV_REPOSITORY, ENV_WEBHOOK,
};
pub use error::HeraldError;
pub use mentions::{Mention, MentionDirectory};
pub use types::{ApprovalPolicy, PullRequest, ReviewEvent, ReviewState};

/// A convenience `Result` type for Herald operations.
pub type Result<T> = std::result::Result<T, HeraldError>;
