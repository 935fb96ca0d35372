//! Review status tracking and notification for pull requests.
//!
//! Provides the aggregator that turns review history into a merge-readiness
//! summary, message rendering, the GitHub and Discord clients, and the
//! workflow jobs that tie them together.

pub mod aggregate;
pub mod assign;
pub mod discord;
pub mod event;
pub mod github;
pub mod message;
pub mod pipeline;
