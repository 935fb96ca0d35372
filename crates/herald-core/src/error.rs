/// Errors that can occur while running a Herald job.
///
/// Library crates return this type directly; the binary renders it through
/// `miette` and marks the workflow run as failed.
///
/// # Examples
///
/// ```
/// use herald_core::HeraldError;
///
/// let err = HeraldError::Config("DISCORD_WEBHOOK not set".into());
/// assert!(err.to_string().contains("DISCORD_WEBHOOK"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum HeraldError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(herald::config),
        help("check the workflow `env:` block and .herald.toml")
    )]
    Config(String),

    /// GitHub REST API failure.
    #[error("GitHub error: {0}")]
    #[diagnostic(code(herald::github))]
    GitHub(String),

    /// Chat webhook returned a non-success status or could not be reached.
    #[error("delivery error: {0}")]
    #[diagnostic(code(herald::delivery))]
    Delivery(String),

    /// The workflow event payload is missing or malformed.
    #[error("event error: {0}")]
    #[diagnostic(
        code(herald::event),
        help("herald reads the payload from GITHUB_EVENT_PATH or --event-path")
    )]
    Event(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
