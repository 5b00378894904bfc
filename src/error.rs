use thiserror::Error;

/// Error kinds a flow run can surface.
///
/// Transient interaction failures (a blocked keystroke, a masked input
/// swallowing typed text) are recovered inside the commit ladder and never
/// reach this type.
#[derive(Debug, Error)]
pub enum FlowError {
    /// An element never became visible/attached within its wait budget.
    /// Fatal for the current flow.
    #[error("element not found: {selector} (waited {timeout_ms}ms)")]
    ElementNotFound { selector: String, timeout_ms: u64 },

    /// The rendered error text did not match the expected text under the
    /// lenient containment policy.
    #[error(
        "expected error text not found\n  expected (contains/equals): \"{expected}\"\n  actual:                     \"{actual}\""
    )]
    AssertionMismatch { expected: String, actual: String },

    /// Screenshot capture failed after the bounded retry loop.
    #[error("screenshot capture failed: {0}")]
    Screenshot(String),

    /// One or more required configuration values are absent. All missing
    /// names are listed in a single message.
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    /// Building or delivering the report email failed.
    #[error("mail delivery failed: {0}")]
    Mail(String),
}
