use thiserror::Error;

/// Failure reported by a synthesis capability. The variant is the
/// classification the dispatcher acts on.
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// The service is throttling us (quota or rate limit)
    #[error("Rate limited: {0}")]
    RateLimited(anyhow::Error),

    /// The service refused the content (safety or policy filtering)
    #[error("Content rejected: {0}")]
    ContentRejected(anyhow::Error),

    #[error("Transient error: {0}")]
    Transient(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisErrorKind {
    RateLimited,
    ContentRejected,
    Transient,
}

impl SynthesisError {
    pub fn kind(&self) -> SynthesisErrorKind {
        match self {
            Self::RateLimited(_) => SynthesisErrorKind::RateLimited,
            Self::ContentRejected(_) => SynthesisErrorKind::ContentRejected,
            Self::Transient(_) => SynthesisErrorKind::Transient,
        }
    }

    /// The underlying message, without the classification prefix
    pub fn message(&self) -> String {
        match self {
            Self::RateLimited(e) | Self::ContentRejected(e) | Self::Transient(e) => e.to_string(),
        }
    }
}
