// Error types for the conversation engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while handling a conversation turn
///
/// None of these should ever surface to an end user as a crash: the engine
/// translates each variant into a user-facing reply before the transport
/// layer sees it. Only storage faults propagate upward.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A user-scoped entity does not exist (or belongs to another user)
    #[error("event {0} not found")]
    NotFound(i64),

    /// The language capability could not be reached (transport error or timeout)
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The language capability answered, but the response could not be parsed
    /// into the expected shape
    #[error("capability response malformed: {0}")]
    CapabilityMalformed(String),

    /// Invalid event fields (empty title, end before start, ...) rejected
    /// before reaching the store
    #[error("validation failed: {0}")]
    Validation(String),

    /// An event reference could not be resolved with enough confidence
    #[error("ambiguous event reference: {0}")]
    AmbiguousReference(String),

    /// Backing storage error
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    /// Create a capability-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        EngineError::CapabilityUnavailable(msg.into())
    }

    /// Create a capability-malformed error
    pub fn malformed(msg: impl Into<String>) -> Self {
        EngineError::CapabilityMalformed(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Create an ambiguous-reference error
    pub fn ambiguous(msg: impl Into<String>) -> Self {
        EngineError::AmbiguousReference(msg.into())
    }

    /// True for errors originating at the capability boundary
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            EngineError::CapabilityUnavailable(_) | EngineError::CapabilityMalformed(_)
        )
    }
}
