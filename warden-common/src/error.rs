//! Error types for the Warden runtime.

use thiserror::Error;

/// Result type alias using the Warden error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Warden crates.
#[derive(Error, Debug)]
pub enum Error {
    /// An agent with the same identifier is already registered.
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    /// No agent with the given identifier exists in the registry.
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// No action with the given identifier exists in the queue.
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    /// An action was not in the status required for the requested transition.
    #[error("Action {id} is {status}, expected pending")]
    InvalidActionState {
        /// Action identifier.
        id: String,
        /// Current status of the action.
        status: String,
    },

    /// A schedule expression could not be parsed.
    #[error("Invalid schedule expression '{expression}': {detail}")]
    InvalidSchedule {
        /// The offending expression.
        expression: String,
        /// What went wrong.
        detail: String,
    },

    /// A tool capability call reported failure.
    #[error("Tool failure: {0}")]
    Tool(String),

    /// An agent's execute stage failed.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error means a referenced entity does not exist.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::AgentNotFound(_) | Self::ActionNotFound(_))
    }

    /// Check if this error came from the tool capability surface.
    pub const fn is_tool(&self) -> bool {
        matches!(self, Self::Tool(_))
    }
}
