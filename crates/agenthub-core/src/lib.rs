//! Core types and error definitions for the agent hub.
//!
//! This crate provides the foundational types shared across all hub crates:
//! the unified error enum and the narrow provider interfaces the scheduler
//! consumes from the outside world.
//!
//! # Main types
//!
//! - [`HubError`] — Unified error enum for all hub subsystems.
//! - [`HubResult`] — Convenience alias for `Result<T, HubError>`.
//! - [`CompletionProvider`] — Text-completion interface used by LLM-based routing.

/// Narrow interfaces to external model providers.
pub mod provider;

pub use provider::CompletionProvider;

// --- Error types ---

/// Top-level error type for the agent hub.
///
/// The first five variants form the scheduling taxonomy: they are returned
/// to callers as rejected operations. The remaining variants describe
/// failures inside collaborators and are usually absorbed (an executor error
/// becomes a failed `TaskResult`, a provider error triggers a routing fallback).
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// No agent with the given id is registered.
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// The agent exists but has no free execution slot.
    #[error("Agent unavailable (at capacity): {0}")]
    AgentUnavailable(String),

    /// An agent with the same id is already registered.
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    /// Routing produced no candidate for the task description.
    #[error("No suitable agent for task: {0}")]
    NoSuitableAgent(String),

    /// The agent id is empty or whitespace-only.
    #[error("Invalid agent id: {0:?}")]
    InvalidAgentId(String),

    /// The agent's own work failed.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An embedding or completion provider failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Unknown task id or an illegal task status transition.
    #[error("Task error: {0}")]
    Task(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An event could not be delivered to a subscriber.
    #[error("Event bus error: {0}")]
    EventBus(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    /// Returns `true` for errors that reject a scheduling operation
    /// (lookup miss, capacity, duplicate id, no route, invalid id).
    pub fn is_scheduling_rejection(&self) -> bool {
        matches!(
            self,
            HubError::AgentNotFound(_)
                | HubError::AgentUnavailable(_)
                | HubError::DuplicateAgent(_)
                | HubError::NoSuitableAgent(_)
                | HubError::InvalidAgentId(_)
        )
    }
}

/// A convenience `Result` alias using [`HubError`].
pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HubError::AgentNotFound("missing-agent".into());
        assert_eq!(err.to_string(), "Agent not found: missing-agent");

        let err = HubError::InvalidAgentId("   ".into());
        assert_eq!(err.to_string(), "Invalid agent id: \"   \"");
    }

    #[test]
    fn test_scheduling_rejections() {
        assert!(HubError::AgentUnavailable("a".into()).is_scheduling_rejection());
        assert!(HubError::DuplicateAgent("a".into()).is_scheduling_rejection());
        assert!(HubError::NoSuitableAgent("x".into()).is_scheduling_rejection());
        assert!(!HubError::Agent("boom".into()).is_scheduling_rejection());
        assert!(!HubError::Provider("timeout".into()).is_scheduling_rejection());
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: HubError = parse.unwrap_err().into();
        assert!(matches!(err, HubError::Json(_)));
    }
}
