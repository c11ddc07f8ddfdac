//! Capability-based agent registry, task routing and delegation.
//!
//! The [`AgentHub`] keeps a registry of agents, each advertising capability
//! tags and a concurrency limit. Tasks are either delegated to a named agent
//! or routed by a pluggable [`RoutingStrategy`] (keyword, vector, LLM or a
//! hybrid chain). Capacity is reserved atomically before any work starts and
//! released on every exit path.
//!
//! # Main types
//!
//! - [`AgentHub`] — Registry, scheduler and stats.
//! - [`Agent`] — A capability-tagged worker backed by a [`TaskExecutor`].
//! - [`TaskManager`] — Task records, lifecycle transitions and results.
//! - [`RoutingStrategy`] — Agent selection; see [`routing`] for implementations.
//! - [`EventBus`] — Fire-and-forget lifecycle notifications.
//! - [`HubConfig`] — TOML configuration.

/// Agents, executors and capacity permits.
pub mod agent;
/// TOML configuration.
pub mod config;
/// Lifecycle event publishing.
pub mod events;
/// The hub itself.
pub mod hub;
/// Capability keyword tables.
pub mod lexicon;
pub mod routing;
/// Task records and lifecycle.
pub mod task_manager;
/// Shared task, status and stats types.
pub mod types;

pub use agent::{Agent, AgentBuilder, AgentDefinition, CapacityPermit, FnExecutor, TaskExecutor};
pub use config::{HubConfig, LogLevel, RoutingConfig, RoutingStrategyKind, VectorConfig};
pub use events::{EventBus, EventFilter, EventHandler, HubEvent, HubEventType};
pub use hub::{AgentHub, AgentHubBuilder};
pub use lexicon::{CapabilityLexicon, TaskRequirement};
pub use routing::{
    HybridRoutingStrategy, KeywordRoutingStrategy, LlmRoutingStrategy, RoutingProviders,
    RoutingStrategy, RoutingStrategyFactory, VectorRoutingStrategy,
};
pub use task_manager::{TaskCounts, TaskManager};
pub use types::{
    AgentStatus, HubStats, SystemStatus, Task, TaskOptions, TaskOutcome, TaskPriority,
    TaskResult, TaskStatus,
};
