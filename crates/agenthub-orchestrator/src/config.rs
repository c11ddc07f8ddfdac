use crate::agent::AgentDefinition;
use agenthub_core::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which routing strategy the hub uses for smart delegation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingStrategyKind {
    /// Keyword overlap with capabilities and description.
    #[default]
    Keyword,
    /// Embedding similarity.
    Vector,
    /// Ask a completion provider.
    Llm,
    /// LLM, then vector, then keyword.
    Hybrid,
}

impl RoutingStrategyKind {
    /// Parse a configuration tag. Unknown tags fall back to `Keyword`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "keyword" => RoutingStrategyKind::Keyword,
            "vector" => RoutingStrategyKind::Vector,
            "llm" => RoutingStrategyKind::Llm,
            "hybrid" => RoutingStrategyKind::Hybrid,
            other => {
                tracing::warn!(tag = %other, "Unknown routing strategy, using keyword");
                RoutingStrategyKind::Keyword
            }
        }
    }
}

impl<'de> Deserialize<'de> for RoutingStrategyKind {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(d)?;
        Ok(Self::from_tag(&tag))
    }
}

impl std::fmt::Display for RoutingStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingStrategyKind::Keyword => write!(f, "keyword"),
            RoutingStrategyKind::Vector => write!(f, "vector"),
            RoutingStrategyKind::Llm => write!(f, "llm"),
            RoutingStrategyKind::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Embedding settings for vector routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Embedding dimension for the local embedder.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Minimum cosine similarity for a vector match, in `0.0..=1.0`.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Routing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Strategy used for smart delegation.
    #[serde(default)]
    pub strategy: RoutingStrategyKind,
    /// Settings for the vector strategy.
    #[serde(default, alias = "vector_config")]
    pub vector: VectorConfig,
}

/// Log verbosity requested by the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Routing decisions and scores.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Rejections and fallbacks.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Top-level hub configuration, usually loaded from `agenthub.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Concurrency limit for agents that do not set their own.
    #[serde(default = "default_max_concurrent_tasks")]
    pub default_max_concurrent_tasks: usize,
    /// Routing settings.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Used when `RUST_LOG` is not set.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Source name stamped on published events.
    #[serde(default = "default_source")]
    pub source: String,
    /// Session id stamped on published events.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Agents declared in the file; consumed by front ends, not by the hub.
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
}

fn default_max_concurrent_tasks() -> usize {
    3
}

fn default_dimensions() -> usize {
    256
}

fn default_similarity_threshold() -> f32 {
    0.3
}

fn default_source() -> String {
    "agent-hub".to_string()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            default_max_concurrent_tasks: default_max_concurrent_tasks(),
            routing: RoutingConfig::default(),
            log_level: LogLevel::default(),
            source: default_source(),
            session_id: None,
            agents: Vec::new(),
        }
    }
}

impl HubConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> HubResult<Self> {
        let config: HubConfig =
            toml::from_str(s).map_err(|e| HubError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> HubResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading hub config");
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&raw)
    }

    /// Reject zero limits, out-of-range thresholds and blank agent ids.
    pub fn validate(&self) -> HubResult<()> {
        if self.default_max_concurrent_tasks == 0 {
            return Err(HubError::Config(
                "default_max_concurrent_tasks must be positive".into(),
            ));
        }
        if self.routing.vector.dimensions == 0 {
            return Err(HubError::Config(
                "routing.vector.dimensions must be positive".into(),
            ));
        }
        let threshold = self.routing.vector.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(HubError::Config(format!(
                "routing.vector.similarity_threshold must be within [0, 1], got {threshold}"
            )));
        }
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err(HubError::InvalidAgentId(agent.id.clone()));
            }
            if agent.max_concurrent_tasks == Some(0) {
                return Err(HubError::Config(format!(
                    "agent '{}': max_concurrent_tasks must be positive",
                    agent.id
                )));
            }
        }
        Ok(())
    }
}
