//! Pluggable agent selection.
//!
//! Every strategy implements [`RoutingStrategy::select_agent`]: given a task
//! description, a read-only slice of candidate agents and an optional hard
//! capability filter, pick one agent or return `None`. Strategies never fail;
//! provider errors degrade to keyword matching internally.

/// First-non-null composition of strategies.
pub mod hybrid;
/// Keyword overlap scoring with load-balancing tie-break.
pub mod keyword;
/// Language-model delegated selection.
pub mod llm;
/// Embedding similarity selection.
pub mod vector;

pub use hybrid::HybridRoutingStrategy;
pub use keyword::KeywordRoutingStrategy;
pub use llm::LlmRoutingStrategy;
pub use vector::VectorRoutingStrategy;

use crate::agent::Agent;
use crate::config::{RoutingConfig, RoutingStrategyKind};
use crate::lexicon::CapabilityLexicon;
use agenthub_core::CompletionProvider;
use agenthub_memory::{EmbeddingProvider, LocalEmbedding};
use async_trait::async_trait;
use std::sync::Arc;

/// Selects the best agent for a task.
#[async_trait]
pub trait RoutingStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Pick an agent from `candidates`, or `None` if nothing fits.
    ///
    /// `required_capability`, when given, is a hard filter applied before
    /// any scoring. Implementations must not mutate agent state.
    async fn select_agent(
        &self,
        description: &str,
        candidates: &[Arc<Agent>],
        required_capability: Option<&str>,
    ) -> Option<Arc<Agent>>;
}

/// Available agents that carry `capability`.
pub(crate) fn with_capability<'a>(
    candidates: &'a [Arc<Agent>],
    capability: &str,
) -> Vec<&'a Arc<Agent>> {
    candidates
        .iter()
        .filter(|a| a.has_capability(capability) && a.is_available())
        .collect()
}

/// Among equally good agents, prefer the least loaded; earlier entries win
/// remaining ties.
pub(crate) fn least_loaded<'a>(
    agents: impl IntoIterator<Item = &'a Arc<Agent>>,
) -> Option<&'a Arc<Agent>> {
    let mut best: Option<&Arc<Agent>> = None;
    for agent in agents {
        match best {
            Some(b) if b.current_task_count() <= agent.current_task_count() => {}
            _ => best = Some(agent),
        }
    }
    best
}

/// Optional collaborators a factory may wire into strategies.
#[derive(Clone, Default)]
pub struct RoutingProviders {
    /// Embedder for the vector strategy.
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    /// Model for the llm strategy.
    pub completion: Option<Arc<dyn CompletionProvider>>,
    /// Lexicon shared by keyword scoring and fallbacks.
    pub lexicon: Option<Arc<CapabilityLexicon>>,
}

/// Maps a configuration tag to a constructed strategy.
pub struct RoutingStrategyFactory;

impl RoutingStrategyFactory {
    /// Build a strategy from a raw tag. Unknown tags yield keyword routing.
    pub fn from_tag(
        tag: &str,
        config: &RoutingConfig,
        providers: &RoutingProviders,
    ) -> Arc<dyn RoutingStrategy> {
        Self::create(RoutingStrategyKind::from_tag(tag), config, providers)
    }

    /// Build the strategy of the given kind.
    ///
    /// Vector routing uses the supplied embedder or a [`LocalEmbedding`] of the
    /// configured dimension. LLM routing without a completion provider
    /// degrades to keyword routing. Hybrid chains LLM (if available), vector
    /// and keyword in that order.
    pub fn create(
        kind: RoutingStrategyKind,
        config: &RoutingConfig,
        providers: &RoutingProviders,
    ) -> Arc<dyn RoutingStrategy> {
        let lexicon = providers.lexicon.clone().unwrap_or_default();
        let keyword = || KeywordRoutingStrategy::with_lexicon(Arc::clone(&lexicon));
        let vector = || {
            let embedder = providers.embedder.clone().unwrap_or_else(|| {
                Arc::new(LocalEmbedding::new(config.vector.dimensions)) as Arc<dyn EmbeddingProvider>
            });
            VectorRoutingStrategy::new(embedder, config.vector.similarity_threshold)
                .with_fallback(keyword())
        };

        match kind {
            RoutingStrategyKind::Keyword => Arc::new(keyword()),
            RoutingStrategyKind::Vector => Arc::new(vector()),
            RoutingStrategyKind::Llm => match &providers.completion {
                Some(provider) => Arc::new(
                    LlmRoutingStrategy::new(Arc::clone(provider)).with_fallback(keyword()),
                ),
                None => {
                    tracing::warn!("LLM routing requested without a completion provider, using keyword");
                    Arc::new(keyword())
                }
            },
            RoutingStrategyKind::Hybrid => {
                let mut chain: Vec<Arc<dyn RoutingStrategy>> = Vec::new();
                if let Some(provider) = &providers.completion {
                    chain.push(Arc::new(
                        LlmRoutingStrategy::new(Arc::clone(provider)).with_fallback(keyword()),
                    ));
                }
                chain.push(Arc::new(vector()));
                chain.push(Arc::new(keyword()));
                Arc::new(HybridRoutingStrategy::new(chain))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::agent::{Agent, FnExecutor, TaskExecutor};
    use crate::types::Task;
    use std::sync::Arc;

    pub fn agent(id: &str, description: &str, capabilities: &[&str], max: usize) -> Arc<Agent> {
        let executor: Arc<dyn TaskExecutor> =
            Arc::new(FnExecutor::new(|_task: Task| async move { Ok("ok".to_string()) }));
        Arc::new(
            Agent::builder(id)
                .description(description)
                .capabilities(capabilities.iter().copied())
                .max_concurrent_tasks(max)
                .build(executor)
                .unwrap_or_else(|e| panic!("test agent: {e}")),
        )
    }

    pub fn coder_and_researcher() -> Vec<Arc<Agent>> {
        vec![
            agent("coder", "Writes and debugs software", &["coding"], 2),
            agent("researcher", "Investigates topics and summarises sources", &["research"], 2),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::config::VectorConfig;
    use agenthub_core::HubResult;

    struct Fixed(&'static str);

    #[async_trait]
    impl CompletionProvider for Fixed {
        async fn complete(&self, _prompt: &str) -> HubResult<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_least_loaded_prefers_idle_then_order() {
        let agents = vec![
            agent("a", "", &["coding"], 2),
            agent("b", "", &["coding"], 2),
            agent("c", "", &["coding"], 2),
        ];
        let _busy = agents[0].try_reserve().unwrap();
        assert_eq!(least_loaded(&agents).unwrap().id(), "b");
        assert!(least_loaded(&Vec::<Arc<Agent>>::new()).is_none());
    }

    #[test]
    fn test_with_capability_skips_full_agents() {
        let agents = vec![agent("a", "", &["coding"], 1), agent("b", "", &["coding"], 1)];
        let _busy = agents[0].try_reserve().unwrap();
        let ids: Vec<&str> = with_capability(&agents, "CODING").into_iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_factory_names() {
        let config = RoutingConfig::default();
        let none = RoutingProviders::default();
        assert_eq!(RoutingStrategyFactory::from_tag("keyword", &config, &none).name(), "keyword");
        assert_eq!(RoutingStrategyFactory::from_tag("vector", &config, &none).name(), "vector");
        assert_eq!(RoutingStrategyFactory::from_tag("hybrid", &config, &none).name(), "hybrid");
        assert_eq!(RoutingStrategyFactory::from_tag("bogus", &config, &none).name(), "keyword");
        // No completion provider: llm degrades to keyword.
        assert_eq!(RoutingStrategyFactory::from_tag("llm", &config, &none).name(), "keyword");

        let with_llm = RoutingProviders {
            completion: Some(Arc::new(Fixed("coder"))),
            ..RoutingProviders::default()
        };
        assert_eq!(RoutingStrategyFactory::from_tag("llm", &config, &with_llm).name(), "llm");
    }

    #[tokio::test]
    async fn test_factory_strategies_route_scenario() {
        let agents = coder_and_researcher();
        let config = RoutingConfig {
            vector: VectorConfig {
                similarity_threshold: 0.05,
                ..VectorConfig::default()
            },
            ..RoutingConfig::default()
        };
        let providers = RoutingProviders {
            completion: Some(Arc::new(Fixed("researcher"))),
            ..RoutingProviders::default()
        };
        for tag in ["keyword", "vector", "hybrid"] {
            let strategy = RoutingStrategyFactory::from_tag(tag, &config, &RoutingProviders::default());
            let chosen = strategy
                .select_agent("Write a Python function to sort an array", &agents, None)
                .await
                .unwrap();
            assert_eq!(chosen.id(), "coder", "strategy {tag}");
        }
        let llm = RoutingStrategyFactory::from_tag("llm", &config, &providers);
        let chosen = llm.select_agent("Research AI trends", &agents, None).await.unwrap();
        assert_eq!(chosen.id(), "researcher");
    }
}
