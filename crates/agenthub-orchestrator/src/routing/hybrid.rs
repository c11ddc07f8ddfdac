use super::RoutingStrategy;
use crate::agent::Agent;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Tries each strategy in order and returns the first non-`None` choice.
pub struct HybridRoutingStrategy {
    chain: Vec<Arc<dyn RoutingStrategy>>,
}

impl HybridRoutingStrategy {
    /// Strategies are tried in order.
    pub fn new(chain: Vec<Arc<dyn RoutingStrategy>>) -> Self {
        Self { chain }
    }

    /// Names of the chained strategies, in order.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.chain.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl RoutingStrategy for HybridRoutingStrategy {
    fn name(&self) -> &str {
        "hybrid"
    }

    async fn select_agent(
        &self,
        description: &str,
        candidates: &[Arc<Agent>],
        required_capability: Option<&str>,
    ) -> Option<Arc<Agent>> {
        for strategy in &self.chain {
            if let Some(agent) = strategy
                .select_agent(description, candidates, required_capability)
                .await
            {
                debug!(strategy = %strategy.name(), agent_id = %agent.id(), "Hybrid routing matched");
                return Some(agent);
            }
            debug!(strategy = %strategy.name(), "No match, trying next strategy");
        }
        None
    }
}
