use super::{with_capability, KeywordRoutingStrategy, RoutingStrategy};
use crate::agent::Agent;
use agenthub_core::{HubError, HubResult};
use agenthub_memory::{cosine_similarity, is_degenerate, EmbeddingProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Profile embeddings kept before entries for agents that are no longer
/// offered as candidates get dropped.
const DEFAULT_CACHE_LIMIT: usize = 1024;

struct CachedProfile {
    text: String,
    vector: Arc<Vec<f32>>,
}

/// Picks the candidate whose profile embedding is closest (cosine) to the
/// task description, provided the similarity reaches the threshold.
///
/// Any embedding failure, zero vector or dimension mismatch hands the
/// decision to the keyword fallback.
pub struct VectorRoutingStrategy {
    embedder: Arc<dyn EmbeddingProvider>,
    similarity_threshold: f32,
    fallback: KeywordRoutingStrategy,
    cache: Mutex<HashMap<String, CachedProfile>>,
    cache_limit: usize,
}

impl VectorRoutingStrategy {
    /// Route by embedding similarity, keeping matches at or above `similarity_threshold`.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, similarity_threshold: f32) -> Self {
        Self {
            embedder,
            similarity_threshold,
            fallback: KeywordRoutingStrategy::new(),
            cache: Mutex::new(HashMap::new()),
            cache_limit: DEFAULT_CACHE_LIMIT,
        }
    }

    /// Number of cached profiles above which departed agents are forgotten.
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = limit;
        self
    }

    /// Replace the keyword fallback.
    pub fn with_fallback(mut self, fallback: KeywordRoutingStrategy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Minimum similarity for a match.
    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Number of cached agent profile embeddings.
    pub fn cached_profiles(&self) -> usize {
        self.cache.lock().len()
    }

    /// Agent profile text, expanded with the lexicon keywords of each of its
    /// capabilities so short tag lists still carry signal.
    fn profile_text(&self, agent: &Agent) -> String {
        let mut text = agent.profile_text();
        for cap in agent.capabilities() {
            if let Some(words) = self.fallback.lexicon().keywords_for(cap) {
                for word in words {
                    text.push(' ');
                    text.push_str(word);
                }
            }
        }
        text
    }

    async fn agent_vector(&self, agent: &Agent) -> HubResult<Arc<Vec<f32>>> {
        let text = self.profile_text(agent);
        let cached = self
            .cache
            .lock()
            .get(agent.id())
            .filter(|c| c.text == text)
            .map(|c| Arc::clone(&c.vector));
        if let Some(vector) = cached {
            return Ok(vector);
        }

        let vector = Arc::new(self.embedder.embed(&text).await?);
        if is_degenerate(&vector) {
            return Err(HubError::Provider(format!(
                "degenerate embedding for agent '{}'",
                agent.id()
            )));
        }
        self.cache.lock().insert(
            agent.id().to_string(),
            CachedProfile {
                text,
                vector: Arc::clone(&vector),
            },
        );
        Ok(vector)
    }

    /// Past the limit, forget profiles of agents outside `candidates`
    /// (unregistered, or busy and re-embedded on their next appearance).
    fn prune_cache(&self, candidates: &[Arc<Agent>]) {
        let mut cache = self.cache.lock();
        if cache.len() <= self.cache_limit {
            return;
        }
        let before = cache.len();
        cache.retain(|id, _| candidates.iter().any(|a| a.id() == id));
        debug!(evicted = before - cache.len(), "Pruned profile cache");
    }

    async fn rank(
        &self,
        description: &str,
        eligible: &[&Arc<Agent>],
    ) -> HubResult<Option<Arc<Agent>>> {
        let task_vector = self.embedder.embed(description).await?;
        if is_degenerate(&task_vector) {
            return Err(HubError::Provider("degenerate task embedding".into()));
        }

        let mut best: Option<(&Arc<Agent>, f32)> = None;
        for &agent in eligible {
            let agent_vector = self.agent_vector(agent).await?;
            let similarity = cosine_similarity(&task_vector, &agent_vector).ok_or_else(|| {
                HubError::Provider(format!(
                    "incomparable embeddings for agent '{}' ({} vs {} dims)",
                    agent.id(),
                    task_vector.len(),
                    agent_vector.len()
                ))
            })?;
            debug!(agent_id = %agent.id(), similarity, "Vector similarity");

            if similarity < self.similarity_threshold {
                continue;
            }
            let keep_current = match best {
                Some((current, score)) => {
                    score > similarity
                        || (score >= similarity
                            && current.current_task_count() <= agent.current_task_count())
                }
                None => false,
            };
            if !keep_current {
                best = Some((agent, similarity));
            }
        }
        Ok(best.map(|(agent, _)| Arc::clone(agent)))
    }
}

#[async_trait]
impl RoutingStrategy for VectorRoutingStrategy {
    fn name(&self) -> &str {
        "vector"
    }

    async fn select_agent(
        &self,
        description: &str,
        candidates: &[Arc<Agent>],
        required_capability: Option<&str>,
    ) -> Option<Arc<Agent>> {
        let eligible: Vec<&Arc<Agent>> = match required_capability {
            Some(cap) => with_capability(candidates, cap),
            None => candidates.iter().filter(|a| a.is_available()).collect(),
        };
        match eligible.as_slice() {
            [] => return None,
            [only] => return Some(Arc::clone(only)),
            _ => {}
        }

        let choice = match self.rank(description, &eligible).await {
            Ok(choice) => choice,
            Err(e) => {
                warn!(error = %e, "Vector routing failed, falling back to keyword");
                self.fallback
                    .select(description, candidates, required_capability)
            }
        };
        self.prune_cache(candidates);
        choice
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::routing::test_support::{agent, coder_and_researcher};
    use agenthub_memory::LocalEmbedding;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Always fails, to exercise the keyword fallback.
    struct Offline;

    #[async_trait]
    impl EmbeddingProvider for Offline {
        async fn embed(&self, _text: &str) -> HubResult<Vec<f32>> {
            Err(HubError::Provider("embedding service offline".into()))
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    /// Returns zero vectors only.
    struct Zeros;

    #[async_trait]
    impl EmbeddingProvider for Zeros {
        async fn embed(&self, _text: &str) -> HubResult<Vec<f32>> {
            Ok(vec![0.0; 8])
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    /// Counts calls while delegating to a local embedder.
    struct Counting {
        inner: LocalEmbedding,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for Counting {
        async fn embed(&self, text: &str) -> HubResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    fn local(threshold: f32) -> VectorRoutingStrategy {
        VectorRoutingStrategy::new(Arc::new(LocalEmbedding::default()), threshold)
    }

    #[tokio::test]
    async fn test_picks_most_similar() {
        let strategy = local(0.05);
        let agents = coder_and_researcher();
        let chosen = strategy
            .select_agent("Write a Python function to sort an array", &agents, None)
            .await
            .unwrap();
        assert_eq!(chosen.id(), "coder");

        let chosen = strategy
            .select_agent("Research the latest AI trends and survey papers", &agents, None)
            .await
            .unwrap();
        assert_eq!(chosen.id(), "researcher");
    }

    #[tokio::test]
    async fn test_single_candidate_short_circuits() {
        let strategy = VectorRoutingStrategy::new(Arc::new(Offline), 0.99);
        let agents = vec![agent("solo", "", &["misc"], 1)];
        let chosen = strategy.select_agent("anything", &agents, None).await.unwrap();
        assert_eq!(chosen.id(), "solo");
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        assert!(local(0.1).select_agent("anything", &[], None).await.is_none());
    }

    #[tokio::test]
    async fn test_provider_error_falls_back_to_keyword() {
        let strategy = VectorRoutingStrategy::new(Arc::new(Offline), 0.5);
        let agents = coder_and_researcher();
        let chosen = strategy
            .select_agent("Research AI trends", &agents, None)
            .await
            .unwrap();
        assert_eq!(chosen.id(), "researcher");
    }

    #[tokio::test]
    async fn test_zero_vectors_fall_back_to_keyword() {
        let strategy = VectorRoutingStrategy::new(Arc::new(Zeros), 0.5);
        let agents = coder_and_researcher();
        let chosen = strategy
            .select_agent("fix the bug in this function", &agents, None)
            .await
            .unwrap();
        assert_eq!(chosen.id(), "coder");
    }

    #[tokio::test]
    async fn test_required_capability_filter() {
        let strategy = local(0.0);
        let agents = coder_and_researcher();
        let chosen = strategy
            .select_agent("Write a Python function", &agents, Some("research"))
            .await
            .unwrap();
        assert_eq!(chosen.id(), "researcher");
        assert!(strategy
            .select_agent("Write a Python function", &agents, Some("nonexistent_capability"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_higher_threshold_never_matches_more() {
        let strict = local(0.9);
        let loose = local(0.1);
        let agents = vec![
            agent("coder", "Writes and debugs software", &["coding"], 1),
            agent("researcher", "Investigates topics", &["research"], 1),
            agent("writer", "Drafts articles and blog posts", &["writing"], 1),
        ];
        let tasks = [
            "Write a Python function to sort an array",
            "Research AI trends",
            "Draft a blog article about gardening",
            "Bake a cake",
        ];
        let mut strict_matches = 0;
        let mut loose_matches = 0;
        for task in tasks {
            let s = strict.select_agent(task, &agents, None).await;
            let l = loose.select_agent(task, &agents, None).await;
            if s.is_some() {
                strict_matches += 1;
                assert!(l.is_some(), "loose threshold must also match '{task}'");
            }
            if l.is_some() {
                loose_matches += 1;
            }
        }
        assert!(strict_matches <= loose_matches);
    }

    #[tokio::test]
    async fn test_profiles_are_cached() {
        let embedder = Arc::new(Counting {
            inner: LocalEmbedding::default(),
            calls: AtomicUsize::new(0),
        });
        let strategy = VectorRoutingStrategy::new(embedder.clone(), 0.0);
        let agents = coder_and_researcher();

        strategy.select_agent("sort an array", &agents, None).await;
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(strategy.cached_profiles(), 2);

        strategy.select_agent("sort a list", &agents, None).await;
        // Only the task itself is embedded again.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_equal_similarity_prefers_idle_agent() {
        let strategy = local(0.0);
        let agents = vec![
            agent("twin-1", "Writes code", &["coding"], 2),
            agent("twin-2", "Writes code", &["coding"], 2),
        ];
        let _slot = agents[0].try_reserve().unwrap();
        let chosen = strategy.select_agent("write code", &agents, None).await.unwrap();
        assert_eq!(chosen.id(), "twin-2");
    }

    #[tokio::test]
    async fn test_cache_forgets_departed_agents_past_limit() {
        let strategy = local(0.0).with_cache_limit(2);
        let agents = coder_and_researcher();
        strategy.select_agent("sort an array", &agents, None).await;
        assert_eq!(strategy.cached_profiles(), 2);

        // researcher is gone; writer takes its place.
        let current = vec![
            Arc::clone(&agents[0]),
            agent("writer", "Drafts articles and blog posts", &["writing"], 1),
        ];
        strategy.select_agent("draft a blog post", &current, None).await;
        assert_eq!(strategy.cached_profiles(), 2);
    }
}
