use super::{least_loaded, with_capability, RoutingStrategy};
use crate::agent::Agent;
use crate::lexicon::{tokenize, CapabilityLexicon};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Scores agents by keyword overlap between the task description and the
/// agent's capability tags (expanded through the lexicon) and description.
///
/// Among the top scores the least-loaded agent wins. A candidate needs a
/// score above zero to be selected.
#[derive(Clone)]
pub struct KeywordRoutingStrategy {
    lexicon: Arc<CapabilityLexicon>,
}

impl KeywordRoutingStrategy {
    /// Keyword routing with the built-in lexicon.
    pub fn new() -> Self {
        Self::with_lexicon(Arc::new(CapabilityLexicon::default()))
    }

    /// Keyword routing with a custom lexicon.
    pub fn with_lexicon(lexicon: Arc<CapabilityLexicon>) -> Self {
        Self { lexicon }
    }

    /// Lexicon used for scoring.
    pub fn lexicon(&self) -> &CapabilityLexicon {
        &self.lexicon
    }

    /// Overlap score of `agent` for the given distinct description tokens.
    ///
    /// Each token counts once if it names or triggers one of the agent's
    /// capabilities, and once more if it appears in the agent description.
    pub fn score(&self, tokens: &BTreeSet<String>, agent: &Agent) -> usize {
        let description_words: BTreeSet<String> = tokenize(agent.description()).into_iter().collect();
        tokens
            .iter()
            .map(|token| {
                let capability_hit = agent.capabilities().iter().any(|cap| {
                    cap == token
                        || self
                            .lexicon
                            .keywords_for(cap)
                            .is_some_and(|kw| kw.contains(token))
                });
                usize::from(capability_hit) + usize::from(description_words.contains(token))
            })
            .sum()
    }

    /// Synchronous selection, shared by the hub's blocking lookup and by
    /// the fallbacks of the other strategies.
    pub fn select(
        &self,
        description: &str,
        candidates: &[Arc<Agent>],
        required_capability: Option<&str>,
    ) -> Option<Arc<Agent>> {
        let eligible: Vec<&Arc<Agent>> = match required_capability {
            Some(cap) => with_capability(candidates, cap),
            None => {
                let requirement = self.lexicon.infer(description);
                candidates
                    .iter()
                    .filter(|a| a.can_handle_task(&requirement))
                    .collect()
            }
        };
        if eligible.is_empty() {
            return None;
        }

        let tokens: BTreeSet<String> = tokenize(description).into_iter().collect();
        // A declared capability is itself one point of overlap.
        let bonus = usize::from(required_capability.is_some());

        let scored: Vec<(&Arc<Agent>, usize)> = eligible
            .into_iter()
            .map(|agent| (agent, self.score(&tokens, agent) + bonus))
            .collect();
        for (agent, score) in &scored {
            debug!(agent_id = %agent.id(), score, "Keyword score");
        }

        let top = scored.iter().map(|(_, s)| *s).max().unwrap_or(0);
        if top == 0 {
            return None;
        }
        least_loaded(scored.iter().filter(|(_, s)| *s == top).map(|(a, _)| *a)).cloned()
    }
}

impl Default for KeywordRoutingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoutingStrategy for KeywordRoutingStrategy {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn select_agent(
        &self,
        description: &str,
        candidates: &[Arc<Agent>],
        required_capability: Option<&str>,
    ) -> Option<Arc<Agent>> {
        self.select(description, candidates, required_capability)
    }
}
