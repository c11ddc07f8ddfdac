use super::{with_capability, KeywordRoutingStrategy, RoutingStrategy};
use crate::agent::Agent;
use agenthub_core::CompletionProvider;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

/// Asks a language model to choose an agent from the candidate list.
///
/// The model may answer with a bare agent id, a JSON object carrying
/// `agent_id`, or prose mentioning exactly one candidate id. Only a bare
/// `NONE` means no candidate fits. Provider errors and every other answer
/// without a usable id go to the keyword fallback.
pub struct LlmRoutingStrategy {
    provider: Arc<dyn CompletionProvider>,
    fallback: KeywordRoutingStrategy,
}

/// What the model answered, once interpreted against the candidate ids.
#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Agent(String),
    NoMatch,
    Unusable,
}

#[derive(Deserialize)]
struct JsonAnswer {
    #[serde(alias = "agentId", alias = "agent")]
    agent_id: Option<String>,
}

impl LlmRoutingStrategy {
    /// Ask `provider`, falling back to keyword routing.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            fallback: KeywordRoutingStrategy::new(),
        }
    }

    /// Replace the keyword fallback.
    pub fn with_fallback(mut self, fallback: KeywordRoutingStrategy) -> Self {
        self.fallback = fallback;
        self
    }

    fn build_prompt(description: &str, eligible: &[&Arc<Agent>]) -> String {
        let mut prompt = String::from(
            "You route tasks to agents. Pick the single best agent for the task below.\n\n",
        );
        let _ = writeln!(prompt, "Task: {}\n", description.trim());
        prompt.push_str("Agents:\n");
        for agent in eligible {
            let _ = writeln!(
                prompt,
                "- id: {} | description: {} | capabilities: {}",
                agent.id(),
                agent.description(),
                agent.capabilities().join(", ")
            );
        }
        prompt.push_str(
            "\nAnswer with the agent id only, or NONE if no agent is suitable.",
        );
        prompt
    }

    fn interpret(response: &str, ids: &[&str]) -> Answer {
        let trimmed = response.trim();
        if trimmed.is_empty() {
            return Answer::Unusable;
        }

        if let Some(answer) = Self::interpret_json(trimmed) {
            return answer.map_or(Answer::Unusable, |id| Self::resolve(&id, ids));
        }

        let bare = trimmed
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.' | '*'))
            .trim();
        if bare.eq_ignore_ascii_case("none") {
            return Answer::NoMatch;
        }
        if let Some(id) = ids.iter().find(|id| bare.eq_ignore_ascii_case(id)) {
            return Answer::Agent((*id).to_string());
        }

        // Free text: accept only if exactly one id is mentioned. Longer ids
        // are checked first so "coder-2" is not also counted as "coder".
        let lowered = trimmed.to_lowercase();
        let mut sorted: Vec<&str> = ids.to_vec();
        sorted.sort_by_key(|id| std::cmp::Reverse(id.len()));
        let mut remaining = lowered;
        let mut mentioned: Vec<&str> = Vec::new();
        for id in sorted {
            let needle = id.to_lowercase();
            if remaining.contains(&needle) {
                mentioned.push(id);
                remaining = remaining.replace(&needle, " ");
            }
        }
        match mentioned.as_slice() {
            [only] => Answer::Agent((*only).to_string()),
            _ => Answer::Unusable,
        }
    }

    /// `Some(agent_id)` if the response holds a JSON object; the inner value
    /// is `None` when the object carries no id.
    fn interpret_json(response: &str) -> Option<Option<String>> {
        let start = response.find('{')?;
        let end = response.rfind('}')?;
        if end <= start {
            return None;
        }
        let parsed: JsonAnswer = serde_json::from_str(&response[start..=end]).ok()?;
        Some(parsed.agent_id)
    }

    fn resolve(answer: &str, ids: &[&str]) -> Answer {
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case("none") {
            return Answer::NoMatch;
        }
        ids.iter()
            .find(|id| answer.eq_ignore_ascii_case(id))
            .map_or(Answer::Unusable, |id| Answer::Agent((*id).to_string()))
    }
}

#[async_trait]
impl RoutingStrategy for LlmRoutingStrategy {
    fn name(&self) -> &str {
        "llm"
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
        if eligible.is_empty() {
            return None;
        }

        let prompt = Self::build_prompt(description, &eligible);
        let response = match self.provider.complete(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = %self.provider.name(), error = %e, "LLM routing failed, falling back to keyword");
                return self.fallback.select(description, candidates, required_capability);
            }
        };

        let ids: Vec<&str> = eligible.iter().map(|a| a.id()).collect();
        match Self::interpret(&response, &ids) {
            Answer::Agent(id) => {
                debug!(agent_id = %id, "LLM selected agent");
                eligible.into_iter().find(|a| a.id() == id).cloned()
            }
            Answer::NoMatch => {
                debug!("LLM found no suitable agent");
                None
            }
            Answer::Unusable => {
                warn!(response = %response.trim(), "Unusable LLM routing answer, falling back to keyword");
                self.fallback.select(description, candidates, required_capability)
            }
        }
    }
}
