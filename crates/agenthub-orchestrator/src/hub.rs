use crate::agent::{Agent, AgentDefinition, TaskExecutor};
use crate::config::HubConfig;
use crate::events::{EventBus, HubEvent, HubEventType};
use crate::lexicon::CapabilityLexicon;
use crate::routing::{
    KeywordRoutingStrategy, RoutingProviders, RoutingStrategy, RoutingStrategyFactory,
};
use crate::task_manager::TaskManager;
use crate::types::{AgentStatus, HubStats, SystemStatus, Task, TaskOptions, TaskResult};
use agenthub_core::{CompletionProvider, HubError, HubResult};
use agenthub_memory::EmbeddingProvider;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Default)]
struct Registry {
    agents: HashMap<String, Arc<Agent>>,
    order: Vec<String>,
}

impl Registry {
    fn ordered(&self) -> impl Iterator<Item = &Arc<Agent>> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }
}

/// Central registry and scheduler.
///
/// Agents are registered once and looked up by id; tasks are delegated
/// either to a named agent or to whichever agent the routing strategy picks.
/// Delegation reserves an execution slot while the registry lock is held, so
/// an agent being unregistered never receives new work. A full agent
/// rejects the task with [`HubError::AgentUnavailable`]; nothing is queued.
pub struct AgentHub {
    config: HubConfig,
    registry: RwLock<Registry>,
    tasks: TaskManager,
    strategy: Arc<dyn RoutingStrategy>,
    keyword: KeywordRoutingStrategy,
    events: Arc<EventBus>,
    stats: Mutex<HubStats>,
}

impl AgentHub {
    /// Hub with the routing strategy named in `config` and no external
    /// providers.
    pub fn new(config: HubConfig) -> HubResult<Self> {
        Self::builder(config).build()
    }

    /// Builder for hubs with custom strategies or providers.
    pub fn builder(config: HubConfig) -> AgentHubBuilder {
        AgentHubBuilder::new(config)
    }

    /// Configuration the hub was built with.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Bus the hub publishes lifecycle events on.
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Name of the strategy used by smart delegation.
    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Build (but do not register) an agent from a definition, applying the
    /// hub's default concurrency limit.
    pub fn create_agent(
        &self,
        definition: AgentDefinition,
        executor: Arc<dyn TaskExecutor>,
    ) -> HubResult<Agent> {
        definition.into_agent(self.config.default_max_concurrent_tasks, executor)
    }

    /// Register an agent. Fails with [`HubError::DuplicateAgent`] if the id is taken.
    pub fn register_agent(&self, agent: Agent) -> HubResult<Arc<Agent>> {
        let agent = Arc::new(agent);
        {
            let mut registry = self.registry.write();
            if registry.agents.contains_key(agent.id()) {
                return Err(HubError::DuplicateAgent(agent.id().to_string()));
            }
            registry.order.push(agent.id().to_string());
            registry
                .agents
                .insert(agent.id().to_string(), Arc::clone(&agent));
            self.stats.lock().total_agents += 1;
        }

        info!(
            agent_id = %agent.id(),
            capabilities = ?agent.capabilities(),
            max_concurrent_tasks = agent.max_concurrent_tasks(),
            "Agent registered"
        );
        self.publish(
            HubEventType::AgentRegistered,
            serde_json::json!({
                "agent_id": agent.id(),
                "name": agent.name(),
                "capabilities": agent.capabilities(),
            }),
        );
        Ok(agent)
    }

    /// Remove an agent. Tasks it is already running finish normally.
    pub fn unregister_agent(&self, agent_id: &str) -> HubResult<Arc<Agent>> {
        let removed = {
            let mut registry = self.registry.write();
            let removed = registry
                .agents
                .remove(agent_id)
                .ok_or_else(|| HubError::AgentNotFound(agent_id.to_string()))?;
            registry.order.retain(|id| id != agent_id);
            removed
        };

        info!(agent_id = %agent_id, in_flight = removed.current_task_count(), "Agent unregistered");
        self.publish(
            HubEventType::AgentUnregistered,
            serde_json::json!({ "agent_id": agent_id }),
        );
        Ok(removed)
    }

    /// The registered instance, if any.
    pub fn get_agent(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self.registry.read().agents.get(agent_id).cloned()
    }

    /// Agents carrying `capability`, in registration order.
    pub fn find_agents_by_capability(&self, capability: &str) -> Vec<Arc<Agent>> {
        self.registry
            .read()
            .ordered()
            .filter(|a| a.has_capability(capability))
            .cloned()
            .collect()
    }

    /// Agents with a free slot, in registration order.
    pub fn get_available_agents(&self) -> Vec<Arc<Agent>> {
        self.registry
            .read()
            .ordered()
            .filter(|a| a.is_available())
            .cloned()
            .collect()
    }

    /// Number of registered agents.
    pub fn agent_count(&self) -> usize {
        self.registry.read().order.len()
    }

    /// Keyword routing over the available agents. Never calls a provider.
    pub fn find_best_agent_for_task(
        &self,
        description: &str,
        required_capability: Option<&str>,
    ) -> Option<Arc<Agent>> {
        let candidates = self.get_available_agents();
        self.keyword
            .select(description, &candidates, required_capability)
    }

    /// Routing with the configured strategy over the available agents.
    pub async fn find_best_agent_for_task_async(
        &self,
        description: &str,
        required_capability: Option<&str>,
    ) -> Option<Arc<Agent>> {
        let candidates = self.get_available_agents();
        let chosen = self
            .strategy
            .select_agent(description, &candidates, required_capability)
            .await;
        debug!(
            strategy = %self.strategy.name(),
            agent_id = chosen.as_ref().map(|a| a.id()).unwrap_or("none"),
            "Routing decision"
        );
        chosen
    }

    /// Run a task on a specific agent.
    ///
    /// Fails with [`HubError::AgentNotFound`] for an unknown id and with
    /// [`HubError::AgentUnavailable`] when the agent is at capacity. A task
    /// whose work fails still returns `Ok` with a failed [`TaskResult`].
    pub async fn delegate_task(
        &self,
        agent_id: &str,
        description: &str,
        options: TaskOptions,
    ) -> HubResult<TaskResult> {
        let (agent, permit) = {
            let registry = self.registry.read();
            let agent = registry
                .agents
                .get(agent_id)
                .ok_or_else(|| HubError::AgentNotFound(agent_id.to_string()))?;
            let Some(permit) = agent.try_reserve() else {
                debug!(agent_id = %agent_id, "Agent at capacity, rejecting task");
                return Err(HubError::AgentUnavailable(agent_id.to_string()));
            };
            (Arc::clone(agent), permit)
        };

        let task = self.tasks.create_task(agent.id(), description, &options);
        self.stats.lock().total_tasks += 1;
        info!(
            task_id = %task.id,
            agent_id = %agent.id(),
            priority = %task.priority,
            "Task delegated"
        );
        self.publish(
            HubEventType::TaskCreated,
            serde_json::json!({
                "task_id": task.id,
                "agent_id": agent.id(),
                "description": task.description,
                "priority": task.priority,
            }),
        );

        let result = self.tasks.execute_reserved(task.id, &agent, permit).await?;
        if result.is_success() {
            info!(
                task_id = %result.task_id,
                agent_id = %result.agent_id,
                execution_time_ms = result.execution_time_ms,
                "Task completed"
            );
        } else {
            warn!(
                task_id = %result.task_id,
                agent_id = %result.agent_id,
                error = result.error.as_deref().unwrap_or(""),
                "Task failed"
            );
        }
        self.publish(
            HubEventType::TaskCompleted,
            serde_json::json!({
                "task_id": result.task_id,
                "agent_id": result.agent_id,
                "status": result.status,
                "execution_time_ms": result.execution_time_ms,
            }),
        );
        Ok(result)
    }

    /// Route with the configured strategy, then delegate.
    ///
    /// Fails with [`HubError::NoSuitableAgent`] when routing finds nothing.
    /// The chosen agent can fill up between routing and delegation, in which
    /// case [`HubError::AgentUnavailable`] is returned.
    pub async fn smart_delegate_task(
        &self,
        description: &str,
        options: TaskOptions,
    ) -> HubResult<TaskResult> {
        let agent = self
            .find_best_agent_for_task_async(description, options.required_capability.as_deref())
            .await
            .ok_or_else(|| {
                HubError::NoSuitableAgent(match &options.required_capability {
                    Some(cap) => format!("{description} (requires '{cap}')"),
                    None => description.to_string(),
                })
            })?;
        self.delegate_task(agent.id(), description, options).await
    }

    /// Task by id.
    pub fn get_task(&self, task_id: Uuid) -> Option<Task> {
        self.tasks.get_task(task_id)
    }

    /// Result of a finished task.
    pub fn get_task_result(&self, task_id: Uuid) -> Option<TaskResult> {
        self.tasks.get_task_result(task_id)
    }

    /// Pending and running tasks, oldest first.
    pub fn get_active_tasks(&self) -> Vec<Task> {
        self.tasks.get_active_tasks()
    }

    /// Every task the hub has created, oldest first.
    pub fn get_all_tasks(&self) -> Vec<Task> {
        self.tasks.get_all_tasks()
    }

    /// Agent availability and task counts.
    pub fn get_system_status(&self) -> SystemStatus {
        let (total_agents, available_agents) = {
            let registry = self.registry.read();
            (
                registry.order.len(),
                registry.ordered().filter(|a| a.is_available()).count(),
            )
        };
        let counts = self.tasks.counts();
        SystemStatus {
            total_agents,
            available_agents,
            active_tasks: counts.pending + counts.running,
            completed_tasks: counts.completed as u64,
            failed_tasks: counts.failed as u64,
            total_tasks_processed: (counts.completed + counts.failed) as u64,
        }
    }

    /// Status of every agent, keyed by id.
    pub fn get_all_agent_statuses(&self) -> BTreeMap<String, AgentStatus> {
        self.registry
            .read()
            .agents
            .iter()
            .map(|(id, agent)| (id.clone(), agent.status()))
            .collect()
    }

    /// Cumulative counters. Completed and failed tasks are read from the task
    /// table, which also holds tasks whose delegation was dropped mid-run.
    pub fn get_hub_stats(&self) -> HubStats {
        let counts = self.tasks.counts();
        let mut stats = self.stats.lock().clone();
        stats.completed_tasks = counts.completed as u64;
        stats.failed_tasks = counts.failed as u64;
        stats
    }

    fn publish(&self, event_type: HubEventType, payload: serde_json::Value) {
        let event = HubEvent::new(event_type, self.config.source.clone(), payload)
            .with_session(self.config.session_id.clone());
        self.events.publish(event);
    }
}

/// Configures an [`AgentHub`] with custom collaborators.
pub struct AgentHubBuilder {
    config: HubConfig,
    strategy: Option<Arc<dyn RoutingStrategy>>,
    event_bus: Option<Arc<EventBus>>,
    providers: RoutingProviders,
}

impl AgentHubBuilder {
    /// Empty instance.
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            strategy: None,
            event_bus: None,
            providers: RoutingProviders::default(),
        }
    }

    /// Use this strategy instead of the one named in the configuration.
    pub fn with_strategy(mut self, strategy: Arc<dyn RoutingStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Publish on a caller-owned bus instead of a private one.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Embedder for the vector strategy; defaults to the local hashing embedder.
    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.providers.embedder = Some(provider);
        self
    }

    /// Completion provider for the llm strategy.
    pub fn with_completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.providers.completion = Some(provider);
        self
    }

    /// Capability keywords used by the keyword fallback.
    pub fn with_lexicon(mut self, lexicon: CapabilityLexicon) -> Self {
        self.providers.lexicon = Some(Arc::new(lexicon));
        self
    }

    /// Validate the configuration and assemble the hub.
    pub fn build(self) -> HubResult<AgentHub> {
        self.config.validate()?;

        let lexicon = self.providers.lexicon.clone().unwrap_or_default();
        let strategy = self.strategy.unwrap_or_else(|| {
            RoutingStrategyFactory::create(
                self.config.routing.strategy,
                &self.config.routing,
                &self.providers,
            )
        });
        info!(
            strategy = %strategy.name(),
            default_max_concurrent_tasks = self.config.default_max_concurrent_tasks,
            "Agent hub ready"
        );

        Ok(AgentHub {
            registry: RwLock::new(Registry::default()),
            tasks: TaskManager::new(),
            strategy,
            keyword: KeywordRoutingStrategy::with_lexicon(lexicon),
            events: self.event_bus.unwrap_or_default(),
            stats: Mutex::new(HubStats::default()),
            config: self.config,
        })
    }
}
