use crate::lexicon::TaskRequirement;
use crate::types::{AgentStatus, Task, TaskResult};
use agenthub_core::{HubError, HubResult};
use async_trait::async_trait;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// The backend that actually performs an agent's work (an LLM/tool loop,
/// a subprocess, a remote call). The hub never looks inside it.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run the task and return its textual output.
    async fn execute(&self, task: &Task) -> HubResult<String>;
}

/// Adapts an async closure into a [`TaskExecutor`].
pub struct FnExecutor<F> {
    f: F,
}

impl<F, Fut> FnExecutor<F>
where
    F: Fn(Task) -> Fut + Send + Sync,
    Fut: Future<Output = HubResult<String>> + Send,
{
    /// Wrap an async closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskExecutor for FnExecutor<F>
where
    F: Fn(Task) -> Fut + Send + Sync,
    Fut: Future<Output = HubResult<String>> + Send,
{
    async fn execute(&self, task: &Task) -> HubResult<String> {
        (self.f)(task.clone()).await
    }
}

/// One reserved execution slot on an agent.
///
/// The slot is released when the permit is dropped, whichever way the
/// execution ends (return, error, panic, or the future being dropped).
#[derive(Debug)]
pub struct CapacityPermit {
    agent_id: String,
    load: Arc<AtomicUsize>,
}

impl CapacityPermit {
    /// Agent holding the slot.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

impl Drop for CapacityPermit {
    fn drop(&mut self) {
        let previous = self.load.fetch_sub(1, Ordering::AcqRel);
        debug!(agent_id = %self.agent_id, load = previous - 1, "Released capacity slot");
    }
}

/// A capability-tagged worker with a bounded number of concurrent tasks.
pub struct Agent {
    id: String,
    name: String,
    description: String,
    capabilities: Vec<String>,
    max_concurrent_tasks: usize,
    load: Arc<AtomicUsize>,
    executor: Arc<dyn TaskExecutor>,
}

impl Agent {
    /// Start building an agent with the given id.
    pub fn builder(id: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(id)
    }

    /// Unique, non-blank agent id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name; defaults to the id.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Lowercase, de-duplicated capability tags in declaration order.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Concurrency limit.
    pub fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks
    }

    /// Tasks currently executing on this agent.
    pub fn current_task_count(&self) -> usize {
        self.load.load(Ordering::Acquire)
    }

    /// `true` while a slot is free.
    pub fn is_available(&self) -> bool {
        self.current_task_count() < self.max_concurrent_tasks
    }

    /// Case-insensitive capability check.
    pub fn has_capability(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        self.capabilities.iter().any(|c| *c == tag)
    }

    /// True iff the agent's capabilities intersect the requirement and a
    /// slot is free.
    pub fn can_handle_task(&self, requirement: &TaskRequirement) -> bool {
        requirement.intersects(&self.capabilities) && self.is_available()
    }

    /// Text describing the agent for semantic matching.
    pub fn profile_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.description,
            self.capabilities.join(" ")
        )
    }

    /// Atomically claim a slot. Returns `None` when the agent is at capacity.
    pub fn try_reserve(&self) -> Option<CapacityPermit> {
        let mut current = self.load.load(Ordering::Acquire);
        loop {
            if current >= self.max_concurrent_tasks {
                return None;
            }
            match self.load.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(CapacityPermit {
                        agent_id: self.id.clone(),
                        load: Arc::clone(&self.load),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Execute a task on this agent.
    ///
    /// Fails with [`HubError::AgentUnavailable`] when no slot is free. Any
    /// failure of the work itself is reported in the returned [`TaskResult`].
    pub async fn execute_task(&self, task: &Task) -> HubResult<TaskResult> {
        let permit = self
            .try_reserve()
            .ok_or_else(|| HubError::AgentUnavailable(self.id.clone()))?;
        Ok(self.execute_reserved(task, permit).await)
    }

    /// Execute a task using a slot that was already reserved.
    pub async fn execute_reserved(&self, task: &Task, permit: CapacityPermit) -> TaskResult {
        let start = Instant::now();
        let outcome = AssertUnwindSafe(self.executor.execute(task))
            .catch_unwind()
            .await;
        drop(permit);
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(output)) => TaskResult::succeeded(task, output, elapsed),
            Ok(Err(e)) => {
                warn!(agent_id = %self.id, task_id = %task.id, error = %e, "Task failed");
                TaskResult::failed(task, e.to_string(), elapsed)
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(agent_id = %self.id, task_id = %task.id, reason = %reason, "Task panicked");
                TaskResult::failed(task, format!("executor panicked: {reason}"), elapsed)
            }
        }
    }

    /// Snapshot for status reporting.
    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            name: self.name.clone(),
            is_available: self.is_available(),
            current_task_count: self.current_task_count(),
            max_concurrent_tasks: self.max_concurrent_tasks,
            capabilities: self.capabilities.clone(),
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("current_task_count", &self.current_task_count())
            .field("max_concurrent_tasks", &self.max_concurrent_tasks)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn normalize_capabilities<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Builder for [`Agent`]. Validation happens in [`AgentBuilder::build`].
#[derive(Debug, Clone)]
pub struct AgentBuilder {
    id: String,
    name: Option<String>,
    description: String,
    capabilities: Vec<String>,
    max_concurrent_tasks: usize,
}

impl AgentBuilder {
    /// Start building an agent with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: String::new(),
            capabilities: Vec::new(),
            max_concurrent_tasks: 1,
        }
    }

    /// Display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Free-text description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Capability tags; blanks are skipped and duplicates removed.
    pub fn capabilities<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.capabilities = normalize_capabilities(tags);
        self
    }

    /// Concurrency limit; must be positive.
    pub fn max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    /// Validate and construct the agent.
    ///
    /// Fails with [`HubError::InvalidAgentId`] for an empty or
    /// whitespace-only id, and with [`HubError::Config`] for a zero
    /// concurrency limit.
    pub fn build(self, executor: Arc<dyn TaskExecutor>) -> HubResult<Agent> {
        if self.id.trim().is_empty() {
            return Err(HubError::InvalidAgentId(self.id));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(HubError::Config(format!(
                "agent '{}': max_concurrent_tasks must be positive",
                self.id
            )));
        }
        Ok(Agent {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            description: self.description,
            capabilities: self.capabilities,
            max_concurrent_tasks: self.max_concurrent_tasks,
            load: Arc::new(AtomicUsize::new(0)),
            executor,
        })
    }
}

/// Serializable description of an agent, as found in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique agent id.
    pub id: String,
    /// Display name; the id is used when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Capability tags such as `coding` or `research`.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Falls back to the hub's default when absent.
    #[serde(default)]
    pub max_concurrent_tasks: Option<usize>,
}

impl AgentDefinition {
    /// Build an agent from this definition.
    pub fn into_agent(
        self,
        default_max_concurrent_tasks: usize,
        executor: Arc<dyn TaskExecutor>,
    ) -> HubResult<Agent> {
        let mut builder = Agent::builder(self.id)
            .description(self.description)
            .capabilities(self.capabilities)
            .max_concurrent_tasks(
                self.max_concurrent_tasks
                    .unwrap_or(default_max_concurrent_tasks),
            );
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        builder.build(executor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::lexicon::CapabilityLexicon;
    use crate::types::TaskOutcome;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn echo() -> Arc<dyn TaskExecutor> {
        Arc::new(FnExecutor::new(|task: Task| async move {
            Ok(format!("done: {}", task.description))
        }))
    }

    fn failing() -> Arc<dyn TaskExecutor> {
        Arc::new(FnExecutor::new(|_task: Task| async move {
            Err(HubError::Agent("model refused".into()))
        }))
    }

    struct Panicking;

    #[async_trait]
    impl TaskExecutor for Panicking {
        async fn execute(&self, _task: &Task) -> HubResult<String> {
            panic!("executor exploded");
        }
    }

    fn coder(max: usize, executor: Arc<dyn TaskExecutor>) -> Agent {
        Agent::builder("coder")
            .name("Coder")
            .description("Writes code")
            .capabilities(["Coding", "coding", " python "])
            .max_concurrent_tasks(max)
            .build(executor)
            .unwrap()
    }

    #[test]
    fn test_empty_id_rejected() {
        for id in ["", "   ", "\t\n"] {
            let err = Agent::builder(id).build(echo()).unwrap_err();
            assert!(matches!(err, HubError::InvalidAgentId(_)));
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = Agent::builder("a")
            .max_concurrent_tasks(0)
            .build(echo())
            .unwrap_err();
        assert!(matches!(err, HubError::Config(_)));
    }

    #[test]
    fn test_capabilities_normalized() {
        let agent = coder(1, echo());
        assert_eq!(agent.capabilities().to_vec(), vec!["coding", "python"]);
        assert!(agent.has_capability("CODING"));
        assert!(!agent.has_capability("research"));
        assert_eq!(agent.name(), "Coder");
    }

    #[test]
    fn test_name_defaults_to_id() {
        let agent = Agent::builder("solo").build(echo()).unwrap();
        assert_eq!(agent.name(), "solo");
    }

    #[test]
    fn test_can_handle_requires_intersection() {
        let agent = coder(1, echo());
        let lexicon = CapabilityLexicon::default();
        assert!(agent.can_handle_task(&lexicon.infer("Fix this bug in my function")));
        assert!(!agent.can_handle_task(&lexicon.infer("Research AI trends")));
        assert!(!agent.can_handle_task(&TaskRequirement::default()));
    }

    #[test]
    fn test_can_handle_false_when_full() {
        let agent = coder(1, echo());
        let req = TaskRequirement::declared("coding");
        let permit = agent.try_reserve().unwrap();
        assert!(!agent.is_available());
        assert!(!agent.can_handle_task(&req));
        drop(permit);
        assert!(agent.can_handle_task(&req));
    }

    #[test]
    fn test_reserve_respects_limit() {
        let agent = coder(2, echo());
        let p1 = agent.try_reserve().unwrap();
        let p2 = agent.try_reserve().unwrap();
        assert!(agent.try_reserve().is_none());
        assert_eq!(agent.current_task_count(), 2);
        drop(p1);
        assert_eq!(agent.current_task_count(), 1);
        drop(p2);
        assert_eq!(agent.current_task_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let agent = coder(1, echo());
        let task = Task::new("coder", "sort an array");
        let result = agent.execute_task(&task).await.unwrap();
        assert_eq!(result.status, TaskOutcome::Succeeded);
        assert_eq!(result.message, "done: sort an array");
        assert_eq!(result.task_id, task.id);
        assert_eq!(agent.current_task_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_failure_is_captured() {
        let agent = coder(1, failing());
        let task = Task::new("coder", "x");
        let result = agent.execute_task(&task).await.unwrap();
        assert_eq!(result.status, TaskOutcome::Failed);
        assert!(result.error.unwrap().contains("model refused"));
        assert_eq!(agent.current_task_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_panic_releases_capacity() {
        let agent = coder(1, Arc::new(Panicking));
        let task = Task::new("coder", "x");
        let result = agent.execute_task(&task).await.unwrap();
        assert_eq!(result.status, TaskOutcome::Failed);
        assert!(result.error.unwrap().contains("executor exploded"));
        assert!(agent.is_available());
    }

    #[tokio::test]
    async fn test_execute_rejected_at_capacity() {
        let agent = coder(1, echo());
        let _permit = agent.try_reserve().unwrap();
        let err = agent
            .execute_task(&Task::new("coder", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::AgentUnavailable(id) if id == "coder"));
    }

    #[tokio::test]
    async fn test_capacity_held_while_running() {
        let gate = Arc::new(Notify::new());
        let g = gate.clone();
        let executor: Arc<dyn TaskExecutor> = Arc::new(FnExecutor::new(move |_task: Task| {
            let g = g.clone();
            async move {
                g.notified().await;
                Ok("ok".to_string())
            }
        }));
        let agent = Arc::new(coder(1, executor));

        let runner = agent.clone();
        let handle =
            tokio::spawn(async move { runner.execute_task(&Task::new("coder", "x")).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(agent.current_task_count(), 1);
        assert!(!agent.is_available());

        gate.notify_one();
        let result = handle.await.unwrap().unwrap();
        assert!(result.is_success());
        assert_eq!(agent.current_task_count(), 0);
    }

    #[test]
    fn test_definition_uses_default_concurrency() {
        let def: AgentDefinition = serde_json::from_value(serde_json::json!({
            "id": "researcher",
            "capabilities": ["research"]
        }))
        .unwrap();
        let agent = def.into_agent(4, echo()).unwrap();
        assert_eq!(agent.max_concurrent_tasks(), 4);
        assert_eq!(agent.name(), "researcher");
    }

    #[test]
    fn test_status_snapshot() {
        let agent = coder(3, echo());
        let _p = agent.try_reserve().unwrap();
        let status = agent.status();
        assert_eq!(status.current_task_count, 1);
        assert_eq!(status.max_concurrent_tasks, 3);
        assert!(status.is_available);
        assert_eq!(status.capabilities, vec!["coding", "python"]);
    }
}
