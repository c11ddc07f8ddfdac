use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Scheduling priority attached to a task. Informational only: the hub
/// neither reorders nor preempts by priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Default priority.
    #[default]
    Medium,
    /// Urgent work.
    High,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Lifecycle of a task: `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet started.
    Pending,
    /// Executing on its agent.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error, a panic, or abandoned.
    Failed,
}

impl TaskStatus {
    /// Whether the task has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Only forward transitions along the lifecycle are legal.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Optional knobs for a delegation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Scheduling priority.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Advisory timeout. Recorded on the task, never enforced by the hub.
    #[serde(default, with = "duration_ms")]
    pub timeout: Option<Duration>,
    /// Hard capability filter applied before routing (smart delegation only).
    #[serde(default)]
    pub required_capability: Option<String>,
}

impl TaskOptions {
    /// Set the priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the advisory timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Require this capability when routing.
    pub fn with_required_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capability = Some(capability.into());
        self
    }
}

/// A unit of work delegated to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id.
    pub id: Uuid,
    /// Target agent.
    pub agent_id: String,
    /// Free-text description.
    pub description: String,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Set when the task starts running.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the task reaches a terminal status.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Advisory timeout; never enforced.
    #[serde(default, with = "duration_ms")]
    pub timeout: Option<Duration>,
}

impl Task {
    /// Pending task with a fresh id.
    pub fn new(agent_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            description: description.into(),
            priority: TaskPriority::default(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            timeout: None,
        }
    }

    /// Copy priority and timeout from delegation options.
    pub fn with_options(mut self, options: &TaskOptions) -> Self {
        self.priority = options.priority;
        self.timeout = options.timeout;
        self
    }

    /// Pending or running.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Final outcome of an executed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    /// The executor returned output.
    Succeeded,
    /// The executor failed, panicked, or was abandoned.
    Failed,
}

/// Outcome record of a task that entered `Running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Task this result belongs to.
    pub task_id: Uuid,
    /// Agent that ran the task.
    pub agent_id: String,
    /// Current lifecycle status.
    pub status: TaskOutcome,
    /// Output of the agent on success, a short failure summary otherwise.
    pub message: String,
    /// Wall-clock time spent executing.
    pub execution_time_ms: u64,
    /// Error text for failed tasks.
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskResult {
    /// Successful result carrying the executor output.
    pub fn succeeded(task: &Task, output: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            task_id: task.id,
            agent_id: task.agent_id.clone(),
            status: TaskOutcome::Succeeded,
            message: output.into(),
            execution_time_ms: elapsed.as_millis() as u64,
            error: None,
        }
    }

    /// Failed result with `error` as its cause.
    pub fn failed(task: &Task, error: impl Into<String>, elapsed: Duration) -> Self {
        let error = error.into();
        Self {
            task_id: task.id,
            agent_id: task.agent_id.clone(),
            status: TaskOutcome::Failed,
            message: format!("Task failed: {error}"),
            execution_time_ms: elapsed.as_millis() as u64,
            error: Some(error),
        }
    }

    /// `true` if the task succeeded.
    pub fn is_success(&self) -> bool {
        self.status == TaskOutcome::Succeeded
    }
}

/// Point-in-time view of one registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Display name.
    pub name: String,
    /// `true` while a slot is free.
    pub is_available: bool,
    /// Tasks currently executing.
    pub current_task_count: usize,
    /// Concurrency limit.
    pub max_concurrent_tasks: usize,
    /// Capability tags.
    pub capabilities: Vec<String>,
}

/// Snapshot returned by `AgentHub::get_system_status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Registered agents.
    pub total_agents: usize,
    /// Agents with a free slot.
    pub available_agents: usize,
    /// Pending plus running tasks.
    pub active_tasks: usize,
    /// Tasks that completed.
    pub completed_tasks: u64,
    /// Tasks that failed.
    pub failed_tasks: u64,
    /// Completed plus failed.
    pub total_tasks_processed: u64,
}

/// Cumulative counters since hub creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubStats {
    /// Agents ever registered; not decremented on unregistration.
    pub total_agents: u64,
    /// Tasks ever delegated.
    pub total_tasks: u64,
    /// Tasks that completed.
    pub completed_tasks: u64,
    /// Tasks that failed.
    pub failed_tasks: u64,
    /// When the hub was created.
    pub created_at: DateTime<Utc>,
}

impl Default for HubStats {
    fn default() -> Self {
        Self {
            total_agents: 0,
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            created_at: Utc::now(),
        }
    }
}

/// Serialises `Option<Duration>` as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
