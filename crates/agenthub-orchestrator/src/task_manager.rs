use crate::agent::{Agent, CapacityPermit};
use crate::types::{Task, TaskOptions, TaskOutcome, TaskResult, TaskStatus};
use agenthub_core::{HubError, HubResult};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-status task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    /// Created, not started.
    pub pending: usize,
    /// Executing.
    pub running: usize,
    /// Finished successfully.
    pub completed: usize,
    /// Finished with an error.
    pub failed: usize,
}

#[derive(Default)]
struct TaskTable {
    tasks: HashMap<Uuid, Task>,
    order: Vec<Uuid>,
    results: HashMap<Uuid, TaskResult>,
}

impl TaskTable {
    fn transition(&mut self, id: Uuid, next: TaskStatus) -> HubResult<&mut Task> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or_else(|| HubError::Task(format!("unknown task {id}")))?;
        if !task.status.can_transition_to(next) {
            return Err(HubError::Task(format!(
                "illegal transition {} -> {next} for task {id}",
                task.status
            )));
        }
        task.status = next;
        Ok(task)
    }
}

/// A task in `Running`. Dropping it before [`RunningTask::finish`] records a
/// failed result, so a cancelled execution never leaves the task running.
struct RunningTask<'a> {
    manager: &'a TaskManager,
    task: Task,
    started: Instant,
    finished: bool,
}

impl RunningTask<'_> {
    fn finish(mut self, result: TaskResult) -> HubResult<()> {
        self.finished = true;
        self.manager.record_result(result)
    }
}

impl Drop for RunningTask<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(task_id = %self.task.id, agent_id = %self.task.agent_id, "Task execution abandoned");
        let result = TaskResult::failed(&self.task, "execution abandoned", self.started.elapsed());
        if let Err(e) = self.manager.record_result(result) {
            warn!(task_id = %self.task.id, error = %e, "Could not record abandoned task");
        }
    }
}

/// Creates tasks and records their lifecycle and results.
///
/// Internally synchronised; every method takes `&self`. Locks are never held
/// across an await point.
pub struct TaskManager {
    table: RwLock<TaskTable>,
}

impl TaskManager {
    /// Empty instance.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(TaskTable::default()),
        }
    }

    /// Create a pending task targeting `agent_id`.
    pub fn create_task(
        &self,
        agent_id: impl Into<String>,
        description: impl Into<String>,
        options: &TaskOptions,
    ) -> Task {
        let task = Task::new(agent_id, description).with_options(options);
        let mut table = self.table.write();
        table.order.push(task.id);
        table.tasks.insert(task.id, task.clone());
        debug!(task_id = %task.id, agent_id = %task.agent_id, "Task created");
        task
    }

    /// Task by id.
    pub fn get_task(&self, id: Uuid) -> Option<Task> {
        self.table.read().tasks.get(&id).cloned()
    }

    /// Result of a finished task.
    pub fn get_task_result(&self, id: Uuid) -> Option<TaskResult> {
        self.table.read().results.get(&id).cloned()
    }

    /// Tasks that are pending or running, in creation order.
    pub fn get_active_tasks(&self) -> Vec<Task> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|id| table.tasks.get(id))
            .filter(|t| t.is_active())
            .cloned()
            .collect()
    }

    /// All tasks in creation order.
    pub fn get_all_tasks(&self) -> Vec<Task> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|id| table.tasks.get(id))
            .cloned()
            .collect()
    }

    /// Current number of tasks in each status.
    pub fn counts(&self) -> TaskCounts {
        let table = self.table.read();
        let mut counts = TaskCounts::default();
        for task in table.tasks.values() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Tasks ever created.
    pub fn total_count(&self) -> usize {
        self.table.read().tasks.len()
    }

    /// Move a pending task to running and return a snapshot of it.
    pub fn mark_running(&self, id: Uuid) -> HubResult<Task> {
        let mut table = self.table.write();
        let task = table.transition(id, TaskStatus::Running)?;
        task.started_at = Some(Utc::now());
        Ok(task.clone())
    }

    /// Record the result of a running task and move it to its terminal status.
    pub fn record_result(&self, result: TaskResult) -> HubResult<()> {
        let next = match result.status {
            TaskOutcome::Succeeded => TaskStatus::Completed,
            TaskOutcome::Failed => TaskStatus::Failed,
        };
        let mut table = self.table.write();
        if table.results.contains_key(&result.task_id) {
            return Err(HubError::Task(format!(
                "result already recorded for task {}",
                result.task_id
            )));
        }
        let task = table.transition(result.task_id, next)?;
        task.completed_at = Some(Utc::now());
        table.results.insert(result.task_id, result);
        Ok(())
    }

    /// Run a pending task on `agent`, reserving a slot first.
    ///
    /// Fails with [`HubError::AgentUnavailable`] if the agent is full; the
    /// task then stays pending.
    pub async fn execute_task(&self, task_id: Uuid, agent: &Agent) -> HubResult<TaskResult> {
        let permit = agent
            .try_reserve()
            .ok_or_else(|| HubError::AgentUnavailable(agent.id().to_string()))?;
        self.execute_reserved(task_id, agent, permit).await
    }

    /// Run a pending task on `agent` using an already reserved slot.
    ///
    /// If the returned future is dropped mid-execution the task is recorded
    /// as failed with an "execution abandoned" error.
    pub async fn execute_reserved(
        &self,
        task_id: Uuid,
        agent: &Agent,
        permit: CapacityPermit,
    ) -> HubResult<TaskResult> {
        let running = RunningTask {
            manager: self,
            task: self.mark_running(task_id)?,
            started: Instant::now(),
            finished: false,
        };
        let result = agent.execute_reserved(&running.task, permit).await;
        running.finish(result.clone())?;
        Ok(result)
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
