use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::task::{ExportTask, TaskStatus};

/// Concurrency-safe store of export tasks with per-owner admission control.
///
/// One coarse lock serializes every mutation, so concurrent submissions,
/// cancellations, worker updates, and status polls never observe a torn
/// state. Constructed once at process start and passed by reference to
/// request handlers and workers.
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, ExportTask>>>,
    max_concurrent_per_owner: usize,
}

impl TaskRegistry {
    pub fn new(max_concurrent_per_owner: usize) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            max_concurrent_per_owner,
        }
    }

    /// Admit a new task. The per-owner limit check and the insert happen
    /// under one write guard, so two racing submissions cannot both pass
    /// the check.
    pub async fn submit(&self, task: ExportTask) -> Result<String> {
        let mut tasks = self.tasks.write().await;

        let active = tasks
            .values()
            .filter(|t| {
                t.owner == task.owner
                    && matches!(t.status, TaskStatus::Pending | TaskStatus::Running)
            })
            .count();

        if active >= self.max_concurrent_per_owner {
            return Err(Error::ConcurrencyLimitExceeded(
                self.max_concurrent_per_owner,
            ));
        }

        let task_id = task.task_id.clone();
        tracing::info!(
            "Submitted export task {} for owner {} (active: {})",
            task_id,
            task.owner,
            active + 1
        );
        tasks.insert(task_id.clone(), task);

        Ok(task_id)
    }

    /// Snapshot of a task. Tasks past their expiry are reported as absent
    /// even before the sweeper physically removes them.
    pub async fn get(&self, task_id: &str) -> Result<ExportTask> {
        let tasks = self.tasks.read().await;
        match tasks.get(task_id) {
            Some(task) if !task.is_expired(Utc::now()) => Ok(task.clone()),
            _ => Err(Error::TaskNotFound(task_id.to_string())),
        }
    }

    /// Move a pending task to running and return its snapshot. Returns
    /// `None` when the task was cancelled (or otherwise finished) before
    /// its worker got to it.
    pub async fn claim(&self, task_id: &str) -> Option<ExportTask> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(task_id)?;
        if task.status != TaskStatus::Pending {
            return None;
        }
        task.start();
        Some(task.clone())
    }

    /// Cancel a task on behalf of its owner. The visible status flips
    /// immediately; the worker tears down at its next checkpoint.
    pub async fn cancel(&self, task_id: &str, owner: &str) -> Result<()> {
        let mut tasks = self.tasks.write().await;

        let task = tasks
            .get_mut(task_id)
            .filter(|t| !t.is_expired(Utc::now()))
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;

        if task.owner != owner {
            return Err(Error::Forbidden(task_id.to_string()));
        }
        if task.status.is_terminal() {
            return Err(Error::InvalidState(format!(
                "task {} is already {:?}",
                task_id, task.status
            )));
        }

        task.cancel();
        tracing::info!("Cancelled export task {}", task_id);
        Ok(())
    }

    /// Worker-internal progress report. Silently ignored for unknown or
    /// terminal tasks so a late update cannot race a cancellation, and
    /// regressions are dropped to keep observed progress non-decreasing.
    pub async fn update_progress(&self, task_id: &str, progress: u8) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(task_id) {
            if !task.status.is_terminal() && progress > task.progress {
                task.progress = progress.min(100);
                tracing::debug!("Task {} progress: {}%", task_id, task.progress);
            }
        }
    }

    /// Record a successful export. No-op once the task is terminal; returns
    /// whether the completion was applied so the caller can tell a cancel
    /// won the race and clean up the finished file.
    pub async fn mark_completed(
        &self,
        task_id: &str,
        file_name: String,
        file_size_bytes: u64,
        row_count: u64,
    ) -> bool {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(task_id) {
            if !task.status.is_terminal() {
                task.complete(file_name, file_size_bytes, row_count);
                tracing::info!(
                    "Export task {} completed: {} rows, {} bytes",
                    task_id,
                    row_count,
                    file_size_bytes
                );
                return true;
            }
        }
        false
    }

    /// Record a failed export. No-op once the task is terminal.
    pub async fn mark_failed(&self, task_id: &str, message: String) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(task_id) {
            if !task.status.is_terminal() {
                tracing::error!("Export task {} failed: {}", task_id, message);
                task.fail(message);
            }
        }
    }

    /// Cancellation flag polled by workers at their checkpoints.
    pub async fn is_cancelled(&self, task_id: &str) -> bool {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .map(|t| t.status == TaskStatus::Cancelled)
            .unwrap_or(true)
    }

    /// Physically drop a task record. Sweeper-internal.
    pub async fn remove(&self, task_id: &str) {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(task_id).is_some() {
            tracing::debug!("Removed export task {}", task_id);
        }
    }

    pub async fn list(&self) -> Vec<ExportTask> {
        let tasks = self.tasks.read().await;
        tasks.values().cloned().collect()
    }

    /// Pending plus running tasks billed against one owner.
    pub async fn active_count(&self, owner: &str) -> usize {
        let tasks = self.tasks.read().await;
        tasks
            .values()
            .filter(|t| {
                t.owner == owner
                    && matches!(t.status, TaskStatus::Pending | TaskStatus::Running)
            })
            .count()
    }

    /// Resolve a download file name to its task, only for completed tasks.
    pub async fn find_completed_by_filename(&self, file_name: &str) -> Option<ExportTask> {
        let now = Utc::now();
        let tasks = self.tasks.read().await;
        tasks
            .values()
            .find(|t| {
                t.status == TaskStatus::Completed
                    && !t.is_expired(now)
                    && t.file_name.as_deref() == Some(file_name)
            })
            .cloned()
    }

    /// Tasks due for removal: past their expiry, or completed longer ago
    /// than the retention window.
    pub async fn reapable(&self, now: DateTime<Utc>, retention: std::time::Duration) -> Vec<ExportTask> {
        let retention = Duration::from_std(retention).unwrap_or_else(|_| Duration::days(7));
        let tasks = self.tasks.read().await;
        tasks
            .values()
            .filter(|t| {
                t.is_expired(now)
                    || (t.status == TaskStatus::Completed
                        && t.completed_at
                            .map(|c| now - c >= retention)
                            .unwrap_or(false))
            })
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> RegistryStats {
        let tasks = self.tasks.read().await;
        let mut stats = RegistryStats::default();
        for task in tasks.values() {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}
