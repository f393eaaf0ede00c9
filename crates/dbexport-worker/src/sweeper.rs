use std::sync::Arc;

use chrono::Utc;
use tokio::time::interval;

use dbexport_core::{ExportConfig, TaskRegistry};

/// Periodic reaper for expired task records and their files.
///
/// Runs independently of request handling; a failure to delete one task's
/// file is logged and leaves that record for the next sweep.
pub struct RetentionSweeper {
    registry: TaskRegistry,
    config: Arc<ExportConfig>,
}

impl RetentionSweeper {
    pub fn new(registry: TaskRegistry, config: Arc<ExportConfig>) -> Self {
        Self { registry, config }
    }

    /// Sweep forever on the configured interval.
    pub async fn run(&self) {
        let mut ticker = interval(self.config.sweep_interval);
        loop {
            ticker.tick().await;
            let reaped = self.sweep_once().await;
            if reaped > 0 {
                tracing::info!("Retention sweep removed {} export tasks", reaped);
            }
        }
    }

    /// One sweep pass. Returns the number of tasks removed.
    pub async fn sweep_once(&self) -> usize {
        let candidates = self
            .registry
            .reapable(Utc::now(), self.config.retention)
            .await;

        let mut reaped = 0;
        for task in candidates {
            // File names are deterministic, so delete unconditionally:
            // a record may lack `file_name` even though a worker left a
            // file behind.
            let path = self.config.export_dir.join(task.export_file_name());
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        "Failed to delete export file {}: {}",
                        path.display(),
                        e
                    );
                    // Keep the record so the next sweep retries.
                    continue;
                }
            }
            self.registry.remove(&task.task_id).await;
            reaped += 1;
        }
        reaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dbexport_core::{ExportFormat, ExportScope, ExportTask};
    use std::time::Duration as StdDuration;

    fn expired_task(owner: &str) -> ExportTask {
        let mut task = ExportTask::new(
            owner.to_string(),
            "orders".to_string(),
            "SELECT 1".to_string(),
            ExportFormat::Csv,
            ExportScope::AllData,
            StdDuration::from_secs(3600),
        );
        task.expires_at = Utc::now() - Duration::seconds(1);
        task
    }

    fn config_in(dir: &std::path::Path) -> Arc<ExportConfig> {
        Arc::new(ExportConfig {
            export_dir: dir.to_path_buf(),
            ..ExportConfig::default()
        })
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_record_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TaskRegistry::new(10);

        let task = expired_task("alice");
        let file_name = task.export_file_name();
        let task_id = registry.submit(task).await.unwrap();
        registry.claim(&task_id).await.unwrap();
        registry
            .mark_completed(&task_id, file_name.clone(), 3, 1)
            .await;
        tokio::fs::write(dir.path().join(&file_name), "a,b\n")
            .await
            .unwrap();

        let sweeper = RetentionSweeper::new(registry.clone(), config_in(dir.path()));
        assert_eq!(sweeper.sweep_once().await, 1);

        assert!(registry.list().await.is_empty());
        assert!(!dir.path().join(&file_name).exists());
    }

    #[tokio::test]
    async fn test_sweep_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TaskRegistry::new(10);

        let task = expired_task("alice");
        let file_name = task.export_file_name();
        let task_id = registry.submit(task).await.unwrap();
        registry.claim(&task_id).await.unwrap();
        registry.mark_completed(&task_id, file_name, 3, 1).await;

        let sweeper = RetentionSweeper::new(registry.clone(), config_in(dir.path()));
        assert_eq!(sweeper.sweep_once().await, 1);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_leaves_fresh_tasks_alone() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TaskRegistry::new(10);

        let task = ExportTask::new(
            "alice".to_string(),
            "orders".to_string(),
            "SELECT 1".to_string(),
            ExportFormat::Csv,
            ExportScope::AllData,
            StdDuration::from_secs(7 * 24 * 3600),
        );
        registry.submit(task).await.unwrap();

        let sweeper = RetentionSweeper::new(registry.clone(), config_in(dir.path()));
        assert_eq!(sweeper.sweep_once().await, 0);
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_deletes_file_even_without_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TaskRegistry::new(10);

        // An expired cancelled task whose record never got a file_name,
        // but whose worker left a file under the deterministic name.
        let mut task = expired_task("alice");
        task.cancel();
        let stray = dir.path().join(task.export_file_name());
        registry.submit(task).await.unwrap();
        tokio::fs::write(&stray, "id,name\n").await.unwrap();

        let sweeper = RetentionSweeper::new(registry.clone(), config_in(dir.path()));
        assert_eq!(sweeper.sweep_once().await, 1);

        assert!(!stray.exists());
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_reaps_cancelled_tasks_after_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TaskRegistry::new(10);

        // Cancelled earlier; the record lingers until its expiry passes.
        let mut task = expired_task("alice");
        task.cancel();
        registry.submit(task).await.unwrap();

        let sweeper = RetentionSweeper::new(registry.clone(), config_in(dir.path()));
        assert_eq!(sweeper.sweep_once().await, 1);
        assert!(registry.list().await.is_empty());
    }
}
