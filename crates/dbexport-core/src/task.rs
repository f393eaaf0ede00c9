use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Markdown,
}

impl ExportFormat {
    /// File extension used when naming the export file.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }

    /// Content type served by the download endpoint.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
            ExportFormat::Markdown => "text/markdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportScope {
    CurrentPage,
    AllData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportTask {
    pub task_id: String,
    pub owner: String,
    pub database_name: String,
    pub sql_text: String,
    pub format: ExportFormat,
    pub scope: ExportScope,
    pub status: TaskStatus,
    pub progress: u8,
    pub file_name: Option<String>,
    pub file_size_bytes: Option<u64>,
    pub row_count: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub execution_time_ms: Option<i64>,
}

impl ExportTask {
    pub fn new(
        owner: String,
        database_name: String,
        sql_text: String,
        format: ExportFormat,
        scope: ExportScope,
        retention: std::time::Duration,
    ) -> Self {
        let created_at = Utc::now();
        let retention =
            Duration::from_std(retention).unwrap_or_else(|_| Duration::days(7));

        Self {
            task_id: Uuid::new_v4().to_string(),
            owner,
            database_name,
            sql_text,
            format,
            scope,
            status: TaskStatus::Pending,
            progress: 0,
            file_name: None,
            file_size_bytes: None,
            row_count: None,
            error_message: None,
            created_at,
            started_at: None,
            completed_at: None,
            expires_at: created_at + retention,
            execution_time_ms: None,
        }
    }

    /// Deterministic file name for this task's export artifact.
    pub fn export_file_name(&self) -> String {
        format!("export-{}.{}", self.task_id, self.format.extension())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, file_name: String, file_size_bytes: u64, row_count: u64) {
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.file_name = Some(file_name);
        self.file_size_bytes = Some(file_size_bytes);
        self.row_count = Some(row_count);
        self.finish();
    }

    pub fn fail(&mut self, error: String) {
        self.status = TaskStatus::Failed;
        self.error_message = Some(error);
        self.finish();
    }

    pub fn cancel(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.finish();
    }

    fn finish(&mut self) {
        let completed_at = Utc::now();
        self.completed_at = Some(completed_at);
        if let Some(started_at) = self.started_at {
            self.execution_time_ms = Some((completed_at - started_at).num_milliseconds());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> ExportTask {
        ExportTask::new(
            "alice".to_string(),
            "orders".to_string(),
            "SELECT 1".to_string(),
            ExportFormat::Csv,
            ExportScope::AllData,
            std::time::Duration::from_secs(7 * 24 * 3600),
        )
    }

    #[test]
    fn test_task_creation() {
        let task = task();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(task.file_name.is_none());
        assert!(task.expires_at > task.created_at);
    }

    #[test]
    fn test_file_name_follows_task_id() {
        let task = task();
        assert_eq!(
            task.export_file_name(),
            format!("export-{}.csv", task.task_id)
        );

        let mut json_task = task.clone();
        json_task.format = ExportFormat::Json;
        assert!(json_task.export_file_name().ends_with(".json"));

        let mut md_task = task;
        md_task.format = ExportFormat::Markdown;
        assert!(md_task.export_file_name().ends_with(".md"));
    }

    #[test]
    fn test_completion_records_artifact() {
        let mut task = task();
        task.start();
        task.complete("export-x.csv".to_string(), 1234, 10);

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert_eq!(task.file_size_bytes, Some(1234));
        assert_eq!(task.row_count, Some(10));
        assert!(task.execution_time_ms.is_some());
        assert!(task.status.is_terminal());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }
}
