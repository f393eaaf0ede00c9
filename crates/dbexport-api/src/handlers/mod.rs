pub mod download;
pub mod export;
pub mod health;
pub mod task;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use dbexport_core::{Error, ExportTask, TaskStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResponse {
    pub fn from_task(task: &ExportTask) -> Self {
        let file_url = match (&task.status, &task.file_name) {
            (TaskStatus::Completed, Some(name)) => {
                Some(format!("/api/v1/exports/download/{}", name))
            }
            _ => None,
        };

        Self {
            task_id: task.task_id.clone(),
            status: task.status,
            progress: task.progress,
            file_url,
            error: task.error_message.clone(),
        }
    }
}

/// Owner identity for concurrency accounting, taken from the `X-User-ID`
/// header until real authentication lands upstream.
pub fn owner_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("default")
        .to_string()
}

/// Map a domain error onto its HTTP representation. Runtime errors from
/// workers never pass through here; they surface via task polling.
pub fn error_response(err: &Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        Error::ConcurrencyLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        Error::TaskNotFound(_) => StatusCode::NOT_FOUND,
        Error::Forbidden(_) => StatusCode::FORBIDDEN,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::SizeLimitExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
        Error::InvalidRequest(_) | Error::DataSource(_) | Error::Encoding(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::TimeoutExceeded(_) | Error::Io(_) | Error::Other(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}
