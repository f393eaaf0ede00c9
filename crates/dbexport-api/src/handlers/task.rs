use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::handlers::{error_response, owner_from_headers, ErrorResponse, TaskResponse};
use crate::state::ApiState;
use dbexport_core::RegistryStats;

/// Poll one task's status and progress.
pub async fn get_task_status(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, (StatusCode, Json<ErrorResponse>)> {
    let task = state
        .registry
        .get(&task_id)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(TaskResponse::from_task(&task)))
}

/// Snapshot of all known tasks.
pub async fn list_tasks(State(state): State<ApiState>) -> Json<Vec<TaskResponse>> {
    let tasks = state.registry.list().await;
    Json(tasks.iter().map(TaskResponse::from_task).collect())
}

/// Request cancellation. The visible status flips immediately; the worker
/// cleans up its partial file at the next checkpoint.
pub async fn cancel_export_task(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let owner = owner_from_headers(&headers);
    state
        .registry
        .cancel(&task_id, &owner)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Aggregate task counts by status.
pub async fn get_statistics(State(state): State<ApiState>) -> Json<RegistryStats> {
    Json(state.registry.stats().await)
}
