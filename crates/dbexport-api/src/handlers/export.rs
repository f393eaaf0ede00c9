use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::handlers::{error_response, owner_from_headers, ErrorResponse, TaskResponse};
use crate::state::ApiState;
use dbexport_core::{
    Error, ExportCheck, ExportFormat, ExportScope, ExportTask, SizeEstimator,
};
use dbexport_worker::ExportWorker;

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportRequest {
    pub sql: String,
    pub format: ExportFormat,
    #[serde(default, rename = "exportAll")]
    pub export_all: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportCheckRequest {
    pub sql: String,
    pub format: ExportFormat,
    #[serde(default, rename = "useSampling")]
    pub use_sampling: bool,
    #[serde(default, rename = "sampleSize")]
    pub sample_size: Option<usize>,
}

/// Accept an export and spawn its worker. Returns immediately with the
/// task id; clients poll `/api/v1/tasks/{id}` for completion.
pub async fn create_export_task(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<ExportRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), (StatusCode, Json<ErrorResponse>)> {
    let owner = owner_from_headers(&headers);

    let verdict = state.validator.validate(&payload.sql);
    if !verdict.is_select_only {
        let detail = verdict
            .error
            .unwrap_or_else(|| "only SELECT statements can be exported".to_string());
        return Err(error_response(&Error::InvalidRequest(detail)));
    }

    let scope = if payload.export_all {
        ExportScope::AllData
    } else {
        ExportScope::CurrentPage
    };

    let task = ExportTask::new(
        owner,
        name.clone(),
        verdict.rewritten_sql,
        payload.format,
        scope,
        state.config.retention,
    );

    let task_id = state
        .registry
        .submit(task)
        .await
        .map_err(|e| error_response(&e))?;

    let worker = ExportWorker::new(
        state.registry.clone(),
        state.executor.clone(),
        state.config.clone(),
    );
    let worker_task_id = task_id.clone();
    tokio::spawn(async move {
        worker.run(&worker_task_id).await;
    });

    tracing::info!("Created export task {} for database {}", task_id, name);

    let snapshot = state
        .registry
        .get(&task_id)
        .await
        .map_err(|e| error_response(&e))?;
    Ok((StatusCode::ACCEPTED, Json(TaskResponse::from_task(&snapshot))))
}

/// Pre-flight size estimate. Advisory only: a denied check does not stop
/// a later submission.
pub async fn check_export_size(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(payload): Json<ExportCheckRequest>,
) -> Result<Json<ExportCheck>, (StatusCode, Json<ErrorResponse>)> {
    let verdict = state.validator.validate(&payload.sql);
    if !verdict.is_select_only {
        let detail = verdict
            .error
            .unwrap_or_else(|| "only SELECT statements can be exported".to_string());
        return Err(error_response(&Error::InvalidRequest(detail)));
    }

    let estimator = SizeEstimator::new(state.executor.clone(), state.config.clone());
    let check = estimator
        .check(
            &name,
            &verdict.rewritten_sql,
            payload.format,
            ExportScope::AllData,
            payload.use_sampling,
            payload.sample_size,
        )
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(check))
}
