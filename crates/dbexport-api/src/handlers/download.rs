use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use tokio_util::io::ReaderStream;

use crate::handlers::{error_response, ErrorResponse};
use crate::state::ApiState;
use dbexport_core::Error;

/// Stream a completed export file. Only files belonging to a completed,
/// unexpired task ever resolve here.
pub async fn download_export_file(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    if !filename.starts_with("export-")
        || !filename.contains('.')
        || filename.contains('/')
        || filename.contains("..")
    {
        return Err(error_response(&Error::InvalidRequest(
            "invalid export file name".to_string(),
        )));
    }

    let task = state
        .registry
        .find_completed_by_filename(&filename)
        .await
        .ok_or_else(|| error_response(&Error::TaskNotFound(filename.clone())))?;

    let path = state.config.export_dir.join(&filename);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| error_response(&Error::TaskNotFound(filename.clone())))?;

    tracing::info!("Downloading export file {}", filename);

    let stream = ReaderStream::new(file);
    Response::builder()
        .header(header::CONTENT_TYPE, task.format.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| error_response(&Error::Other(anyhow::anyhow!(e))))
}
