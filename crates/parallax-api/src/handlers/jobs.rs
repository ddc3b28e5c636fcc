//! Video submission and task polling handlers.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use parallax_models::{normalize, JobId, JobState, RawImage, RawSubmission, SubmissionError};
use parallax_queue::{JobLookup, JobStatusView};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{is_valid_job_id, sanitize_string};
use crate::state::AppState;

/// Multipart field carrying the still image.
pub const IMAGE_FIELD: &str = "image";

/// Status text for a job no worker has picked up yet.
pub const PENDING_MESSAGE: &str = "Pending...";

/// Response to an accepted submission.
#[derive(Debug, Serialize)]
pub struct CreateVideoResponse {
    pub task_id: String,
}

/// Poll response.
#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub state: JobState,
    /// Liveness text, output path or error string depending on `state`
    pub status: String,
}

impl From<JobStatusView> for TaskStatusResponse {
    fn from(view: JobStatusView) -> Self {
        Self {
            state: view.state,
            status: view.payload.unwrap_or_else(|| PENDING_MESSAGE.to_string()),
        }
    }
}

impl TaskStatusResponse {
    fn pending() -> Self {
        Self {
            state: JobState::Pending,
            status: PENDING_MESSAGE.to_string(),
        }
    }
}

/// Submit an image and animation settings for rendering.
///
/// Returns 202 with the task id. Any validation failure returns 400 and
/// creates no job.
pub async fn create_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<CreateVideoResponse>)> {
    let raw = read_submission(&mut multipart).await?;

    let normalized = normalize(&raw).map_err(|e| {
        metrics::record_submission_rejected(rejection_reason(&e));
        warn!("Rejected submission: {}", e);
        e
    })?;
    let effects = normalized.animations.enabled().count();

    let image_path = state
        .uploads
        .save(normalized.image)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;
    metrics::record_upload_bytes(normalized.image.bytes.len());
    info!(
        file_name = %sanitize_string(&normalized.image.file_name),
        path = %image_path.display(),
        "Stored uploaded image"
    );

    let spec = normalized.into_job_spec(&image_path);
    let job_id = match state.dispatcher.dispatch(spec).await {
        Ok(job_id) => job_id,
        Err(e) => {
            state.uploads.discard(&image_path).await;
            return Err(e.into());
        }
    };
    metrics::record_job_enqueued(effects);

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateVideoResponse {
            task_id: job_id.to_string(),
        }),
    ))
}

/// Poll a task's state.
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskStatusResponse>> {
    if !is_valid_job_id(&task_id) {
        return Err(ApiError::bad_request(format!(
            "Invalid task id: {}",
            sanitize_string(&task_id)
        )));
    }

    let job_id = JobId::from_string(task_id);
    match state.status.status(&job_id).await? {
        JobLookup::Found(view) => Ok(Json(view.into())),
        JobLookup::NotFound if state.config.legacy_unknown_as_pending => {
            Ok(Json(TaskStatusResponse::pending()))
        }
        JobLookup::NotFound => Err(ApiError::not_found(format!("Unknown task id: {}", job_id))),
    }
}

/// Collect the multipart form into a raw submission.
///
/// The `image` part becomes the upload; every other part is a text field.
/// The first occurrence of a name wins.
async fn read_submission(multipart: &mut Multipart) -> ApiResult<RawSubmission> {
    let mut raw = RawSubmission::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == IMAGE_FIELD {
            if raw.image.is_some() {
                continue;
            }
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            raw.image = Some(RawImage {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else if !raw.fields.contains_key(&name) {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            raw.fields.insert(name, value);
        }
    }

    Ok(raw)
}

/// Label for the rejected-submissions counter.
fn rejection_reason(err: &SubmissionError) -> &'static str {
    match err {
        SubmissionError::MissingImage => "missing_image",
        SubmissionError::EmptyFileName => "empty_file_name",
        SubmissionError::InvalidContentType(_) => "invalid_content_type",
        SubmissionError::EmptyImage => "empty_image",
        SubmissionError::MissingField(_) => "missing_field",
        SubmissionError::InvalidField { .. } => "invalid_field",
    }
}
