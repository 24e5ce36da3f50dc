//! The `/transcribe` surface (spec §6): upload, list, inspect, download,
//! cancel, delete.

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use txo_ingest::ByteSource;
use txo_models::{TaskId, TaskOptions, TaskRecord};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Adapts one multipart field to the transport-agnostic `ByteSource` the
/// ingestor streams from, so `txo-ingest` never depends on `axum`.
struct FieldSource<'a>(Field<'a>);

impl<'a> ByteSource for FieldSource<'a> {
    async fn next_chunk(&mut self) -> std::io::Result<Option<bytes::Bytes>> {
        self.0
            .chunk()
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))
    }
}

/// `model`/`force_cpu` as configured by `VERSION_MODEL`/`FORCE_CPU`, used
/// whenever a request omits an `options` field or leaves those keys unset.
fn default_options(config: &ApiConfig) -> TaskOptions {
    TaskOptions {
        model: config.default_model.clone(),
        force_cpu: config.default_force_cpu,
        ..TaskOptions::default()
    }
}

/// Parses a request's `options` field onto `defaults`, so an omitted
/// `model`/`force_cpu` falls back to the server's configured default rather
/// than `TaskOptions`'s own type-level default.
fn parse_options(text: &str, defaults: &TaskOptions) -> ApiResult<TaskOptions> {
    let mut value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ApiError::Validation(format!("invalid options: {e}")))?;
    if let serde_json::Value::Object(map) = &mut value {
        map.entry("model").or_insert_with(|| serde_json::Value::String(defaults.model.clone()));
        map.entry("force_cpu").or_insert_with(|| serde_json::Value::Bool(defaults.force_cpu));
    }
    serde_json::from_value(value).map_err(|e| ApiError::Validation(format!("invalid options: {e}")))
}

fn field_filename(field: &Field<'_>) -> ApiResult<String> {
    field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("multipart file field is missing a filename".to_string()))
}

/// `POST /transcribe/` — single audio upload. An `options` text field, if
/// present, must appear before the `file` field in the multipart body.
pub async fn create_task(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<impl IntoResponse> {
    let mut options = default_options(&state.config);
    let mut upload: Option<(String, Field<'_>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("options") => {
                let text = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                options = parse_options(&text, &options)?;
            }
            Some("file") => {
                let filename = field_filename(&field)?;
                upload = Some((filename, field));
                break;
            }
            _ => {}
        }
    }

    let (filename, field) = upload.ok_or_else(|| ApiError::BadRequest("missing file field".to_string()))?;
    let mut source = FieldSource(field);
    let record = state.ingestor.ingest_audio(&filename, options, &mut source).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Serialize)]
pub struct BatchAudioItem {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct BatchAudioResponse {
    pub batch_id: String,
    pub items: Vec<BatchAudioItem>,
}

/// `POST /transcribe/batch-audio` — each `file` field ingested independently;
/// one file's failure does not stop the rest.
pub async fn create_batch_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field_filename(&field)?;
        files.push((filename, default_options(&state.config), FieldSource(field)));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("no file fields provided".to_string()));
    }

    let (batch_id, outcomes) = state.ingestor.ingest_audio_batch(files).await;
    let items = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(mut records) => BatchAudioItem {
                filename: outcome.filename,
                task_id: records.pop().map(|r| r.task_id),
                error: None,
            },
            Err(err) => BatchAudioItem {
                filename: outcome.filename,
                task_id: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    Ok((StatusCode::CREATED, Json(BatchAudioResponse { batch_id, items })))
}

#[derive(Serialize)]
pub struct ExtractSummary {
    pub total: usize,
    pub types: Vec<String>,
}

#[derive(Serialize)]
pub struct ExtractAudioResponse {
    pub batch_id: String,
    pub audio_path: String,
    pub transcriptions: Vec<TaskRecord>,
    pub summary: ExtractSummary,
}

/// `POST /transcribe/extract-audio` — single video upload, fanned out into
/// the four transcription variants (spec §3 invariant 6).
pub async fn extract_audio(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<impl IntoResponse> {
    let mut options = default_options(&state.config);
    let mut upload: Option<(String, Field<'_>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("options") => {
                let text = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                options = parse_options(&text, &options)?;
            }
            Some("file") => {
                let filename = field_filename(&field)?;
                upload = Some((filename, field));
                break;
            }
            _ => {}
        }
    }

    let (filename, field) = upload.ok_or_else(|| ApiError::BadRequest("missing file field".to_string()))?;
    let mut source = FieldSource(field);
    let records = state.ingestor.ingest_video(&filename, options, &mut source).await?;

    let batch_id = records
        .first()
        .and_then(|r| r.batch_id.clone())
        .unwrap_or_default();
    let audio_path = records.first().map(|r| r.source_path.clone()).unwrap_or_default();
    let types = records
        .iter()
        .filter_map(|r| r.variant)
        .map(|v| v.suffix().to_string())
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(ExtractAudioResponse {
            batch_id,
            audio_path,
            summary: ExtractSummary {
                total: records.len(),
                types,
            },
            transcriptions: records,
        }),
    ))
}

#[derive(Serialize)]
pub struct BatchVideoItem {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcriptions: Option<Vec<TaskRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct BatchVideoResponse {
    pub batch_id: String,
    pub items: Vec<BatchVideoItem>,
}

/// `POST /transcribe/batch-video` — each video is extracted and fanned out
/// independently; `batch_id` here only labels this request's response, since
/// each video already carries its own internal fan-out grouping.
pub async fn create_batch_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut items = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field_filename(&field)?;
        let mut source = FieldSource(field);
        let result = state
            .ingestor
            .ingest_video(&filename, default_options(&state.config), &mut source)
            .await;

        items.push(match result {
            Ok(records) => BatchVideoItem {
                filename,
                transcriptions: Some(records),
                error: None,
            },
            Err(err) => BatchVideoItem {
                filename,
                transcriptions: None,
                error: Some(err.to_string()),
            },
        });
    }

    if items.is_empty() {
        return Err(ApiError::BadRequest("no file fields provided".to_string()));
    }

    let batch_id = TaskId::generate().into_string();
    Ok((StatusCode::CREATED, Json(BatchVideoResponse { batch_id, items })))
}

#[derive(Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskRecord>,
    pub total: usize,
}

/// `GET /transcribe/`.
pub async fn list_tasks(State(state): State<AppState>) -> Json<ListTasksResponse> {
    let tasks = state.store.list().await;
    Json(ListTasksResponse { total: tasks.len(), tasks })
}

/// `GET /transcribe/{task_id}`.
pub async fn get_task(State(state): State<AppState>, Path(task_id): Path<String>) -> ApiResult<Json<TaskRecord>> {
    let task_id = TaskId::from(task_id);
    state
        .store
        .get(&task_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id} not found")))
}

/// `GET /transcribe/{task_id}/download` — 409 if the task has not completed.
pub async fn download_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let task_id = TaskId::from(task_id);
    let record = state
        .store
        .get(&task_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id} not found")))?;

    let output_path = record
        .output_path
        .as_ref()
        .ok_or_else(|| ApiError::Conflict(format!("task {task_id} has not completed")))?;

    let text = tokio::fs::read_to_string(output_path)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

/// `POST /transcribe/{task_id}/cancel` — always returns the current record
/// with 202; the terminal transition, if any, is observed via a later GET.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let task_id = TaskId::from(task_id);
    state.scheduler.cancel(&task_id).await?;
    let record = state
        .store
        .get(&task_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id} not found")))?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

#[derive(Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    with_files: bool,
}

/// `DELETE /transcribe/{task_id}` — idempotent; missing ids are not an error.
///
/// Video fan-out siblings (spec §3 invariant 6) share one `source_path`, so
/// `with_files=true` only unlinks it once no remaining record still points
/// at it — otherwise a sibling still `pending`/`processing` would lose the
/// audio it needs.
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let task_id = TaskId::from(task_id);
    let record = state.store.get(&task_id).await;
    state.store.delete(&task_id).await?;

    if params.with_files {
        if let Some(record) = record {
            let remaining = state.store.list().await;
            let source_still_referenced = remaining.iter().any(|r| r.source_path == record.source_path);
            if !source_still_referenced {
                let _ = tokio::fs::remove_file(&record.source_path).await;
            }
            if let Some(output) = &record.output_path {
                let _ = tokio::fs::remove_file(output).await;
            }
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
