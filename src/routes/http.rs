//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; failures surface as `AppError` responses.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::{header, StatusCode},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::domain::{ExerciseDraft, FolderDraft};
use crate::error::AppError;
use crate::logic;
use crate::matcher::MatchOptions;
use crate::protocol::*;
use crate::state::AppState;

type ApiResult<T> = Result<T, AppError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

// -------- Exercises --------

#[instrument(level = "info", skip(state))]
pub async fn http_list_exercises(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ExerciseQuery>,
) -> impl IntoResponse {
  Json(logic::list_exercises(&state, &q).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_exercise(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
  Ok(Json(logic::get_exercise(&state, &id).await?))
}

#[instrument(level = "info", skip(state, body), fields(title = %body.title))]
pub async fn http_create_exercise(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ExerciseDraft>,
) -> ApiResult<impl IntoResponse> {
  let ex = logic::create_exercise(&state, &body).await?;
  Ok((StatusCode::CREATED, Json(ex)))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_update_exercise(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ExerciseDraft>,
) -> ApiResult<impl IntoResponse> {
  Ok(Json(logic::update_exercise(&state, &id, &body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_exercise(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
  logic::delete_exercise(&state, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_export_exercises(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let all = logic::export_exercises(&state).await;
  info!(target: "library", count = all.len(), "Exercises exported");
  (
    [(header::CONTENT_DISPOSITION, "attachment; filename=\"exercises.json\"")],
    Json(all),
  )
}

#[instrument(level = "info", skip(state, body), fields(count = body.len()))]
pub async fn http_import_exercises(
  State(state): State<Arc<AppState>>,
  Json(body): Json<Vec<ExerciseDraft>>,
) -> ApiResult<impl IntoResponse> {
  Ok(Json(logic::import_exercises(&state, &body).await?))
}

// -------- Folders & categories --------

#[instrument(level = "info", skip(state))]
pub async fn http_list_folders(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::list_folders(&state).await)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_create_folder(
  State(state): State<Arc<AppState>>,
  Json(body): Json<FolderDraft>,
) -> ApiResult<impl IntoResponse> {
  let folder = logic::create_folder(&state, &body).await?;
  Ok((StatusCode::CREATED, Json(folder)))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_update_folder(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<FolderDraft>,
) -> ApiResult<impl IntoResponse> {
  Ok(Json(logic::update_folder(&state, &id, &body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_folder(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
  let moved = logic::delete_folder(&state, &id).await?;
  Ok(Json(FolderDeletedOut { moved }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_categories(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::list_categories(&state).await)
}

#[instrument(level = "info", skip(state, body), fields(name = %body.name))]
pub async fn http_add_category(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CategoryIn>,
) -> ApiResult<impl IntoResponse> {
  let name = logic::add_category(&state, &body.name).await?;
  Ok((StatusCode::CREATED, Json(serde_json::json!({ "name": name }))))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_category(
  State(state): State<Arc<AppState>>,
  Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
  logic::delete_category(&state, &name).await?;
  Ok(StatusCode::NO_CONTENT)
}

// -------- Progress & settings --------

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::progress_summary(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_calendar(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::progress_calendar(&state).await)
}

#[instrument(level = "info", skip(state), fields(scope = ?body.scope))]
pub async fn http_reset_progress(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ResetIn>,
) -> impl IntoResponse {
  Json(logic::reset_progress(&state, body.scope).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::get_settings(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_put_settings(
  State(state): State<Arc<AppState>>,
  Json(body): Json<MatchOptions>,
) -> impl IntoResponse {
  Json(logic::put_settings(&state, body).await)
}

// -------- Session --------

#[instrument(level = "info", skip(state, body))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  body: Option<Json<StartSessionIn>>,
) -> ApiResult<impl IntoResponse> {
  let params = body.map(|Json(b)| b).unwrap_or_default();
  let view = logic::start_session(&state, params).await?;
  Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
  logic::current_session(&state).await.map(Json).ok_or(AppError::NoActiveSession)
}

#[instrument(level = "info", skip(state))]
pub async fn http_end_session(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SessionRef>,
) -> ApiResult<impl IntoResponse> {
  logic::end_session(&state, q.session_id.as_deref()).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.answer.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> ApiResult<impl IntoResponse> {
  let out = logic::submit_answer(&state, body.session_id.as_deref(), &body.answer).await?;
  info!(target: "session", correct = out.correct, credited = out.credited, "HTTP submit_answer evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_hint(
  State(state): State<Arc<AppState>>,
  body: Option<Json<SessionRef>>,
) -> ApiResult<impl IntoResponse> {
  let r = body.map(|Json(b)| b).unwrap_or_default();
  Ok(Json(logic::request_hint(&state, r.session_id.as_deref()).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_reveal(
  State(state): State<Arc<AppState>>,
  body: Option<Json<SessionRef>>,
) -> ApiResult<impl IntoResponse> {
  let r = body.map(|Json(b)| b).unwrap_or_default();
  Ok(Json(logic::reveal_answer(&state, r.session_id.as_deref()).await?))
}

// -------- AI --------

#[instrument(level = "info", skip(state, body), fields(turns = body.messages.len()))]
pub async fn http_post_ai_chat(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ChatIn>,
) -> ApiResult<impl IntoResponse> {
  Ok(Json(logic::ai_chat(&state, &body.messages).await?))
}
