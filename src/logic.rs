//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Starting, driving and ending the active practice session
//!   - Feeding answer events into progress
//!   - Library CRUD with background persistence after each change
//!   - The AI generation chat

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Exercise, ExerciseDraft, Folder, FolderDraft, AI_FOLDER_ID};
use crate::error::AppError;
use crate::library::ai_folder;
use crate::matcher::MatchOptions;
use crate::openai::{ChatMessage, GenerationContext};
use crate::progress::CalendarDay;
use crate::protocol::{AnswerOut, ChatOut, ExerciseQuery, HintOut, ImportOut, ProgressOut, ResetScope, RevealOut, StartSessionIn};
use crate::selector::select_session;
use crate::session::{Session, SessionCriteria, SessionView, SubmitOutcome};
use crate::state::{ActiveSession, AppState};
use crate::util::trunc_for_log;

/// The active session, checked against the id the client thinks it is driving.
fn active_mut<'a>(
  slot: &'a mut Option<ActiveSession>,
  session_id: Option<&str>,
) -> Result<&'a mut ActiveSession, AppError> {
  let active = slot.as_mut().ok_or(AppError::NoActiveSession)?;
  match session_id {
    Some(id) if id != active.session.id() => Err(AppError::SessionNotFound(id.to_string())),
    _ => Ok(active),
  }
}

// -------- Session --------

#[instrument(level = "info", skip(state, params), fields(order = %params.order, mode = ?params.filter.mode, values = params.filter.values.len()))]
pub async fn start_session(state: &AppState, params: StartSessionIn) -> Result<SessionView, AppError> {
  let size = params.size.unwrap_or(state.session_cfg.size).max(1);
  let exercises = {
    let library = state.library.read().await;
    let progress = state.progress.read().await;
    select_session(
      library.exercises(),
      &progress.solved_problems,
      &params.filter,
      params.order,
      size,
      &mut rand::thread_rng(),
    )
  };

  let criteria = SessionCriteria { filter: params.filter, order: params.order };
  let session = Session::start(exercises, criteria, Utc::now()).ok_or(AppError::NoMatchingExercises)?;
  let view = state.replace_session(session).await;
  info!(target: "session", session_id = %view.session_id, total = view.total, "Session started");
  Ok(view)
}

pub async fn current_session(state: &AppState) -> Option<SessionView> {
  state.active.lock().await.as_ref().map(|a| a.session.view())
}

#[instrument(level = "info", skip(state))]
pub async fn end_session(state: &AppState, session_id: Option<&str>) -> Result<(), AppError> {
  let mut slot = state.active.lock().await;
  active_mut(&mut slot, session_id)?;
  if let Some(mut ended) = slot.take() {
    ended.cancel_advance();
    info!(target: "session", session_id = %ended.session.id(), index = ended.session.current_index(), "Session ended");
  }
  Ok(())
}

#[instrument(level = "info", skip(state, answer), fields(answer_len = answer.len()))]
pub async fn submit_answer(state: &AppState, session_id: Option<&str>, answer: &str) -> Result<AnswerOut, AppError> {
  let options = *state.grading.read().await;
  let mut slot = state.active.lock().await;
  let active = active_mut(&mut slot, session_id)?;

  let outcome = active.session.submit_answer(answer, options);
  let mut out = AnswerOut {
    correct: false,
    credited: false,
    ignored: None,
    credit: Default::default(),
    advance_in_ms: None,
    session: active.session.view(),
  };

  match outcome {
    SubmitOutcome::Correct { mut event, ticket } => {
      // The session holds its own copy; the exercise may have been deleted since.
      let in_library = state.library.read().await.exercise(&event.exercise_id).is_some();
      let credit = if in_library {
        state.progress.write().await.record(&event, Utc::now())
      } else {
        warn!(target: "session", exercise = %event.exercise_id, "Exercise no longer in library; no credit");
        event.credited = false;
        Default::default()
      };
      state.schedule_advance(active, ticket);
      info!(target: "session", exercise = %event.exercise_id, credited = event.credited, newly_solved = credit.newly_solved, level_up = credit.level_up, "Correct answer");
      out.correct = true;
      out.credited = event.credited;
      out.credit = credit;
      out.advance_in_ms = Some(state.session_cfg.advance_delay_ms);
      out.session = active.session.view();
      drop(slot);
      state.persist();
    }
    SubmitOutcome::Incorrect => {
      debug!(target: "session", answer = %trunc_for_log(answer, 80), "Incorrect answer");
    }
    SubmitOutcome::Ignored(reason) => {
      debug!(target: "session", ?reason, "Submission ignored");
      out.ignored = Some(reason);
    }
  }
  Ok(out)
}

#[instrument(level = "info", skip(state))]
pub async fn request_hint(state: &AppState, session_id: Option<&str>) -> Result<HintOut, AppError> {
  let mut slot = state.active.lock().await;
  let active = active_mut(&mut slot, session_id)?;
  let hint_count = active.session.current_exercise().map_or(0, |e| e.hints.len());
  let hints = active.session.request_hint().to_vec();
  debug!(target: "session", revealed = hints.len(), hint_count, "Hint served");
  Ok(HintOut { hints, hint_count })
}

#[instrument(level = "info", skip(state))]
pub async fn reveal_answer(state: &AppState, session_id: Option<&str>) -> Result<RevealOut, AppError> {
  let mut slot = state.active.lock().await;
  let active = active_mut(&mut slot, session_id)?;
  let answer = active
    .session
    .reveal_answer()
    .map(str::to_string)
    .ok_or_else(|| AppError::BadRequest("session is completed".into()))?;
  info!(target: "session", session_id = %active.session.id(), "Answer revealed; no credit for this exercise");
  Ok(RevealOut { answer })
}

// -------- Progress & settings --------

pub async fn progress_summary(state: &AppState) -> ProgressOut {
  ProgressOut::new(&*state.progress.read().await, Utc::now().date_naive())
}

pub async fn progress_calendar(state: &AppState) -> Vec<CalendarDay> {
  state.progress.read().await.calendar(Utc::now().date_naive())
}

#[instrument(level = "info", skip(state))]
pub async fn reset_progress(state: &AppState, scope: ResetScope) -> ProgressOut {
  {
    let mut progress = state.progress.write().await;
    match scope {
      ResetScope::Solved => progress.reset_solved(),
      ResetScope::All => progress.reset_all(Utc::now()),
    }
  }
  warn!(target: "codedrill", ?scope, "Progress reset");
  state.persist();
  progress_summary(state).await
}

pub async fn get_settings(state: &AppState) -> MatchOptions {
  *state.grading.read().await
}

#[instrument(level = "info", skip(state))]
pub async fn put_settings(state: &AppState, options: MatchOptions) -> MatchOptions {
  *state.grading.write().await = options;
  options
}

// -------- Library --------

pub async fn list_exercises(state: &AppState, q: &ExerciseQuery) -> Vec<Exercise> {
  state
    .library
    .read()
    .await
    .exercises()
    .iter()
    .filter(|e| q.folder_id.as_deref().map_or(true, |f| e.folder_id == f))
    .filter(|e| q.category.as_deref().map_or(true, |c| e.category == c))
    .cloned()
    .collect()
}

pub async fn get_exercise(state: &AppState, id: &str) -> Result<Exercise, AppError> {
  state
    .library
    .read()
    .await
    .exercise(id)
    .cloned()
    .ok_or_else(|| crate::error::LibraryError::ExerciseNotFound(id.to_string()).into())
}

#[instrument(level = "info", skip(state, draft), fields(title = %trunc_for_log(&draft.title, 60)))]
pub async fn create_exercise(state: &AppState, draft: &ExerciseDraft) -> Result<Exercise, AppError> {
  let ex = state.library.write().await.add_exercise(draft, Utc::now())?.clone();
  state.persist();
  Ok(ex)
}

#[instrument(level = "info", skip(state, draft))]
pub async fn update_exercise(state: &AppState, id: &str, draft: &ExerciseDraft) -> Result<Exercise, AppError> {
  let ex = state.library.write().await.update_exercise(id, draft, Utc::now())?.clone();
  state.persist();
  Ok(ex)
}

/// Delete an exercise and drop it from the solved set.
#[instrument(level = "info", skip(state))]
pub async fn delete_exercise(state: &AppState, id: &str) -> Result<Exercise, AppError> {
  let removed = {
    let mut library = state.library.write().await;
    let removed = library.delete_exercise(id)?;
    state.progress.write().await.retain_solved(|sid| library.exercise(sid).is_some());
    removed
  };
  state.persist();
  Ok(removed)
}

#[instrument(level = "info", skip(state, drafts), fields(count = drafts.len()))]
pub async fn import_exercises(state: &AppState, drafts: &[ExerciseDraft]) -> Result<ImportOut, AppError> {
  let ids = state.library.write().await.import_exercises(drafts, Utc::now())?;
  state.persist();
  Ok(ImportOut { imported: ids.len(), ids })
}

pub async fn export_exercises(state: &AppState) -> Vec<Exercise> {
  state.library.read().await.export_exercises()
}

pub async fn list_folders(state: &AppState) -> Vec<Folder> {
  state.library.read().await.folders().to_vec()
}

#[instrument(level = "info", skip(state, draft), fields(name = %draft.name))]
pub async fn create_folder(state: &AppState, draft: &FolderDraft) -> Result<Folder, AppError> {
  let folder = state.library.write().await.add_folder(draft, Utc::now())?.clone();
  state.persist();
  Ok(folder)
}

#[instrument(level = "info", skip(state, draft))]
pub async fn update_folder(state: &AppState, id: &str, draft: &FolderDraft) -> Result<Folder, AppError> {
  let folder = state.library.write().await.update_folder(id, draft, Utc::now())?.clone();
  state.persist();
  Ok(folder)
}

#[instrument(level = "info", skip(state))]
pub async fn delete_folder(state: &AppState, id: &str) -> Result<usize, AppError> {
  let moved = state.library.write().await.delete_folder(id, Utc::now())?;
  state.persist();
  Ok(moved)
}

pub async fn list_categories(state: &AppState) -> Vec<String> {
  state.library.read().await.categories().to_vec()
}

#[instrument(level = "info", skip(state))]
pub async fn add_category(state: &AppState, name: &str) -> Result<String, AppError> {
  let name = state.library.write().await.add_category(name)?.to_string();
  state.persist();
  Ok(name)
}

#[instrument(level = "info", skip(state))]
pub async fn delete_category(state: &AppState, name: &str) -> Result<(), AppError> {
  state.library.write().await.delete_category(name)?;
  state.persist();
  Ok(())
}

// -------- AI generation --------

/// Forward the conversation to the model. A generated exercise lands in the
/// folder it names when that folder exists, otherwise in `ai-generated`.
#[instrument(level = "info", skip(state, messages), fields(turns = messages.len()))]
pub async fn ai_chat(state: &AppState, messages: &[ChatMessage]) -> Result<ChatOut, AppError> {
  let oa = state.openai.as_ref().ok_or(AppError::GenerationUnavailable)?;
  if messages.is_empty() {
    return Err(AppError::BadRequest("messages must not be empty".into()));
  }

  let ctx = {
    let library = state.library.read().await;
    GenerationContext {
      categories: library.categories().to_vec(),
      folders: library.folders().iter().map(|f| format!("{} ({})", f.id, f.name)).collect(),
    }
  };
  let reply = oa.chat(&state.prompts, messages, &ctx).await.map_err(AppError::Generation)?;

  let Some(mut draft) = reply.generated else {
    return Ok(ChatOut { content: reply.content, exercise: None });
  };

  let now = Utc::now();
  let exercise = {
    let mut library = state.library.write().await;
    let target = draft
      .folder_id
      .as_deref()
      .map(str::trim)
      .filter(|id| !id.is_empty() && library.has_folder(id))
      .map(str::to_string);
    if target.is_none() {
      library.ensure_folder(ai_folder(now));
    }
    draft.folder_id = Some(target.unwrap_or_else(|| AI_FOLDER_ID.to_string()));
    library
      .add_exercise(&draft, now)
      .map_err(|e| AppError::Generation(format!("generated exercise rejected: {}", e)))?
      .clone()
  };
  info!(target: "codedrill", id = %exercise.id, folder = %exercise.folder_id, "AI exercise stored");
  state.persist();
  Ok(ChatOut { content: reply.content, exercise: Some(exercise) })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::error::LibraryError;
  use crate::selector::{OrderStrategy, SessionFilter};
  use crate::seeds::BASICS_FOLDER_ID;
  use crate::session::IgnoredReason;

  fn state() -> AppState {
    let mut cfg = AppConfig::default();
    cfg.session.advance_delay_ms = 10_000;
    AppState::in_memory(&cfg)
  }

  fn basics() -> StartSessionIn {
    StartSessionIn { filter: SessionFilter::folders([BASICS_FOLDER_ID]), order: OrderStrategy::PoolOrder, size: None }
  }

  async fn current_answer(state: &AppState) -> String {
    let slot = state.active.lock().await;
    slot.as_ref().unwrap().session.current_exercise().unwrap().expected_code.clone()
  }

  #[tokio::test]
  async fn empty_selection_does_not_start_a_session() {
    let s = state();
    let params = StartSessionIn { filter: SessionFilter::categories(["nope"]), ..Default::default() };
    assert!(matches!(start_session(&s, params).await, Err(AppError::NoMatchingExercises)));
    assert!(current_session(&s).await.is_none());
  }

  #[tokio::test]
  async fn correct_answer_credits_progress_and_blocks_until_advance() {
    let s = state();
    let view = start_session(&s, basics()).await.unwrap();
    assert_eq!(view.total, 3);

    let wrong = submit_answer(&s, None, "await page.reload();").await.unwrap();
    assert!(!wrong.correct);

    let answer = current_answer(&s).await;
    let out = submit_answer(&s, Some(&view.session_id), &answer).await.unwrap();
    assert!(out.correct && out.credited && out.credit.newly_solved);
    assert!(out.session.advance_pending);
    assert_eq!(progress_summary(&s).await.total_solved, 1);

    let again = submit_answer(&s, None, &answer).await.unwrap();
    assert_eq!(again.ignored, Some(IgnoredReason::AdvancePending));
    assert_eq!(progress_summary(&s).await.total_solved, 1);
  }

  #[tokio::test]
  async fn revealed_answer_is_not_credited() {
    let s = state();
    start_session(&s, basics()).await.unwrap();
    let shown = reveal_answer(&s, None).await.unwrap().answer;
    let out = submit_answer(&s, None, &shown).await.unwrap();
    assert!(out.correct);
    assert!(!out.credited);
    assert_eq!(progress_summary(&s).await.total_solved, 0);
  }

  #[tokio::test]
  async fn wrong_session_id_is_rejected() {
    let s = state();
    start_session(&s, basics()).await.unwrap();
    assert!(matches!(request_hint(&s, Some("other")).await, Err(AppError::SessionNotFound(_))));
    end_session(&s, None).await.unwrap();
    assert!(matches!(request_hint(&s, None).await, Err(AppError::NoActiveSession)));
  }

  #[tokio::test]
  async fn hints_are_capped() {
    let s = state();
    start_session(&s, basics()).await.unwrap();
    let mut last = HintOut { hints: vec![], hint_count: 0 };
    for _ in 0..5 {
      last = request_hint(&s, None).await.unwrap();
    }
    assert_eq!(last.hints.len(), last.hint_count);
  }

  #[tokio::test]
  async fn deleting_a_solved_exercise_prunes_progress() {
    let s = state();
    start_session(&s, basics()).await.unwrap();
    let answer = current_answer(&s).await;
    let out = submit_answer(&s, None, &answer).await.unwrap();
    let id = out.session.current.unwrap().id;

    delete_exercise(&s, &id).await.unwrap();
    let progress = progress_summary(&s).await;
    assert_eq!(progress.total_solved, 0);
    assert!(matches!(
      get_exercise(&s, &id).await,
      Err(AppError::Library(LibraryError::ExerciseNotFound(_)))
    ));
  }

  #[tokio::test]
  async fn solving_a_deleted_exercise_earns_no_credit() {
    let s = state();
    let view = start_session(&s, basics()).await.unwrap();
    let id = view.current.unwrap().id;
    let answer = current_answer(&s).await;

    delete_exercise(&s, &id).await.unwrap();
    let out = submit_answer(&s, None, &answer).await.unwrap();
    assert!(out.correct);
    assert!(!out.credited);
    assert!(!out.credit.newly_solved);
    assert!(out.session.advance_pending);

    let progress = progress_summary(&s).await;
    assert_eq!(progress.total_solved, 0);
    assert!(progress.solved_problems.is_empty());
  }

  #[tokio::test]
  async fn chat_without_openai_is_unavailable() {
    let s = state();
    let msgs = vec![ChatMessage { role: crate::openai::ChatRole::User, content: "hi".into() }];
    assert!(matches!(ai_chat(&s, &msgs).await, Err(AppError::GenerationUnavailable)));
  }

  #[tokio::test]
  async fn reset_solved_keeps_the_calendar() {
    let s = state();
    start_session(&s, basics()).await.unwrap();
    let answer = current_answer(&s).await;
    submit_answer(&s, None, &answer).await.unwrap();

    let after = reset_progress(&s, ResetScope::Solved).await;
    assert_eq!(after.total_solved, 0);
    assert_eq!(after.active_days, 1);
    assert_eq!(reset_progress(&s, ResetScope::All).await.active_days, 0);
  }
}
