//! One practice run: an ordered list of exercises plus cursor, hint and
//! reveal state.
//!
//! A `Session` is an explicit value owned by whoever drives it (the service
//! keeps exactly one). All transitions are synchronous. The delayed move to
//! the next exercise after a correct answer is modelled as an `AdvanceTicket`:
//! the owner schedules `advance(ticket)` and a ticket that no longer matches
//! the pending one is discarded.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::Exercise;
use crate::matcher::{self, MatchOptions};
use crate::selector::{OrderStrategy, SessionFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
  InProgress,
  Completed,
}

/// Filter + order used to build the session, kept so a client can replay its settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionCriteria {
  pub filter: SessionFilter,
  pub order: OrderStrategy,
}

/// Identifies one scheduled advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct AdvanceTicket(u64);

/// Emitted for every correct answer; consumed by the progress tracker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
  pub exercise_id: String,
  /// False when the answer was revealed earlier in this session.
  pub credited: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoredReason {
  Completed,
  AdvancePending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
  Correct { event: AnswerEvent, ticket: AdvanceTicket },
  Incorrect,
  Ignored(IgnoredReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdvanceOutcome {
  Moved { index: usize },
  Completed,
  Stale,
}

#[derive(Clone, Debug)]
pub struct Session {
  id: String,
  exercises: Vec<Exercise>,
  current_index: usize,
  started_at: DateTime<Utc>,
  status: SessionStatus,
  answers_shown: HashSet<String>,
  /// Hints revealed for the current exercise.
  hints_revealed: usize,
  /// Answer revealed for the current exercise (display state only).
  answer_visible: bool,
  pending_advance: Option<AdvanceTicket>,
  next_ticket: u64,
  criteria: SessionCriteria,
}

impl Session {
  /// Start a session over `exercises`. Returns `None` for an empty list.
  pub fn start(exercises: Vec<Exercise>, criteria: SessionCriteria, now: DateTime<Utc>) -> Option<Self> {
    if exercises.is_empty() {
      return None;
    }
    Some(Self {
      id: Uuid::new_v4().to_string(),
      exercises,
      current_index: 0,
      started_at: now,
      status: SessionStatus::InProgress,
      answers_shown: HashSet::new(),
      hints_revealed: 0,
      answer_visible: false,
      pending_advance: None,
      next_ticket: 0,
      criteria,
    })
  }

  pub fn id(&self) -> &str { &self.id }
  pub fn exercises(&self) -> &[Exercise] { &self.exercises }
  pub fn current_index(&self) -> usize { self.current_index }
  pub fn started_at(&self) -> DateTime<Utc> { self.started_at }
  pub fn status(&self) -> SessionStatus { self.status }
  pub fn criteria(&self) -> &SessionCriteria { &self.criteria }
  pub fn is_completed(&self) -> bool { self.status == SessionStatus::Completed }
  pub fn pending_advance(&self) -> Option<AdvanceTicket> { self.pending_advance }

  pub fn answer_shown(&self, exercise_id: &str) -> bool {
    self.answers_shown.contains(exercise_id)
  }

  /// The exercise being worked on; `None` once the session is completed.
  pub fn current_exercise(&self) -> Option<&Exercise> {
    match self.status {
      SessionStatus::InProgress => self.exercises.get(self.current_index),
      SessionStatus::Completed => None,
    }
  }

  /// Hints revealed so far for the current exercise.
  pub fn revealed_hints(&self) -> &[String] {
    match self.current_exercise() {
      Some(ex) => &ex.hints[..self.hints_revealed.min(ex.hints.len())],
      None => &[],
    }
  }

  pub fn submit_answer(&mut self, text: &str, options: MatchOptions) -> SubmitOutcome {
    if self.pending_advance.is_some() {
      return SubmitOutcome::Ignored(IgnoredReason::AdvancePending);
    }
    let Some(exercise) = self.current_exercise() else {
      return SubmitOutcome::Ignored(IgnoredReason::Completed);
    };
    if !matcher::is_correct(text, exercise, options) {
      return SubmitOutcome::Incorrect;
    }

    let event = AnswerEvent {
      exercise_id: exercise.id.clone(),
      credited: !self.answers_shown.contains(&exercise.id),
    };
    let ticket = AdvanceTicket(self.next_ticket);
    self.next_ticket += 1;
    self.pending_advance = Some(ticket);
    SubmitOutcome::Correct { event, ticket }
  }

  /// Apply a scheduled advance. Tickets other than the pending one are stale.
  pub fn advance(&mut self, ticket: AdvanceTicket) -> AdvanceOutcome {
    if self.pending_advance != Some(ticket) {
      return AdvanceOutcome::Stale;
    }
    self.pending_advance = None;
    self.hints_revealed = 0;
    self.answer_visible = false;

    if self.current_index + 1 < self.exercises.len() {
      self.current_index += 1;
      AdvanceOutcome::Moved { index: self.current_index }
    } else {
      self.status = SessionStatus::Completed;
      AdvanceOutcome::Completed
    }
  }

  /// Drop any scheduled advance. Returns true if one was pending.
  pub fn cancel_pending_advance(&mut self) -> bool {
    self.pending_advance.take().is_some()
  }

  /// Mark the current answer as shown and return it. Credit for this exercise
  /// is forfeited for the rest of the session.
  pub fn reveal_answer(&mut self) -> Option<&str> {
    let id = self.current_exercise()?.id.clone();
    self.answers_shown.insert(id);
    self.answer_visible = true;
    self.current_exercise().map(|e| e.expected_code.as_str())
  }

  /// Reveal one more hint, capped at the hint count. Returns the hints revealed so far.
  pub fn request_hint(&mut self) -> &[String] {
    let Some(exercise) = self.current_exercise() else {
      return &[];
    };
    if self.hints_revealed < exercise.hints.len() {
      self.hints_revealed += 1;
    }
    self.revealed_hints()
  }

  pub fn view(&self) -> SessionView {
    let current = self.current_exercise().map(|ex| CurrentExerciseView {
      id: ex.id.clone(),
      title: ex.title.clone(),
      description: ex.description.clone(),
      difficulty: ex.difficulty.level(),
      category: ex.category.clone(),
      folder_id: ex.folder_id.clone(),
      hint_count: ex.hints.len(),
      revealed_hints: self.revealed_hints().to_vec(),
      answer: self.answer_visible.then(|| ex.expected_code.clone()),
    });
    SessionView {
      session_id: self.id.clone(),
      status: self.status,
      current_index: self.current_index,
      total: self.exercises.len(),
      started_at: self.started_at,
      advance_pending: self.pending_advance.is_some(),
      answers_shown: {
        let mut ids: Vec<String> = self.answers_shown.iter().cloned().collect();
        ids.sort();
        ids
      },
      criteria: self.criteria.clone(),
      current,
    }
  }
}

/// Read model handed to clients. Does not expose the answer unless it was revealed.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
  pub session_id: String,
  pub status: SessionStatus,
  pub current_index: usize,
  pub total: usize,
  pub started_at: DateTime<Utc>,
  pub advance_pending: bool,
  pub answers_shown: Vec<String>,
  pub criteria: SessionCriteria,
  pub current: Option<CurrentExerciseView>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentExerciseView {
  pub id: String,
  pub title: String,
  pub description: String,
  pub difficulty: u8,
  pub category: String,
  pub folder_id: String,
  pub hint_count: usize,
  pub revealed_hints: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub answer: Option<String>,
}
