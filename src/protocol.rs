//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Field names are camelCase on the wire, matching the persisted data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Exercise;
use crate::openai::ChatMessage;
use crate::progress::{CreditOutcome, Progress, Rank, SOLVED_PER_LEVEL};
use crate::selector::{OrderStrategy, SessionFilter};
use crate::session::{AdvanceOutcome, IgnoredReason, SessionView};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartSession {
        #[serde(flatten)]
        params: StartSessionIn,
    },
    GetSession,
    SubmitAnswer {
        answer: String,
    },
    Hint,
    RevealAnswer,
    EndSession,
    GetProgress,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: Option<SessionView>,
    },
    AnswerResult {
        #[serde(flatten)]
        result: AnswerOut,
    },
    Hint {
        #[serde(flatten)]
        hints: HintOut,
    },
    Answer {
        answer: String,
    },
    /// Sent without a request when the advance timer fires.
    Advanced {
        outcome: AdvanceOutcome,
        session: SessionView,
    },
    SessionEnded,
    Progress {
        progress: ProgressOut,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

/// Optional filters for `GET /exercises`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseQuery {
    pub folder_id: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionIn {
    #[serde(default)]
    pub filter: SessionFilter,
    #[serde(default)]
    pub order: OrderStrategy,
    /// Overrides the configured session size.
    #[serde(default)]
    pub size: Option<usize>,
}

/// `sessionId` is optional; when given it must name the active session.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
    #[serde(default)]
    pub session_id: Option<String>,
    pub answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    pub correct: bool,
    /// Whether this correct answer counted toward progress.
    pub credited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<IgnoredReason>,
    #[serde(flatten)]
    pub credit: CreditOutcome,
    /// Milliseconds until the session moves on, when an advance was scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advance_in_ms: Option<u64>,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HintOut {
    pub hints: Vec<String>,
    pub hint_count: usize,
}

#[derive(Debug, Serialize)]
pub struct RevealOut {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOut {
    pub user_id: String,
    pub total_solved: u32,
    pub current_level: u32,
    pub rank: Rank,
    /// Solved exercises still needed for the next level.
    pub to_next_level: u32,
    pub current_streak: u32,
    pub active_days: usize,
    pub last_activity_date: DateTime<Utc>,
    pub solved_problems: Vec<String>,
}

impl ProgressOut {
    pub fn new(p: &Progress, today: chrono::NaiveDate) -> Self {
        Self {
            user_id: p.user_id.clone(),
            total_solved: p.total_solved,
            current_level: p.current_level,
            rank: p.rank(),
            to_next_level: SOLVED_PER_LEVEL - p.total_solved % SOLVED_PER_LEVEL,
            current_streak: p.current_streak(today),
            active_days: p.active_days(),
            last_activity_date: p.last_activity_date,
            solved_problems: p.solved_problems.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    /// Solved set, total and level; the calendar is kept.
    Solved,
    All,
}

#[derive(Debug, Deserialize)]
pub struct ResetIn {
    pub scope: ResetScope,
}

#[derive(Debug, Deserialize)]
pub struct CategoryIn {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ImportOut {
    pub imported: usize,
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FolderDeletedOut {
    /// Exercises moved to the default folder.
    pub moved: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatIn {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatOut {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise: Option<Exercise>,
}
