//! Application state: the library and progress stores, grading settings, the
//! single active session, the OpenAI client and persistence.
//!
//! This module owns:
//!   - startup loading (snapshot from disk, or seeds for a fresh install)
//!   - the advance timer that moves a session on after a correct answer
//!   - background snapshot saves after every mutation
//!
//! Lock order when more than one is needed: `grading`, then `active`, then
//! `library`, then `progress`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{AppConfig, Prompts, SessionSettings};
use crate::library::Library;
use crate::matcher::MatchOptions;
use crate::openai::OpenAI;
use crate::persistence::{JsonFileStore, PersistError, Persistence, Snapshot};
use crate::progress::Progress;
use crate::seeds::{seed_exercises, seed_folders};
use crate::session::{AdvanceOutcome, AdvanceTicket, Session, SessionView};

/// The running session plus the timer task that will advance it, if any.
pub struct ActiveSession {
    pub session: Session,
    advance: Option<JoinHandle<()>>,
}

impl ActiveSession {
    pub fn new(session: Session) -> Self {
        Self { session, advance: None }
    }

    /// Abort the timer task and drop the pending ticket.
    pub fn cancel_advance(&mut self) {
        if let Some(handle) = self.advance.take() {
            handle.abort();
        }
        self.session.cancel_pending_advance();
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        if let Some(handle) = self.advance.take() {
            handle.abort();
        }
    }
}

/// Pushed to WebSocket clients when the session changes outside a request.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Advanced { outcome: AdvanceOutcome, session: SessionView },
}

#[derive(Clone)]
pub struct AppState {
    pub library: Arc<RwLock<Library>>,
    pub progress: Arc<RwLock<Progress>>,
    pub grading: Arc<RwLock<MatchOptions>>,
    pub active: Arc<Mutex<Option<ActiveSession>>>,
    pub events: broadcast::Sender<SessionEvent>,
    pub session_cfg: SessionSettings,
    pub openai: Option<OpenAI>,
    pub prompts: Prompts,
    persistence: Persistence,
    save_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        cfg: &AppConfig,
        library: Library,
        progress: Progress,
        persistence: Persistence,
        openai: Option<OpenAI>,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            library: Arc::new(RwLock::new(library)),
            progress: Arc::new(RwLock::new(progress)),
            grading: Arc::new(RwLock::new(cfg.grading)),
            active: Arc::new(Mutex::new(None)),
            events,
            session_cfg: cfg.session.clone(),
            openai,
            prompts: cfg.prompts.clone(),
            persistence,
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Seeded, memory-only state without OpenAI. Used by tests and demos.
    pub fn in_memory(cfg: &AppConfig) -> Self {
        let now = Utc::now();
        Self::new(cfg, seeded_library(cfg, now), Progress::new(now), Persistence::Memory, None)
    }

    /// Build state from config: load the snapshot (or seed), init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub async fn load(cfg: &AppConfig) -> Self {
        let now = Utc::now();
        let mut persistence = match &cfg.storage.data_dir {
            Some(dir) => Persistence::JsonFiles(JsonFileStore::new(dir)),
            None => Persistence::Memory,
        };

        let (library, progress) = match persistence.load().await {
            Ok(Some((snapshot, loaded))) if loaded.exercises => {
                let library = Library::from_parts(snapshot.exercises, snapshot.folders, snapshot.categories, now);
                (library, snapshot.progress)
            }
            Ok(Some((snapshot, loaded))) => {
                // Only the exercises fall back to seeds; saved folders and categories stay.
                let folders = if loaded.folders { snapshot.folders } else { seed_folders(now) };
                let library = with_config_bank(cfg, Library::from_parts(seed_exercises(now), folders, snapshot.categories, now), now);
                (library, snapshot.progress)
            }
            Ok(None) => (seeded_library(cfg, now), Progress::new(now)),
            Err(e) => {
                // Keep the unreadable files untouched instead of overwriting them.
                error!(target: "codedrill", error = %e, "Snapshot unreadable; running in memory only");
                persistence = Persistence::Memory;
                (seeded_library(cfg, now), Progress::new(now))
            }
        };

        info!(
            target: "codedrill",
            exercises = library.exercises().len(),
            folders = library.folders().len(),
            categories = library.categories().len(),
            solved = progress.total_solved,
            "Startup inventory"
        );

        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "codedrill", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
        } else {
            info!(target: "codedrill", "OpenAI disabled (no OPENAI_API_KEY). AI chat will answer 503.");
        }

        let state = Self::new(cfg, library, progress, persistence, openai);
        state.persist();
        state
    }

    pub async fn snapshot(&self) -> Snapshot {
        let library = self.library.read().await;
        let progress = self.progress.read().await;
        Snapshot {
            exercises: library.exercises().to_vec(),
            folders: library.folders().to_vec(),
            categories: library.categories().to_vec(),
            progress: progress.clone(),
        }
    }

    /// Save the current snapshot in the background. Saves are serialized and
    /// each one reads the latest state, so the last write always wins.
    pub fn persist(&self) {
        if matches!(self.persistence, Persistence::Memory) {
            return;
        }
        let state = self.clone();
        tokio::spawn(async move {
            if let Err(e) = state.save_now().await {
                error!(target: "codedrill", error = %e, "Snapshot save failed");
            }
        });
    }

    /// Save the current snapshot and wait for the write to finish.
    pub async fn save_now(&self) -> Result<(), PersistError> {
        let _guard = self.save_lock.lock().await;
        let snapshot = self.snapshot().await;
        self.persistence.save(&snapshot).await
    }

    /// Install a new session, cancelling whatever was running before.
    #[instrument(level = "debug", skip(self, session), fields(session_id = %session.id()))]
    pub async fn replace_session(&self, session: Session) -> SessionView {
        let view = session.view();
        let mut active = self.active.lock().await;
        if let Some(previous) = active.replace(ActiveSession::new(session)) {
            debug!(target: "session", previous = %previous.session.id(), "Replacing active session");
        }
        view
    }

    /// Spawn the timer that applies `ticket` after the configured delay and
    /// attach it to the active session.
    pub fn schedule_advance(&self, active: &mut ActiveSession, ticket: AdvanceTicket) {
        let delay = Duration::from_millis(self.session_cfg.advance_delay_ms);
        let slot = self.active.clone();
        let events = self.events.clone();
        let session_id = active.session.id().to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut guard = slot.lock().await;
            let Some(current) = guard.as_mut().filter(|a| a.session.id() == session_id) else {
                debug!(target: "session", %session_id, "Advance dropped: session gone");
                return;
            };
            let outcome = current.session.advance(ticket);
            if outcome == AdvanceOutcome::Stale {
                warn!(target: "session", %session_id, "Stale advance ticket ignored");
                return;
            }
            // This task is finishing; detach it without aborting itself.
            current.advance = None;
            info!(target: "session", %session_id, ?outcome, "Session advanced");
            let _ = events.send(SessionEvent::Advanced { outcome, session: current.session.view() });
        });

        if let Some(old) = active.advance.replace(handle) {
            old.abort();
        }
    }
}

/// Seed exercises and folders plus any exercises from the config bank.
pub fn seeded_library(cfg: &AppConfig, now: DateTime<Utc>) -> Library {
    with_config_bank(cfg, Library::from_parts(seed_exercises(now), seed_folders(now), Vec::new(), now), now)
}

fn with_config_bank(cfg: &AppConfig, mut library: Library, now: DateTime<Utc>) -> Library {
    for (i, draft) in cfg.exercises.iter().enumerate() {
        if let Err(e) = library.add_exercise(draft, now) {
            error!(target: "library", index = i, error = %e, "Skipping config bank exercise");
        }
    }
    library
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::OrderStrategy;
    use crate::session::{SessionCriteria, SubmitOutcome};

    fn cfg(delay_ms: u64) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.session.advance_delay_ms = delay_ms;
        cfg
    }

    async fn start(state: &AppState) -> String {
        let exercises = state.library.read().await.exercises()[..2].to_vec();
        let criteria = SessionCriteria { order: OrderStrategy::PoolOrder, ..Default::default() };
        let session = Session::start(exercises, criteria, Utc::now()).unwrap();
        state.replace_session(session).await.session_id
    }

    async fn answer_current(state: &AppState) {
        let mut guard = state.active.lock().await;
        let active = guard.as_mut().unwrap();
        let answer = active.session.current_exercise().unwrap().expected_code.clone();
        match active.session.submit_answer(&answer, MatchOptions::default()) {
            SubmitOutcome::Correct { ticket, .. } => state.schedule_advance(active, ticket),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_restores_saved_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = cfg(0);
        cfg.storage.data_dir = Some(dir.path().to_path_buf());

        let first = AppState::load(&cfg).await;
        first.library.write().await.add_category("Frames").unwrap();
        first.save_now().await.unwrap();

        let second = AppState::load(&cfg).await;
        assert!(second.library.read().await.categories().contains(&"Frames".to_string()));
        assert_eq!(second.library.read().await.exercises().len(), 5);
    }

    #[tokio::test]
    async fn missing_exercises_file_keeps_saved_folders_and_categories() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let mut folders = seed_folders(now);
        folders.push(crate::domain::Folder {
            id: "mine".into(),
            name: "Mine".into(),
            ..folders[0].clone()
        });
        std::fs::write(dir.path().join("folders.json"), serde_json::to_string(&folders).unwrap()).unwrap();
        std::fs::write(dir.path().join("categories.json"), r#"["Frames"]"#).unwrap();

        let mut cfg = cfg(0);
        cfg.storage.data_dir = Some(dir.path().to_path_buf());
        let state = AppState::load(&cfg).await;

        let library = state.library.read().await;
        assert!(library.has_folder("mine"));
        assert!(library.categories().contains(&"Frames".to_string()));
        assert_eq!(library.exercises().len(), 5);
    }

    #[test]
    fn config_bank_is_added_after_seeds() {
        let mut cfg = cfg(0);
        cfg.exercises.push(crate::domain::ExerciseDraft {
            title: "Reload".into(),
            expected_code: "await page.reload();".into(),
            difficulty: 1,
            category: "Navigation".into(),
            ..Default::default()
        });
        cfg.exercises.push(crate::domain::ExerciseDraft::default());
        let lib = seeded_library(&cfg, Utc::now());
        assert_eq!(lib.exercises().len(), 6);
        assert!(lib.categories().contains(&"Navigation".to_string()));
    }

    #[tokio::test]
    async fn timer_advances_the_session() {
        let state = AppState::in_memory(&cfg(0));
        let mut events = state.events.subscribe();
        start(&state).await;
        answer_current(&state).await;

        let SessionEvent::Advanced { outcome, session } = events.recv().await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::Moved { index: 1 });
        assert_eq!(session.current_index, 1);
        assert!(!session.advance_pending);
    }

    #[tokio::test]
    async fn replacing_the_session_aborts_its_timer() {
        let state = AppState::in_memory(&cfg(50));
        start(&state).await;
        answer_current(&state).await;
        let second = start(&state).await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        let guard = state.active.lock().await;
        let active = guard.as_ref().unwrap();
        assert_eq!(active.session.id(), second);
        assert_eq!(active.session.current_index(), 0);
    }

    #[tokio::test]
    async fn cancelled_advance_never_fires() {
        let state = AppState::in_memory(&cfg(30));
        start(&state).await;
        answer_current(&state).await;
        state.active.lock().await.as_mut().unwrap().cancel_advance();

        tokio::time::sleep(Duration::from_millis(80)).await;
        let guard = state.active.lock().await;
        let session = &guard.as_ref().unwrap().session;
        assert_eq!(session.current_index(), 0);
        assert!(session.pending_advance().is_none());
    }
}
