//! Codedrill · Playwright practice backend
//!
//! The core (matcher, selector, session, progress) is synchronous and free of
//! I/O. `state`, `logic` and `routes` wrap it in an Axum service.

pub mod config;
pub mod domain;
pub mod error;
pub mod library;
pub mod logic;
pub mod matcher;
pub mod openai;
pub mod persistence;
pub mod progress;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod selector;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod util;

pub use error::{AppError, LibraryError};
pub use matcher::{is_correct, MatchOptions};
pub use routes::build_router;
pub use selector::{select_session, OrderStrategy, SessionFilter};
pub use session::{Session, SubmitOutcome};
pub use state::AppState;
