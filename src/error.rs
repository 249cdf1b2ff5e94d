use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;

/// Validation failures from the exercise/folder/category library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
  #[error("{field} must not be empty")]
  EmptyField { field: &'static str },
  #[error("invalid difficulty {0}: must be 1, 2 or 3")]
  InvalidDifficulty(u8),
  #[error("exercise not found: {0}")]
  ExerciseNotFound(String),
  #[error("folder not found: {0}")]
  FolderNotFound(String),
  #[error("the default folder cannot be deleted")]
  ReservedFolder,
  #[error("category already exists: {0}")]
  DuplicateCategory(String),
  #[error("category not found: {0}")]
  CategoryNotFound(String),
  #[error("category '{name}' is still used by {count} exercise(s)")]
  CategoryInUse { name: String, count: usize },
  #[error("import rejected: item {index}: {reason}")]
  InvalidImport { index: usize, reason: Box<LibraryError> },
}

#[derive(Error, Debug)]
pub enum AppError {
  #[error(transparent)]
  Library(#[from] LibraryError),
  #[error("no session in progress")]
  NoActiveSession,
  #[error("no active session with id {0}")]
  SessionNotFound(String),
  #[error("no exercises match the selected filter")]
  NoMatchingExercises,
  #[error("AI generation is not configured (OPENAI_API_KEY missing)")]
  GenerationUnavailable,
  #[error("AI generation failed: {0}")]
  Generation(String),
  #[error("bad request: {0}")]
  BadRequest(String),
}

impl AppError {
  pub fn status(&self) -> StatusCode {
    match self {
      AppError::Library(LibraryError::ExerciseNotFound(_))
      | AppError::Library(LibraryError::FolderNotFound(_))
      | AppError::Library(LibraryError::CategoryNotFound(_))
      | AppError::NoActiveSession
      | AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
      AppError::Library(LibraryError::ReservedFolder)
      | AppError::Library(LibraryError::DuplicateCategory(_))
      | AppError::Library(LibraryError::CategoryInUse { .. })
      | AppError::NoMatchingExercises => StatusCode::CONFLICT,
      AppError::Library(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
      AppError::GenerationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      AppError::Generation(_) => StatusCode::BAD_GATEWAY,
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let body = Json(serde_json::json!({
      "error": self.to_string()
    }));
    (self.status(), body).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_library_errors_to_statuses() {
    assert_eq!(AppError::from(LibraryError::ReservedFolder).status(), StatusCode::CONFLICT);
    assert_eq!(AppError::from(LibraryError::InvalidDifficulty(9)).status(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::from(LibraryError::FolderNotFound("x".into())).status(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::SessionNotFound("s".into()).status(), StatusCode::NOT_FOUND);
  }

  #[test]
  fn import_errors_name_the_item() {
    let err = LibraryError::InvalidImport {
      index: 2,
      reason: Box::new(LibraryError::EmptyField { field: "title" }),
    };
    assert_eq!(err.to_string(), "import rejected: item 2: title must not be empty");
  }
}
