//! Domain models used by the backend: exercises, folders, and the drafts used to create them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved folder that always exists and receives orphaned exercises.
pub const DEFAULT_FOLDER_ID: &str = "default";
/// Folder that receives exercises produced by the AI generator.
pub const AI_FOLDER_ID: &str = "ai-generated";

/// How hard an exercise is. Serialized as the plain number 1, 2 or 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub fn level(self) -> u8 {
    match self {
      Difficulty::Easy => 1,
      Difficulty::Medium => 2,
      Difficulty::Hard => 3,
    }
  }
}

impl TryFrom<u8> for Difficulty {
  type Error = String;

  fn try_from(value: u8) -> Result<Self, Self::Error> {
    match value {
      1 => Ok(Difficulty::Easy),
      2 => Ok(Difficulty::Medium),
      3 => Ok(Difficulty::Hard),
      other => Err(format!("difficulty must be 1, 2 or 3 (got {other})")),
    }
  }
}

impl From<Difficulty> for u8 {
  fn from(d: Difficulty) -> u8 { d.level() }
}

impl Default for Difficulty {
  fn default() -> Self { Difficulty::Easy }
}

fn default_folder_id() -> String { DEFAULT_FOLDER_ID.to_string() }

/// A graded coding prompt with one canonical answer and any number of accepted alternatives.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
  pub expected_code: String,
  #[serde(default)] pub alternative_answers: Vec<String>,
  #[serde(default)] pub hints: Vec<String>,
  pub difficulty: Difficulty,
  #[serde(default)] pub category: String,
  #[serde(default = "default_folder_id")] pub folder_id: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Exercise {
  /// Canonical answer followed by the alternatives.
  pub fn accepted_answers(&self) -> impl Iterator<Item = &str> {
    std::iter::once(self.expected_code.as_str())
      .chain(self.alternative_answers.iter().map(String::as_str))
  }
}

/// Client-supplied exercise fields (create, update, import, AI generation).
/// Difficulty stays a raw number here so validation can report it instead of
/// failing the whole request body.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseDraft {
  #[serde(default)] pub title: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub expected_code: String,
  #[serde(default)] pub alternative_answers: Vec<String>,
  #[serde(default)] pub hints: Vec<String>,
  #[serde(default)] pub difficulty: u8,
  #[serde(default)] pub category: String,
  #[serde(default)] pub folder_id: Option<String>,
}

/// User-defined grouping of exercises.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
  pub id: String,
  pub name: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub color: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Folder {
  pub fn is_reserved(&self) -> bool { self.id == DEFAULT_FOLDER_ID }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDraft {
  #[serde(default)] pub name: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub color: String,
}
