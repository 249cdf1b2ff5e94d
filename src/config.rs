//! Loading application configuration (grading, session, storage, prompts and an
//! optional exercise bank) from TOML.
//!
//! See `AppConfig` for the expected schema. Every section is optional.
//! Keys are snake_case; `[grading]` also accepts the camelCase names used by
//! the settings API (`normalizeQuotes`).

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::ExerciseDraft;
use crate::matcher::MatchOptions;
use crate::selector::DEFAULT_SESSION_SIZE;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub grading: MatchOptions,
  #[serde(default)]
  pub session: SessionSettings,
  #[serde(default)]
  pub storage: StorageSettings,
  #[serde(default)]
  pub prompts: Prompts,
  /// Extra exercises added on first start (when the library is empty).
  #[serde(default)]
  pub exercises: Vec<ExerciseDraft>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionSettings {
  #[serde(default = "default_size")] pub size: usize,
  /// Delay between a correct answer and moving on to the next exercise.
  #[serde(default = "default_advance_delay_ms")] pub advance_delay_ms: u64,
}

fn default_size() -> usize { DEFAULT_SESSION_SIZE }
fn default_advance_delay_ms() -> u64 { 2000 }

impl Default for SessionSettings {
  fn default() -> Self {
    Self { size: default_size(), advance_delay_ms: default_advance_delay_ms() }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct StorageSettings {
  /// Directory holding the JSON snapshot. Unset = in-memory only.
  #[serde(default)] pub data_dir: Option<PathBuf>,
}

/// Prompts used by the OpenAI client.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generator_system: String,
  /// Appended to the system prompt; `{categories}` and `{folders}` are filled in.
  pub generator_context_template: String,
  pub generator_temperature: f32,
  pub generator_max_tokens: u32,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generator_system: "You are a tutor that writes short Playwright coding exercises.\n\
        If the learner's request is vague, ask one clarifying question (which operations, which level).\n\
        Once the request is clear, call the createProblem tool. Each exercise must have a one-line \
        expectedCode that really works, 2-4 alternativeAnswers written differently but equivalent, \
        about three hints that get progressively more specific, a difficulty of 1 (beginner), \
        2 (intermediate) or 3 (advanced), and a category. After creating an exercise, suggest a \
        related follow-up."
        .into(),
      generator_context_template: "Existing categories: {categories}\nExisting folders: {folders}".into(),
      generator_temperature: 0.7,
      generator_max_tokens: 2000,
    }
  }
}

pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Load `AppConfig` from CODEDRILL_CONFIG_PATH, then apply CODEDRILL_DATA_DIR.
/// On any parsing/IO error the defaults are used.
pub fn load_config_from_env() -> AppConfig {
  let mut cfg = match std::env::var("CODEDRILL_CONFIG_PATH") {
    Ok(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match parse_config(&s) {
        Ok(cfg) => {
          info!(target: "codedrill", %path, "Loaded config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "codedrill", %path, error = %e, "Failed to parse TOML config; using defaults");
          AppConfig::default()
        }
      },
      Err(e) => {
        error!(target: "codedrill", %path, error = %e, "Failed to read TOML config file; using defaults");
        AppConfig::default()
      }
    },
    Err(_) => AppConfig::default(),
  };

  if let Ok(dir) = std::env::var("CODEDRILL_DATA_DIR") {
    if !dir.is_empty() {
      cfg.storage.data_dir = Some(PathBuf::from(dir));
    }
  }
  cfg
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = parse_config("").unwrap();
    assert_eq!(cfg.grading, MatchOptions::default());
    assert_eq!(cfg.session.size, 5);
    assert_eq!(cfg.session.advance_delay_ms, 2000);
    assert!(cfg.storage.data_dir.is_none());
    assert!(cfg.exercises.is_empty());
  }

  #[test]
  fn sections_override_defaults() {
    let cfg = parse_config(
      r#"
        [grading]
        normalizeQuotes = false

        [session]
        size = 3

        [storage]
        data_dir = "/tmp/drill"

        [prompts]
        generator_temperature = 0.2

        [[exercises]]
        title = "Reload"
        expectedCode = "await page.reload();"
        difficulty = 1
        category = "Navigation"
      "#,
    )
    .unwrap();
    assert!(!cfg.grading.normalize_quotes);
    assert!(cfg.grading.normalize_spaces);
    assert_eq!(cfg.session.size, 3);
    assert_eq!(cfg.session.advance_delay_ms, 2000);
    assert_eq!(cfg.storage.data_dir, Some(PathBuf::from("/tmp/drill")));
    assert_eq!(cfg.prompts.generator_temperature, 0.2);
    assert_eq!(cfg.prompts.generator_max_tokens, 2000);
    assert_eq!(cfg.exercises[0].expected_code, "await page.reload();");
  }

  #[test]
  fn grading_accepts_snake_case_keys() {
    let cfg = parse_config("[grading]\nnormalize_spaces = false").unwrap();
    assert!(cfg.grading.normalize_quotes);
    assert!(!cfg.grading.normalize_spaces);
  }

  #[test]
  fn malformed_config_is_an_error() {
    assert!(parse_config("[session]\nsize = \"five\"").is_err());
  }
}
