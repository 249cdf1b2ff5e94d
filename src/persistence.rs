//! Snapshot persistence: one JSON file per collection in a data directory.
//!
//! The service works on in-memory state and hands a cloned `Snapshot` to
//! `Persistence::save` in a background task; a failed write is logged and the
//! in-memory state stays authoritative.

use std::path::PathBuf;

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::domain::{Exercise, Folder};
use crate::progress::Progress;

const EXERCISES_FILE: &str = "exercises.json";
const FOLDERS_FILE: &str = "folders.json";
const CATEGORIES_FILE: &str = "categories.json";
const PROGRESS_FILE: &str = "progress.json";

#[derive(Error, Debug)]
pub enum PersistError {
  #[error("I/O error on {path}: {source}")]
  Io { path: PathBuf, source: std::io::Error },
  #[error("invalid JSON in {path}: {source}")]
  Json { path: PathBuf, source: serde_json::Error },
}

/// Everything that survives a restart. Sessions never do.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
  pub exercises: Vec<Exercise>,
  pub folders: Vec<Folder>,
  pub categories: Vec<String>,
  pub progress: Progress,
}

/// Which collections a snapshot was found with on load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Loaded {
  pub exercises: bool,
  pub folders: bool,
  pub categories: bool,
  pub progress: bool,
}

#[derive(Clone, Debug)]
pub struct JsonFileStore {
  dir: PathBuf,
}

impl JsonFileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  async fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, PersistError> {
    let path = self.dir.join(name);
    let bytes = match tokio::fs::read(&path).await {
      Ok(b) => b,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(source) => return Err(PersistError::Io { path, source }),
    };
    serde_json::from_slice(&bytes)
      .map(Some)
      .map_err(|source| PersistError::Json { path, source })
  }

  async fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), PersistError> {
    let path = self.dir.join(name);
    let tmp = self.dir.join(format!("{name}.tmp"));
    let bytes = serde_json::to_vec_pretty(value)
      .map_err(|source| PersistError::Json { path: path.clone(), source })?;
    tokio::fs::write(&tmp, &bytes)
      .await
      .map_err(|source| PersistError::Io { path: tmp.clone(), source })?;
    tokio::fs::rename(&tmp, &path)
      .await
      .map_err(|source| PersistError::Io { path, source })
  }

  #[instrument(level = "info", skip(self), fields(dir = %self.dir.display()))]
  pub async fn load(&self) -> Result<(Snapshot, Loaded), PersistError> {
    let exercises: Option<Vec<Exercise>> = self.read(EXERCISES_FILE).await?;
    let folders: Option<Vec<Folder>> = self.read(FOLDERS_FILE).await?;
    let categories: Option<Vec<String>> = self.read(CATEGORIES_FILE).await?;
    let progress: Option<Progress> = self.read(PROGRESS_FILE).await?;

    let loaded = Loaded {
      exercises: exercises.is_some(),
      folders: folders.is_some(),
      categories: categories.is_some(),
      progress: progress.is_some(),
    };
    info!(target: "codedrill", ?loaded, "Snapshot loaded");

    Ok((
      Snapshot {
        exercises: exercises.unwrap_or_default(),
        folders: folders.unwrap_or_default(),
        categories: categories.unwrap_or_default(),
        progress: progress.unwrap_or_else(|| Progress::new(Utc::now())),
      },
      loaded,
    ))
  }

  #[instrument(level = "debug", skip(self, snapshot), fields(dir = %self.dir.display(), exercises = snapshot.exercises.len()))]
  pub async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
    tokio::fs::create_dir_all(&self.dir)
      .await
      .map_err(|source| PersistError::Io { path: self.dir.clone(), source })?;
    self.write(EXERCISES_FILE, &snapshot.exercises).await?;
    self.write(FOLDERS_FILE, &snapshot.folders).await?;
    self.write(CATEGORIES_FILE, &snapshot.categories).await?;
    self.write(PROGRESS_FILE, &snapshot.progress).await?;
    debug!(target: "codedrill", "Snapshot saved");
    Ok(())
  }
}

/// Where snapshots go. `Memory` keeps nothing across restarts.
#[derive(Clone, Debug)]
pub enum Persistence {
  Memory,
  JsonFiles(JsonFileStore),
}

impl Persistence {
  pub async fn load(&self) -> Result<Option<(Snapshot, Loaded)>, PersistError> {
    match self {
      Persistence::Memory => Ok(None),
      Persistence::JsonFiles(store) => store.load().await.map(Some),
    }
  }

  pub async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
    match self {
      Persistence::Memory => Ok(()),
      Persistence::JsonFiles(store) => store.save(snapshot).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seeds::{seed_exercises, seed_folders};

  fn snapshot() -> Snapshot {
    let now = Utc::now();
    Snapshot {
      exercises: seed_exercises(now),
      folders: seed_folders(now),
      categories: vec!["selectors".into()],
      progress: Progress::new(now),
    }
  }

  #[tokio::test]
  async fn missing_directory_loads_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("absent"));
    let (snap, loaded) = store.load().await.unwrap();
    assert_eq!(loaded, Loaded::default());
    assert!(snap.exercises.is_empty());
    assert_eq!(snap.progress.total_solved, 0);
  }

  #[tokio::test]
  async fn save_then_load_restores_every_collection() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    let snap = snapshot();
    store.save(&snap).await.unwrap();

    let (back, loaded) = store.load().await.unwrap();
    assert!(loaded.exercises && loaded.folders && loaded.categories && loaded.progress);
    assert_eq!(back, snap);
    assert!(!dir.path().join("exercises.json.tmp").exists());
  }

  #[tokio::test]
  async fn corrupt_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(PROGRESS_FILE), "{not json").unwrap();
    let err = JsonFileStore::new(dir.path()).load().await.unwrap_err();
    assert!(matches!(err, PersistError::Json { .. }));
  }

  #[tokio::test]
  async fn memory_persistence_is_a_no_op() {
    assert!(Persistence::Memory.load().await.unwrap().is_none());
    Persistence::Memory.save(&snapshot()).await.unwrap();
  }
}
