//! Exercise library: exercises, folders and the category registry.
//!
//! Invariants kept here:
//!   - the reserved `default` folder always exists and is never deleted
//!   - deleting a folder moves its exercises to `default`
//!   - a category still referenced by an exercise cannot be deleted
//!   - every stored exercise has a non-empty expected answer and a valid difficulty

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Difficulty, Exercise, ExerciseDraft, Folder, FolderDraft, AI_FOLDER_ID, DEFAULT_FOLDER_ID};
use crate::error::LibraryError;

#[derive(Clone, Debug, Default)]
pub struct Library {
  exercises: Vec<Exercise>,
  folders: Vec<Folder>,
  categories: Vec<String>,
}

/// Draft fields after validation.
struct ValidDraft {
  title: String,
  description: String,
  expected_code: String,
  alternative_answers: Vec<String>,
  hints: Vec<String>,
  difficulty: Difficulty,
  category: String,
  folder_id: String,
}

fn non_empty(value: &str, field: &'static str) -> Result<String, LibraryError> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    Err(LibraryError::EmptyField { field })
  } else {
    Ok(trimmed.to_string())
  }
}

pub fn reserved_folder(now: DateTime<Utc>) -> Folder {
  Folder {
    id: DEFAULT_FOLDER_ID.into(),
    name: "Uncategorized".into(),
    description: "Exercises without a folder".into(),
    color: "gray".into(),
    created_at: now,
    updated_at: now,
  }
}

pub fn ai_folder(now: DateTime<Utc>) -> Folder {
  Folder {
    id: AI_FOLDER_ID.into(),
    name: "AI generated".into(),
    description: "Exercises created by the AI assistant".into(),
    color: "purple".into(),
    created_at: now,
    updated_at: now,
  }
}

impl Library {
  /// Build from persisted parts, restoring the reserved folder and the
  /// category registry entries of stored exercises.
  pub fn from_parts(exercises: Vec<Exercise>, folders: Vec<Folder>, categories: Vec<String>, now: DateTime<Utc>) -> Self {
    let mut lib = Library { exercises: Vec::new(), folders, categories: Vec::new() };
    if !lib.folders.iter().any(Folder::is_reserved) {
      lib.folders.insert(0, reserved_folder(now));
    }
    for c in categories {
      lib.register_category(&c);
    }
    for mut ex in exercises {
      if !lib.has_folder(&ex.folder_id) {
        ex.folder_id = DEFAULT_FOLDER_ID.into();
      }
      lib.register_category(&ex.category);
      lib.exercises.push(ex);
    }
    lib
  }

  pub fn exercises(&self) -> &[Exercise] { &self.exercises }
  pub fn folders(&self) -> &[Folder] { &self.folders }
  pub fn categories(&self) -> &[String] { &self.categories }

  pub fn exercise(&self, id: &str) -> Option<&Exercise> {
    self.exercises.iter().find(|e| e.id == id)
  }

  pub fn folder(&self, id: &str) -> Option<&Folder> {
    self.folders.iter().find(|f| f.id == id)
  }

  pub fn has_folder(&self, id: &str) -> bool { self.folder(id).is_some() }

  fn validate(&self, draft: &ExerciseDraft) -> Result<ValidDraft, LibraryError> {
    let difficulty = Difficulty::try_from(draft.difficulty)
      .map_err(|_| LibraryError::InvalidDifficulty(draft.difficulty))?;
    let folder_id = match draft.folder_id.as_deref().map(str::trim) {
      None | Some("") => DEFAULT_FOLDER_ID.to_string(),
      Some(id) if self.has_folder(id) => id.to_string(),
      Some(id) => return Err(LibraryError::FolderNotFound(id.to_string())),
    };
    Ok(ValidDraft {
      title: non_empty(&draft.title, "title")?,
      description: draft.description.trim().to_string(),
      expected_code: non_empty(&draft.expected_code, "expectedCode")?,
      alternative_answers: draft
        .alternative_answers
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect(),
      hints: draft
        .hints
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect(),
      difficulty,
      category: non_empty(&draft.category, "category")?,
      folder_id,
    })
  }

  fn build(v: ValidDraft, id: String, now: DateTime<Utc>) -> Exercise {
    Exercise {
      id,
      title: v.title,
      description: v.description,
      expected_code: v.expected_code,
      alternative_answers: v.alternative_answers,
      hints: v.hints,
      difficulty: v.difficulty,
      category: v.category,
      folder_id: v.folder_id,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn add_exercise(&mut self, draft: &ExerciseDraft, now: DateTime<Utc>) -> Result<&Exercise, LibraryError> {
    let valid = self.validate(draft)?;
    let ex = Self::build(valid, Uuid::new_v4().to_string(), now);
    self.register_category(&ex.category);
    info!(target: "library", id = %ex.id, folder = %ex.folder_id, category = %ex.category, "Exercise added");
    self.exercises.push(ex);
    Ok(&self.exercises[self.exercises.len() - 1])
  }

  pub fn update_exercise(&mut self, id: &str, draft: &ExerciseDraft, now: DateTime<Utc>) -> Result<&Exercise, LibraryError> {
    let valid = self.validate(draft)?;
    let idx = self
      .exercises
      .iter()
      .position(|e| e.id == id)
      .ok_or_else(|| LibraryError::ExerciseNotFound(id.to_string()))?;
    self.register_category(&valid.category);
    let created_at = self.exercises[idx].created_at;
    let mut updated = Self::build(valid, id.to_string(), now);
    updated.created_at = created_at;
    self.exercises[idx] = updated;
    Ok(&self.exercises[idx])
  }

  pub fn delete_exercise(&mut self, id: &str) -> Result<Exercise, LibraryError> {
    let idx = self
      .exercises
      .iter()
      .position(|e| e.id == id)
      .ok_or_else(|| LibraryError::ExerciseNotFound(id.to_string()))?;
    info!(target: "library", %id, "Exercise deleted");
    Ok(self.exercises.remove(idx))
  }

  /// All-or-nothing import. Imported items also need a description. Every
  /// item gets a fresh id and timestamps.
  pub fn import_exercises(&mut self, drafts: &[ExerciseDraft], now: DateTime<Utc>) -> Result<Vec<String>, LibraryError> {
    let valid = drafts
      .iter()
      .enumerate()
      .map(|(index, d)| {
        self
          .validate(d)
          .and_then(|v| {
            if v.description.is_empty() {
              Err(LibraryError::EmptyField { field: "description" })
            } else {
              Ok(v)
            }
          })
          .map_err(|e| LibraryError::InvalidImport { index, reason: Box::new(e) })
      })
      .collect::<Result<Vec<_>, _>>()?;

    let mut ids = Vec::with_capacity(valid.len());
    for v in valid {
      let ex = Self::build(v, Uuid::new_v4().to_string(), now);
      self.register_category(&ex.category);
      ids.push(ex.id.clone());
      self.exercises.push(ex);
    }
    info!(target: "library", count = ids.len(), "Exercises imported");
    Ok(ids)
  }

  pub fn export_exercises(&self) -> Vec<Exercise> { self.exercises.clone() }

  pub fn add_folder(&mut self, draft: &FolderDraft, now: DateTime<Utc>) -> Result<&Folder, LibraryError> {
    let folder = Folder {
      id: Uuid::new_v4().to_string(),
      name: non_empty(&draft.name, "name")?,
      description: draft.description.trim().to_string(),
      color: draft.color.trim().to_string(),
      created_at: now,
      updated_at: now,
    };
    self.folders.push(folder);
    Ok(&self.folders[self.folders.len() - 1])
  }

  /// Re-create a well-known folder (e.g. `ai-generated`) if it was deleted.
  pub fn ensure_folder(&mut self, folder: Folder) -> &Folder {
    let idx = match self.folders.iter().position(|f| f.id == folder.id) {
      Some(i) => i,
      None => {
        debug!(target: "library", id = %folder.id, "Re-creating folder");
        self.folders.push(folder);
        self.folders.len() - 1
      }
    };
    &self.folders[idx]
  }

  pub fn update_folder(&mut self, id: &str, draft: &FolderDraft, now: DateTime<Utc>) -> Result<&Folder, LibraryError> {
    let name = non_empty(&draft.name, "name")?;
    let folder = self
      .folders
      .iter_mut()
      .find(|f| f.id == id)
      .ok_or_else(|| LibraryError::FolderNotFound(id.to_string()))?;
    folder.name = name;
    folder.description = draft.description.trim().to_string();
    folder.color = draft.color.trim().to_string();
    folder.updated_at = now;
    Ok(folder)
  }

  /// Delete a folder and move its exercises to the reserved folder.
  /// Returns how many exercises were reassigned.
  pub fn delete_folder(&mut self, id: &str, now: DateTime<Utc>) -> Result<usize, LibraryError> {
    if id == DEFAULT_FOLDER_ID {
      return Err(LibraryError::ReservedFolder);
    }
    let idx = self
      .folders
      .iter()
      .position(|f| f.id == id)
      .ok_or_else(|| LibraryError::FolderNotFound(id.to_string()))?;
    self.folders.remove(idx);

    let mut moved = 0;
    for ex in self.exercises.iter_mut().filter(|e| e.folder_id == id) {
      ex.folder_id = DEFAULT_FOLDER_ID.into();
      ex.updated_at = now;
      moved += 1;
    }
    info!(target: "library", %id, moved, "Folder deleted");
    Ok(moved)
  }

  fn register_category(&mut self, name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() || self.categories.iter().any(|c| c == name) {
      return false;
    }
    self.categories.push(name.to_string());
    true
  }

  pub fn add_category(&mut self, name: &str) -> Result<&str, LibraryError> {
    let name = non_empty(name, "category")?;
    if !self.register_category(&name) {
      return Err(LibraryError::DuplicateCategory(name));
    }
    Ok(&self.categories[self.categories.len() - 1])
  }

  pub fn delete_category(&mut self, name: &str) -> Result<(), LibraryError> {
    let idx = self
      .categories
      .iter()
      .position(|c| c == name)
      .ok_or_else(|| LibraryError::CategoryNotFound(name.to_string()))?;
    let count = self.exercises.iter().filter(|e| e.category == name).count();
    if count > 0 {
      return Err(LibraryError::CategoryInUse { name: name.to_string(), count });
    }
    self.categories.remove(idx);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn draft(title: &str, category: &str, folder: Option<&str>) -> ExerciseDraft {
    ExerciseDraft {
      title: title.into(),
      description: "do the thing".into(),
      expected_code: "await page.click('a')".into(),
      alternative_answers: vec!["page.click('a')".into(), "  ".into()],
      hints: vec!["click".into()],
      difficulty: 2,
      category: category.into(),
      folder_id: folder.map(str::to_string),
    }
  }

  fn lib() -> Library {
    Library::from_parts(vec![], vec![], vec![], Utc::now())
  }

  #[test]
  fn reserved_folder_always_exists() {
    let l = lib();
    assert!(l.has_folder(DEFAULT_FOLDER_ID));
  }

  #[test]
  fn add_defaults_folder_and_registers_category() {
    let mut l = lib();
    let ex = l.add_exercise(&draft("t", " waits ", None), Utc::now()).unwrap().clone();
    assert_eq!(ex.folder_id, DEFAULT_FOLDER_ID);
    assert_eq!(ex.category, "waits");
    assert_eq!(ex.alternative_answers, vec!["page.click('a')".to_string()]);
    assert_eq!(l.categories(), ["waits".to_string()]);
  }

  #[test]
  fn add_rejects_invalid_drafts() {
    let mut l = lib();
    let mut d = draft("t", "c", None);
    d.expected_code = "   ".into();
    assert_eq!(l.add_exercise(&d, Utc::now()).unwrap_err(), LibraryError::EmptyField { field: "expectedCode" });

    let mut d = draft("t", "c", None);
    d.difficulty = 4;
    assert_eq!(l.add_exercise(&d, Utc::now()).unwrap_err(), LibraryError::InvalidDifficulty(4));

    let d = draft("t", "c", Some("nope"));
    assert_eq!(l.add_exercise(&d, Utc::now()).unwrap_err(), LibraryError::FolderNotFound("nope".into()));
    assert!(l.exercises().is_empty());
  }

  #[test]
  fn update_keeps_id_and_creation_time() {
    let mut l = lib();
    let created = l.add_exercise(&draft("old", "c", None), Utc::now()).unwrap().clone();
    let updated = l.update_exercise(&created.id, &draft("new", "c2", None), Utc::now()).unwrap().clone();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.title, "new");
    assert_eq!(l.exercises().len(), 1);
    assert!(l.categories().contains(&"c2".to_string()));
  }

  #[test]
  fn deleting_folder_reassigns_exercises() {
    let mut l = lib();
    let folder_id = l
      .add_folder(&FolderDraft { name: "Basics".into(), ..Default::default() }, Utc::now())
      .unwrap()
      .id
      .clone();
    let id = l.add_exercise(&draft("t", "c", Some(&folder_id)), Utc::now()).unwrap().id.clone();

    assert_eq!(l.delete_folder(&folder_id, Utc::now()), Ok(1));
    assert_eq!(l.exercise(&id).unwrap().folder_id, DEFAULT_FOLDER_ID);
    assert_eq!(l.exercises().len(), 1);
    assert!(!l.has_folder(&folder_id));
  }

  #[test]
  fn reserved_folder_cannot_be_deleted() {
    let mut l = lib();
    assert_eq!(l.delete_folder(DEFAULT_FOLDER_ID, Utc::now()), Err(LibraryError::ReservedFolder));
    assert!(l.has_folder(DEFAULT_FOLDER_ID));
  }

  #[test]
  fn category_registry_enforces_membership_and_usage() {
    let mut l = lib();
    assert_eq!(l.add_category("forms"), Ok("forms"));
    assert_eq!(l.add_category(" forms "), Err(LibraryError::DuplicateCategory("forms".into())));
    assert_eq!(l.add_category(""), Err(LibraryError::EmptyField { field: "category" }));

    let id = l.add_exercise(&draft("t", "forms", None), Utc::now()).unwrap().id.clone();
    assert_eq!(
      l.delete_category("forms"),
      Err(LibraryError::CategoryInUse { name: "forms".into(), count: 1 })
    );
    l.delete_exercise(&id).unwrap();
    assert_eq!(l.delete_category("forms"), Ok(()));
    assert_eq!(l.delete_category("forms"), Err(LibraryError::CategoryNotFound("forms".into())));
  }

  #[test]
  fn import_is_all_or_nothing() {
    let mut l = lib();
    let mut bad = draft("bad", "c", None);
    bad.category = String::new();
    let err = l.import_exercises(&[draft("ok", "c", None), bad], Utc::now()).unwrap_err();
    assert_eq!(
      err,
      LibraryError::InvalidImport { index: 1, reason: Box::new(LibraryError::EmptyField { field: "category" }) }
    );
    assert!(l.exercises().is_empty());

    let mut undescribed = draft("bare", "c", None);
    undescribed.description = " ".into();
    let err = l.import_exercises(&[undescribed], Utc::now()).unwrap_err();
    assert_eq!(
      err,
      LibraryError::InvalidImport { index: 0, reason: Box::new(LibraryError::EmptyField { field: "description" }) }
    );

    let ids = l.import_exercises(&[draft("a", "c", None), draft("b", "c", None)], Utc::now()).unwrap();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(l.export_exercises().len(), 2);
  }

  #[test]
  fn from_parts_repairs_dangling_folders() {
    let mut source = lib();
    let f = source.add_folder(&FolderDraft { name: "gone".into(), ..Default::default() }, Utc::now()).unwrap().id.clone();
    source.add_exercise(&draft("t", "waits", Some(&f)), Utc::now()).unwrap();

    let l = Library::from_parts(source.export_exercises(), vec![], vec![], Utc::now());
    assert_eq!(l.exercises()[0].folder_id, DEFAULT_FOLDER_ID);
    assert_eq!(l.categories(), ["waits".to_string()]);
  }

  #[test]
  fn ensure_folder_is_idempotent() {
    let mut l = lib();
    l.ensure_folder(ai_folder(Utc::now()));
    l.ensure_folder(ai_folder(Utc::now()));
    assert_eq!(l.folders().iter().filter(|f| f.id == AI_FOLDER_ID).count(), 1);
  }
}
