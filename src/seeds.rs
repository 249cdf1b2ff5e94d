//! Seed data: the sample exercises and folders a fresh install starts with.

use chrono::{DateTime, Utc};

use crate::domain::{Difficulty, Exercise, Folder};
use crate::library::{ai_folder, reserved_folder};

pub const BASICS_FOLDER_ID: &str = "basics";
pub const ADVANCED_FOLDER_ID: &str = "advanced";

#[allow(clippy::too_many_arguments)]
fn seed(
  id: &str,
  title: &str,
  description: &str,
  expected: &str,
  alternatives: &[&str],
  hints: &[&str],
  difficulty: Difficulty,
  category: &str,
  folder: &str,
  now: DateTime<Utc>,
) -> Exercise {
  Exercise {
    id: id.into(),
    title: title.into(),
    description: description.into(),
    expected_code: expected.into(),
    alternative_answers: alternatives.iter().map(|s| s.to_string()).collect(),
    hints: hints.iter().map(|s| s.to_string()).collect(),
    difficulty,
    category: category.into(),
    folder_id: folder.into(),
    created_at: now,
    updated_at: now,
  }
}

/// Minimal set of built-in exercises that make the app useful without any
/// configuration or AI generation.
pub fn seed_exercises(now: DateTime<Utc>) -> Vec<Exercise> {
  vec![
    seed(
      "1",
      "Select an element",
      "Click the button element on the page.",
      "await page.locator('button').click();",
      &["page.locator('button').click();", "await page.click('button');"],
      &[
        "Use page.locator() to select the element",
        "Pass \"button\" as the selector",
        "Finish with click()",
      ],
      Difficulty::Easy,
      "Selecting elements",
      BASICS_FOLDER_ID,
      now,
    ),
    seed(
      "2",
      "Select by id",
      "Click the element with id=\"submit-btn\".",
      "await page.locator('#submit-btn').click();",
      &["page.locator('#submit-btn').click();", "await page.click('#submit-btn');"],
      &["Id selectors start with #", "The id is submit-btn", "Pass the selector to locator()"],
      Difficulty::Easy,
      "Selecting elements",
      BASICS_FOLDER_ID,
      now,
    ),
    seed(
      "3",
      "Type text",
      "Type \"Hello World\" into the input element.",
      "await page.locator('input').fill('Hello World');",
      &["page.locator('input').fill('Hello World');", "await page.fill('input', 'Hello World');"],
      &[
        "Use fill() to enter text",
        "Select the input with locator()",
        "Pass the text as a string",
      ],
      Difficulty::Medium,
      "Actions",
      BASICS_FOLDER_ID,
      now,
    ),
    seed(
      "4",
      "Wait for an element",
      "Wait until the .loading element is hidden.",
      "await page.locator('.loading').waitFor({ state: 'hidden' });",
      &[
        "page.locator('.loading').waitFor({ state: 'hidden' });",
        "await page.waitForSelector('.loading', { state: 'hidden' });",
      ],
      &["Use waitFor()", "state: \"hidden\" waits for it to disappear", "Class selectors start with ."],
      Difficulty::Hard,
      "Waiting",
      ADVANCED_FOLDER_ID,
      now,
    ),
    seed(
      "5",
      "Assertion",
      "Check that the h1 element's text is \"Welcome\".",
      "await expect(page.locator('h1')).toHaveText('Welcome');",
      &[
        "expect(page.locator('h1')).toHaveText('Welcome');",
        "await expect(page.locator('h1')).toContainText('Welcome');",
      ],
      &["Use expect() with toHaveText()", "Select the h1 element", "Compare the text content"],
      Difficulty::Medium,
      "Assertions",
      ADVANCED_FOLDER_ID,
      now,
    ),
  ]
}

pub fn seed_folders(now: DateTime<Utc>) -> Vec<Folder> {
  vec![
    reserved_folder(now),
    Folder {
      id: BASICS_FOLDER_ID.into(),
      name: "Basic operations".into(),
      description: "Selecting elements and simple actions".into(),
      color: "blue".into(),
      created_at: now,
      updated_at: now,
    },
    Folder {
      id: ADVANCED_FOLDER_ID.into(),
      name: "Waiting and assertions".into(),
      description: "Synchronisation and checks".into(),
      color: "green".into(),
      created_at: now,
      updated_at: now,
    },
    ai_folder(now),
  ]
}
