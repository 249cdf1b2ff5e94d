//! Answer matching: decides whether a submitted snippet is equivalent to one of
//! an exercise's accepted answers.
//!
//! Equivalence is purely textual after normalization:
//!   1) whitespace removal (every whitespace char, not just runs)
//!   2) quote folding (`'` becomes `"`, never the other way round)
//!
//! Both steps are applied identically to the submission and every candidate.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::domain::Exercise;
use crate::util::strip_whitespace;

/// Global grading toggles. Every exercise is graded with the same options at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOptions {
  #[serde(default = "enabled", alias = "normalize_quotes")] pub normalize_quotes: bool,
  #[serde(default = "enabled", alias = "normalize_spaces")] pub normalize_spaces: bool,
}

fn enabled() -> bool { true }

impl Default for MatchOptions {
  fn default() -> Self {
    Self { normalize_quotes: true, normalize_spaces: true }
  }
}

impl MatchOptions {
  pub const STRICT: MatchOptions = MatchOptions { normalize_quotes: false, normalize_spaces: false };
}

/// Apply the enabled transforms in their fixed order.
pub fn normalize<'a>(text: &'a str, options: MatchOptions) -> Cow<'a, str> {
  let mut out = Cow::Borrowed(text);
  if options.normalize_spaces {
    out = Cow::Owned(strip_whitespace(&out));
  }
  if options.normalize_quotes && out.contains('\'') {
    out = Cow::Owned(out.replace('\'', "\""));
  }
  out
}

/// Returns the first accepted answer equivalent to `submission`, if any.
pub fn matching_answer<'e>(submission: &str, exercise: &'e Exercise, options: MatchOptions) -> Option<&'e str> {
  let wanted = normalize(submission, options);
  exercise
    .accepted_answers()
    .find(|candidate| normalize(candidate, options) == wanted)
}

/// True iff the normalized submission equals at least one normalized accepted answer.
pub fn is_correct(submission: &str, exercise: &Exercise, options: MatchOptions) -> bool {
  matching_answer(submission, exercise, options).is_some()
}
