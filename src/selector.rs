//! Session selection: filter → order → truncate.
//!
//! Each stage is a separate step so ordering strategies never see exercises
//! that the filter rejected, and a strategy can be swapped without touching
//! filtering.

use std::collections::BTreeSet;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::Exercise;

/// Number of exercises served per session unless configured otherwise.
pub const DEFAULT_SESSION_SIZE: usize = 5;

/// Which exercise attribute the filter values are compared against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
  #[default]
  Folder,
  Category,
}

/// Empty `values` means "everything".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
  #[serde(default)] pub mode: FilterMode,
  #[serde(default)] pub values: Vec<String>,
}

impl SessionFilter {
  pub fn all() -> Self { Self::default() }

  pub fn folders<I: IntoIterator<Item = S>, S: Into<String>>(ids: I) -> Self {
    Self { mode: FilterMode::Folder, values: ids.into_iter().map(Into::into).collect() }
  }

  pub fn categories<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
    Self { mode: FilterMode::Category, values: names.into_iter().map(Into::into).collect() }
  }

  pub fn accepts(&self, exercise: &Exercise) -> bool {
    if self.values.is_empty() {
      return true;
    }
    let key = match self.mode {
      FilterMode::Folder => &exercise.folder_id,
      FilterMode::Category => &exercise.category,
    };
    self.values.iter().any(|v| v == key)
  }
}

/// How the filtered exercises are ordered before truncation.
/// Serialized as kebab-case names; unknown names fall back to `PoolOrder`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStrategy {
  Random,
  #[default]
  UnlearnedFirst,
  LearnedFirst,
  EasyFirst,
  HardFirst,
  /// Keep pool order.
  PoolOrder,
}

impl OrderStrategy {
  pub const ALL: [OrderStrategy; 5] = [
    OrderStrategy::Random,
    OrderStrategy::UnlearnedFirst,
    OrderStrategy::LearnedFirst,
    OrderStrategy::EasyFirst,
    OrderStrategy::HardFirst,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStrategy::Random => "random",
      OrderStrategy::UnlearnedFirst => "unlearned-first",
      OrderStrategy::LearnedFirst => "learned-first",
      OrderStrategy::EasyFirst => "easy-first",
      OrderStrategy::HardFirst => "hard-first",
      OrderStrategy::PoolOrder => "pool-order",
    }
  }

  pub fn parse(name: &str) -> Self {
    match name {
      "random" => OrderStrategy::Random,
      "unlearned-first" => OrderStrategy::UnlearnedFirst,
      "learned-first" => OrderStrategy::LearnedFirst,
      "easy-first" => OrderStrategy::EasyFirst,
      "hard-first" => OrderStrategy::HardFirst,
      _ => OrderStrategy::PoolOrder,
    }
  }
}

impl From<String> for OrderStrategy {
  fn from(s: String) -> Self { OrderStrategy::parse(&s) }
}

impl From<OrderStrategy> for String {
  fn from(o: OrderStrategy) -> String { o.as_str().to_string() }
}

impl fmt::Display for OrderStrategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Build the ordered exercise list for one session.
///
/// Returns at most `session_size` exercises; an empty result means nothing
/// matched the filter and the caller should not start a session.
pub fn select_session<R: Rng + ?Sized>(
  pool: &[Exercise],
  solved_ids: &BTreeSet<String>,
  filter: &SessionFilter,
  order: OrderStrategy,
  session_size: usize,
  rng: &mut R,
) -> Vec<Exercise> {
  let mut picked: Vec<&Exercise> = pool.iter().filter(|e| filter.accepts(e)).collect();
  let is_solved = |e: &&Exercise| solved_ids.contains(&e.id);

  match order {
    OrderStrategy::Random => picked.shuffle(rng),
    OrderStrategy::UnlearnedFirst => {
      let (solved, unsolved): (Vec<_>, Vec<_>) = picked.into_iter().partition(is_solved);
      picked = unsolved.into_iter().chain(solved).collect();
    }
    OrderStrategy::LearnedFirst => {
      let (solved, unsolved): (Vec<_>, Vec<_>) = picked.into_iter().partition(is_solved);
      picked = solved.into_iter().chain(unsolved).collect();
    }
    // sort_by_key is stable, ties keep pool order
    OrderStrategy::EasyFirst => picked.sort_by_key(|e| e.difficulty),
    OrderStrategy::HardFirst => picked.sort_by_key(|e| std::cmp::Reverse(e.difficulty)),
    OrderStrategy::PoolOrder => {}
  }

  picked.into_iter().take(session_size).cloned().collect()
}
