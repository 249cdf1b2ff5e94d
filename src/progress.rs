//! Progress tracking: solved set, level, daily activity, streaks and the
//! activity calendar.
//!
//! Progress only changes in response to answer events coming out of a
//! session, plus the explicit resets.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::session::AnswerEvent;

pub const LOCAL_USER_ID: &str = "user1";
/// Solved exercises needed per level.
pub const SOLVED_PER_LEVEL: u32 = 10;
/// The calendar covers the last 12 weeks.
pub const CALENDAR_DAYS: i64 = 84;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
  pub date: NaiveDate,
  pub problems_solved: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
  #[serde(default = "default_user")] pub user_id: String,
  #[serde(default)] pub solved_problems: BTreeSet<String>,
  #[serde(default)] pub total_solved: u32,
  #[serde(default = "first_level")] pub current_level: u32,
  pub last_activity_date: DateTime<Utc>,
  #[serde(default)] pub daily_activity: Vec<DailyActivity>,
}

fn default_user() -> String { LOCAL_USER_ID.to_string() }
fn first_level() -> u32 { 1 }

/// Character tier shown next to the level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
  Beginner,
  Intermediate,
  Advanced,
  Master,
}

impl Rank {
  pub fn for_level(level: u32) -> Self {
    match level {
      0..=10 => Rank::Beginner,
      11..=25 => Rank::Intermediate,
      26..=50 => Rank::Advanced,
      _ => Rank::Master,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditOutcome {
  pub newly_solved: bool,
  pub level_up: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
  pub date: NaiveDate,
  pub count: u32,
  /// 0 (no activity) to 4.
  pub intensity: u8,
}

pub fn level_for(total_solved: u32) -> u32 {
  total_solved / SOLVED_PER_LEVEL + 1
}

impl Progress {
  pub fn new(now: DateTime<Utc>) -> Self {
    Self {
      user_id: default_user(),
      solved_problems: BTreeSet::new(),
      total_solved: 0,
      current_level: 1,
      last_activity_date: now,
      daily_activity: Vec::new(),
    }
  }

  pub fn rank(&self) -> Rank { Rank::for_level(self.current_level) }

  pub fn is_solved(&self, exercise_id: &str) -> bool {
    self.solved_problems.contains(exercise_id)
  }

  /// Apply one correct answer. Uncredited answers only touch the activity timestamp.
  pub fn record(&mut self, event: &AnswerEvent, now: DateTime<Utc>) -> CreditOutcome {
    self.last_activity_date = now;
    if !event.credited {
      return CreditOutcome::default();
    }

    self.bump_day(now.date_naive());

    if !self.solved_problems.insert(event.exercise_id.clone()) {
      return CreditOutcome::default();
    }
    let before = self.current_level;
    self.total_solved += 1;
    self.current_level = level_for(self.total_solved);
    CreditOutcome { newly_solved: true, level_up: self.current_level > before }
  }

  fn bump_day(&mut self, day: NaiveDate) {
    match self.daily_activity.iter_mut().find(|a| a.date == day) {
      Some(entry) => entry.problems_solved += 1,
      None => self.daily_activity.push(DailyActivity { date: day, problems_solved: 1 }),
    }
  }

  fn count_on(&self, day: NaiveDate) -> u32 {
    self
      .daily_activity
      .iter()
      .filter(|a| a.date == day)
      .map(|a| a.problems_solved)
      .sum()
  }

  /// Days with at least one solved exercise.
  pub fn active_days(&self) -> usize {
    self.daily_activity.iter().filter(|a| a.problems_solved > 0).count()
  }

  /// Consecutive active days ending today. A streak that ended yesterday is
  /// still alive until today is over.
  pub fn current_streak(&self, today: NaiveDate) -> u32 {
    let mut day = if self.count_on(today) > 0 { today } else { today - Duration::days(1) };
    let mut streak = 0;
    while self.count_on(day) > 0 {
      streak += 1;
      day -= Duration::days(1);
    }
    streak
  }

  /// Oldest-first calendar of the last `CALENDAR_DAYS` days ending `today`.
  pub fn calendar(&self, today: NaiveDate) -> Vec<CalendarDay> {
    (0..CALENDAR_DAYS)
      .rev()
      .map(|back| {
        let date = today - Duration::days(back);
        let count = self.count_on(date);
        CalendarDay { date, count, intensity: intensity(count) }
      })
      .collect()
  }

  /// Forget solved exercises and level; the activity calendar is kept.
  pub fn reset_solved(&mut self) {
    self.solved_problems.clear();
    self.total_solved = 0;
    self.current_level = 1;
  }

  pub fn reset_all(&mut self, now: DateTime<Utc>) {
    *self = Progress { user_id: std::mem::take(&mut self.user_id), ..Progress::new(now) };
  }

  /// Drop ids that no longer name an exercise, keeping counters consistent.
  pub fn retain_solved<F: Fn(&str) -> bool>(&mut self, exists: F) {
    self.solved_problems.retain(|id| exists(id));
    self.total_solved = self.solved_problems.len() as u32;
    self.current_level = level_for(self.total_solved);
  }
}

fn intensity(count: u32) -> u8 {
  if count == 0 { 0 } else { count.div_ceil(2).min(4) as u8 }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use pretty_assertions::assert_eq;

  fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
  }

  fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn credited(id: &str) -> AnswerEvent {
    AnswerEvent { exercise_id: id.into(), credited: true }
  }

  #[test]
  fn solving_twice_counts_once() {
    let mut p = Progress::new(at(2024, 5, 1));
    assert!(p.record(&credited("a"), at(2024, 5, 1)).newly_solved);
    assert!(!p.record(&credited("a"), at(2024, 5, 2)).newly_solved);
    assert_eq!(p.total_solved, 1);
    assert_eq!(p.solved_problems.len(), 1);
    assert_eq!(p.last_activity_date, at(2024, 5, 2));
  }

  #[test]
  fn revealed_answers_earn_no_credit() {
    let mut p = Progress::new(at(2024, 5, 1));
    let out = p.record(&AnswerEvent { exercise_id: "a".into(), credited: false }, at(2024, 5, 3));
    assert_eq!(out, CreditOutcome::default());
    assert_eq!(p.total_solved, 0);
    assert!(p.daily_activity.is_empty());
    assert_eq!(p.last_activity_date, at(2024, 5, 3));
  }

  #[test]
  fn level_is_derived_from_total() {
    assert_eq!(level_for(0), 1);
    assert_eq!(level_for(9), 1);
    assert_eq!(level_for(10), 2);
    assert_eq!(level_for(25), 3);

    let mut p = Progress::new(at(2024, 5, 1));
    let mut ups = 0;
    for i in 0..10 {
      if p.record(&credited(&i.to_string()), at(2024, 5, 1)).level_up {
        ups += 1;
      }
    }
    assert_eq!(ups, 1);
    assert_eq!(p.current_level, 2);
  }

  #[test]
  fn ranks_follow_level_bands() {
    assert_eq!(Rank::for_level(1), Rank::Beginner);
    assert_eq!(Rank::for_level(10), Rank::Beginner);
    assert_eq!(Rank::for_level(11), Rank::Intermediate);
    assert_eq!(Rank::for_level(50), Rank::Advanced);
    assert_eq!(Rank::for_level(51), Rank::Master);
  }

  #[test]
  fn activity_is_one_entry_per_day() {
    let mut p = Progress::new(at(2024, 5, 1));
    p.record(&credited("a"), at(2024, 5, 1));
    p.record(&credited("b"), at(2024, 5, 1));
    p.record(&credited("a"), at(2024, 5, 2));
    assert_eq!(
      p.daily_activity,
      vec![
        DailyActivity { date: day(2024, 5, 1), problems_solved: 2 },
        DailyActivity { date: day(2024, 5, 2), problems_solved: 1 },
      ]
    );
    assert_eq!(p.active_days(), 2);
  }

  #[test]
  fn streak_counts_back_from_today_or_yesterday() {
    let mut p = Progress::new(at(2024, 5, 1));
    for d in [1, 2, 3, 5, 6] {
      p.record(&credited(&format!("x{d}")), at(2024, 5, d));
    }
    assert_eq!(p.current_streak(day(2024, 5, 6)), 2);
    assert_eq!(p.current_streak(day(2024, 5, 7)), 2);
    assert_eq!(p.current_streak(day(2024, 5, 8)), 0);
    assert_eq!(p.current_streak(day(2024, 5, 3)), 3);
  }

  #[test]
  fn calendar_spans_twelve_weeks_with_intensity() {
    let mut p = Progress::new(at(2024, 5, 1));
    for i in 0..5 {
      p.record(&credited(&format!("a{i}")), at(2024, 5, 10));
    }
    p.record(&credited("b"), at(2024, 5, 9));
    for i in 0..12 {
      p.record(&credited(&format!("c{i}")), at(2024, 5, 8));
    }

    let cal = p.calendar(day(2024, 5, 10));
    assert_eq!(cal.len(), 84);
    assert_eq!(cal.first().unwrap().date, day(2024, 2, 17));
    let last = cal.last().unwrap();
    assert_eq!((last.date, last.count, last.intensity), (day(2024, 5, 10), 5, 3));
    assert_eq!(cal[82].intensity, 1);
    assert_eq!(cal[81].intensity, 4);
    assert_eq!(cal[80].intensity, 0);
  }

  #[test]
  fn reset_solved_keeps_calendar() {
    let mut p = Progress::new(at(2024, 5, 1));
    p.record(&credited("a"), at(2024, 5, 1));
    p.reset_solved();
    assert_eq!(p.total_solved, 0);
    assert_eq!(p.current_level, 1);
    assert_eq!(p.active_days(), 1);

    p.reset_all(at(2024, 6, 1));
    assert_eq!(p.active_days(), 0);
    assert_eq!(p.user_id, LOCAL_USER_ID);
  }

  #[test]
  fn retain_solved_recounts() {
    let mut p = Progress::new(at(2024, 5, 1));
    for id in ["a", "b", "c"] {
      p.record(&credited(id), at(2024, 5, 1));
    }
    p.retain_solved(|id| id != "b");
    assert_eq!(p.total_solved, 2);
    assert!(!p.is_solved("b"));
  }

  #[test]
  fn serializes_with_camel_case_and_iso_dates() {
    let mut p = Progress::new(at(2024, 5, 1));
    p.record(&credited("a"), at(2024, 5, 1));
    let json = serde_json::to_value(&p).unwrap();
    assert_eq!(json["solvedProblems"], serde_json::json!(["a"]));
    assert_eq!(json["dailyActivity"][0]["date"], "2024-05-01");
    let back: Progress = serde_json::from_value(json).unwrap();
    assert_eq!(back, p);
  }
}
