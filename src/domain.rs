//! Domain models: difficulty/part-type/style vocabularies, history entries and multi-part progress.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ForgeError;

/// Difficulty ladder. Ordering follows the auto-advance sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Default for Difficulty {
  fn default() -> Self { Difficulty::Easy }
}

impl Difficulty {
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

  pub fn label(self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    }
  }

  /// Subdirectory name under `problems/`.
  pub fn dir_name(self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
    }
  }

  /// Next step on the ladder; `None` at the top.
  pub fn next(self) -> Option<Difficulty> {
    match self {
      Difficulty::Easy => Some(Difficulty::Medium),
      Difficulty::Medium => Some(Difficulty::Hard),
      Difficulty::Hard => None,
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

impl FromStr for Difficulty {
  type Err = ForgeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim();
    Difficulty::ALL
      .into_iter()
      .find(|d| d.label().eq_ignore_ascii_case(wanted))
      .ok_or_else(|| ForgeError::InvalidSelection(format!("difficulty '{wanted}'")))
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartType {
  #[serde(rename = "single-part")]
  SinglePart,
  #[serde(rename = "multi-part")]
  MultiPart,
}

impl PartType {
  pub fn label(self) -> &'static str {
    match self {
      PartType::SinglePart => "single-part",
      PartType::MultiPart => "multi-part",
    }
  }

  /// Short form used inside the generation prompt ("single"/"multi").
  pub fn prompt_word(self) -> &'static str {
    match self {
      PartType::SinglePart => "single",
      PartType::MultiPart => "multi",
    }
  }
}

impl fmt::Display for PartType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

impl FromStr for PartType {
  type Err = ForgeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "single-part" => Ok(PartType::SinglePart),
      "multi-part" => Ok(PartType::MultiPart),
      other => Err(ForgeError::InvalidSelection(format!("problem type '{other}'"))),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Style {
  #[serde(rename = "leetcode")]
  Leetcode,
  #[serde(rename = "real-world")]
  RealWorld,
}

impl Style {
  pub fn label(self) -> &'static str {
    match self {
      Style::Leetcode => "leetcode",
      Style::RealWorld => "real-world",
    }
  }
}

impl fmt::Display for Style {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

impl FromStr for Style {
  type Err = ForgeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "leetcode" => Ok(Style::Leetcode),
      "real-world" => Ok(Style::RealWorld),
      other => Err(ForgeError::InvalidSelection(format!("style '{other}'"))),
    }
  }
}

/// One generated problem, as stored in `problem_history.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemEntry {
  pub problem: String,
  pub difficulty: Difficulty,
  pub part_type: PartType,
  pub style: Style,
  /// `yyyyMMdd_HHmmss`, local time.
  pub timestamp: String,
  pub filename: String,
}

/// The in-flight multi-part problem (`multipart_progress.json`).
/// Keys missing from an older or hand-edited file fall back to the defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Progress {
  #[serde(default = "first_part")]
  pub current_part: u32,
  #[serde(default = "default_part_type")]
  pub part_type: PartType,
  #[serde(default = "default_style")]
  pub style: Style,
  #[serde(default)]
  pub difficulty: Difficulty,
  #[serde(default)]
  pub problem_history: Vec<ProblemEntry>,
}

fn first_part() -> u32 { 1 }
fn default_part_type() -> PartType { PartType::MultiPart }
fn default_style() -> Style { Style::Leetcode }

impl Progress {
  /// Fresh record seeded with the first part.
  pub fn start(first: ProblemEntry) -> Self {
    Self {
      current_part: 1,
      part_type: first.part_type,
      style: first.style,
      difficulty: first.difficulty,
      problem_history: vec![first],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn vocabularies_parse_case_insensitively() {
    assert_eq!("  medium ".parse::<Difficulty>().unwrap(), Difficulty::Medium);
    assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
    assert_eq!("Multi-Part".parse::<PartType>().unwrap(), PartType::MultiPart);
    assert_eq!("real-world".parse::<Style>().unwrap(), Style::RealWorld);
    assert!("extreme".parse::<Difficulty>().is_err());
    assert!("single".parse::<PartType>().is_err());
    assert!("realworld".parse::<Style>().is_err());
  }

  #[test]
  fn difficulty_ladder_never_goes_down() {
    assert_eq!(Difficulty::Easy.next(), Some(Difficulty::Medium));
    assert_eq!(Difficulty::Medium.next(), Some(Difficulty::Hard));
    assert_eq!(Difficulty::Hard.next(), None);
    assert!(Difficulty::Easy < Difficulty::Hard);
  }

  #[test]
  fn entry_uses_original_json_keys() {
    let entry = ProblemEntry {
      problem: "# Two Sum".into(),
      difficulty: Difficulty::Easy,
      part_type: PartType::SinglePart,
      style: Style::RealWorld,
      timestamp: "20241029_101500".into(),
      filename: "two-sum_20241029_101500.md".into(),
    };
    let v = serde_json::to_value(&entry).unwrap();
    assert_eq!(v["difficulty"], "Easy");
    assert_eq!(v["part_type"], "single-part");
    assert_eq!(v["style"], "real-world");
    assert_eq!(v["problem"], "# Two Sum");
  }

  #[test]
  fn progress_missing_keys_take_defaults() {
    let p: Progress = serde_json::from_str(r#"{"style": "real-world"}"#).unwrap();
    assert_eq!(p.current_part, 1);
    assert_eq!(p.part_type, PartType::MultiPart);
    assert_eq!(p.style, Style::RealWorld);
    assert_eq!(p.difficulty, Difficulty::Easy);
    assert!(p.problem_history.is_empty());
  }
}
