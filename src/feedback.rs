//! Splits evaluation feedback into its rubric sections.
//!
//! The evaluation prompt asks for `**Correctness**`, `**Optimality**` and
//! `**Time and Space Complexity**` headings. Lines under a known heading are joined
//! with spaces; any other bold heading closes the current section.

use std::fmt;

pub const CORRECTNESS: &str = "Correctness";
pub const OPTIMALITY: &str = "Optimality";
pub const COMPLEXITY: &str = "Time and Space Complexity";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Feedback {
  pub correctness: String,
  pub optimality: String,
  pub complexity: String,
}

impl Feedback {
  pub fn is_empty(&self) -> bool {
    self.correctness.is_empty() && self.optimality.is_empty() && self.complexity.is_empty()
  }
}

#[derive(Clone, Copy)]
enum Section { Correctness, Optimality, Complexity }

pub fn parse_feedback(text: &str) -> Feedback {
  let mut fb = Feedback::default();
  let mut current: Option<Section> = None;

  for raw in text.lines() {
    let line = raw.trim();
    // Models often render headings as list items ("- **Correctness**").
    let heading = line.trim_start_matches(|c: char| c == '-' || c == '#' || c.is_whitespace());
    if heading.starts_with("**") {
      current = if heading.starts_with(&format!("**{CORRECTNESS}**")) {
        Some(Section::Correctness)
      } else if heading.starts_with(&format!("**{OPTIMALITY}**")) {
        Some(Section::Optimality)
      } else if heading.starts_with(&format!("**{COMPLEXITY}**")) {
        Some(Section::Complexity)
      } else {
        None
      };
      // Text on the heading line itself ("**Correctness**: Correct solution.") belongs to it.
      if let Some(section) = current {
        let rest = heading
          .splitn(3, "**")
          .nth(2)
          .unwrap_or("")
          .trim_start_matches(':')
          .trim();
        push_line(&mut fb, section, rest);
      }
      continue;
    }
    if let Some(section) = current {
      push_line(&mut fb, section, line);
    }
  }
  fb
}

fn push_line(fb: &mut Feedback, section: Section, line: &str) {
  if line.is_empty() {
    return;
  }
  let slot = match section {
    Section::Correctness => &mut fb.correctness,
    Section::Optimality => &mut fb.optimality,
    Section::Complexity => &mut fb.complexity,
  };
  if !slot.is_empty() {
    slot.push(' ');
  }
  slot.push_str(line);
}

impl fmt::Display for Feedback {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "**{CORRECTNESS}**\n\n{}\n", self.correctness)?;
    writeln!(f, "**{OPTIMALITY}**\n\n{}\n", self.optimality)?;
    write!(f, "**{COMPLEXITY}**\n\n{}", self.complexity)
  }
}
