//! Title extraction and filename slugs for generated problems.

pub const UNTITLED: &str = "Untitled Problem";

/// Text of the first markdown heading line, without the leading `#`s.
/// Falls back to "Untitled Problem" when the text has no heading.
pub fn extract_problem_title(problem: &str) -> String {
  problem
    .lines()
    .map(str::trim)
    .find(|line| line.starts_with('#'))
    .map(|line| line.trim_matches(|c: char| c == '#' || c.is_whitespace()).to_string())
    .unwrap_or_else(|| UNTITLED.to_string())
}

/// Lowercase, collapse every run of non `[a-z0-9]` into one `-`, trim edge dashes.
pub fn format_title_for_filename(title: &str) -> String {
  let lower = title.to_lowercase();
  let mut out = String::with_capacity(lower.len());
  let mut pending_dash = false;
  for ch in lower.chars() {
    if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
      if pending_dash && !out.is_empty() {
        out.push('-');
      }
      pending_dash = false;
      out.push(ch);
    } else {
      pending_dash = true;
    }
  }
  out
}

/// `<slug>_<timestamp>.md`
pub fn problem_filename(title: &str, timestamp: &str) -> String {
  format!("{}_{}.md", format_title_for_filename(title), timestamp)
}
