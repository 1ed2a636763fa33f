//! Generation prompt: two random topic tags plus the difficulty/style/part labels.
//!
//! The random source is a parameter so callers (and tests) decide how draws are made.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::Prompts;
use crate::domain::{Difficulty, PartType, Style};
use crate::util::fill_template;

pub const DATA_STRUCTURES: &[&str] = &[
  "Sliding Window", "Arrays & Hashing", "Two Pointers", "Sliding Window", "Stack", "Binary Search",
  "Linked List", "Trees", "Heap/Priority Queue", "Tries", "Graphs", "Advanced Graphs",
];

pub const ALGORITHMS: &[&str] = &[
  "Searching", "Greedy", "Dynamic Programming", "Recursion", "Backtracking", "Sorting",
  "Intervals", "Math & Geometry", "Bit Manipulation",
];

/// What a single generation request is about.
#[derive(Clone, Copy, Debug)]
pub struct ProblemRequest {
  pub part_type: PartType,
  pub style: Style,
  pub difficulty: Difficulty,
  pub part_number: u32,
}

/// Topic tags drawn for one prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Topics {
  pub data_structure: &'static str,
  pub algorithm: &'static str,
}

impl Topics {
  pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
    Self {
      data_structure: DATA_STRUCTURES.choose(rng).copied().unwrap_or("Arrays"),
      algorithm: ALGORITHMS.choose(rng).copied().unwrap_or("Sorting"),
    }
  }
}

pub fn build_problem_prompt<R: Rng + ?Sized>(prompts: &Prompts, req: &ProblemRequest, rng: &mut R) -> String {
  render_problem_prompt(prompts, req, Topics::sample(rng))
}

pub fn render_problem_prompt(prompts: &Prompts, req: &ProblemRequest, topics: Topics) -> String {
  let mut prompt = fill_template(
    &prompts.generation_user_template,
    &[
      ("difficulty", req.difficulty.label()),
      ("style", req.style.label()),
      ("part", req.part_type.prompt_word()),
      ("data_structure", topics.data_structure),
      ("algorithm", topics.algorithm),
    ],
  );
  if req.part_type == PartType::MultiPart && req.part_number > 1 {
    let part_number = req.part_number.to_string();
    prompt.push_str(&fill_template(&prompts.continuation_template, &[("part_number", &part_number)]));
  }
  prompt
}
