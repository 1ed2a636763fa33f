//! Interactive session: the numbered text menus and the operations behind them.
//!
//! The session owns the store (history + progress), the prompt templates, the model and
//! the random source, and talks to the user through any `BufRead`/`Write` pair.
//! Operation failures are reported and logged here; only terminal I/O errors leave the loop.
//! End of input behaves like choosing Exit.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{Difficulty, PartType, ProblemEntry, Progress, Style};
use crate::error::ForgeError;
use crate::feedback::parse_feedback;
use crate::naming::{extract_problem_title, problem_filename};
use crate::openai::ProblemModel;
use crate::prompt::{build_problem_prompt, ProblemRequest};
use crate::store::Store;
use crate::util::{timestamp_now, trunc_for_log};

/// Entries of the current difficulty needed before auto-advance moves up a level.
pub const ADVANCE_AFTER: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MainChoice { Generate, Review, ContinueMultiPart, Evaluate, Exit }

impl MainChoice {
  fn parse(s: &str) -> Option<Self> {
    match s {
      "1" => Some(MainChoice::Generate),
      "2" => Some(MainChoice::Review),
      "3" => Some(MainChoice::ContinueMultiPart),
      "4" => Some(MainChoice::Evaluate),
      "5" => Some(MainChoice::Exit),
      _ => None,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PartChoice { NextPart, Return, Abandon }

impl PartChoice {
  fn parse(s: &str) -> Option<Self> {
    match s {
      "1" => Some(PartChoice::NextPart),
      "2" => Some(PartChoice::Return),
      "3" => Some(PartChoice::Abandon),
      _ => None,
    }
  }
}

pub struct Session<M, R, W> {
  model: M,
  store: Store,
  prompts: Prompts,
  input: R,
  out: W,
  rng: StdRng,
  current_difficulty: Difficulty,
}

impl<M: ProblemModel, R: BufRead, W: Write> Session<M, R, W> {
  pub fn new(model: M, store: Store, prompts: Prompts, input: R, out: W) -> Self {
    Self {
      model,
      store,
      prompts,
      input,
      out,
      rng: StdRng::from_entropy(),
      current_difficulty: Difficulty::Easy,
    }
  }

  /// Replace the topic sampler's random source.
  pub fn with_rng(mut self, rng: StdRng) -> Self {
    self.rng = rng;
    self
  }

  #[allow(dead_code)]
  pub fn store(&self) -> &Store { &self.store }

  #[allow(dead_code)]
  pub fn current_difficulty(&self) -> Difficulty { self.current_difficulty }

  #[allow(dead_code)]
  pub fn into_output(self) -> W { self.out }

  /// Main menu loop. Returns when the user exits or input ends.
  pub async fn run(&mut self) -> io::Result<()> {
    loop {
      writeln!(self.out, "\nMain Menu")?;
      writeln!(self.out, "1. Generate New Problem")?;
      writeln!(self.out, "2. Review Past Problems")?;
      writeln!(self.out, "3. Continue Multi-Part Problem")?;
      writeln!(self.out, "4. Evaluate Solution")?;
      writeln!(self.out, "5. Exit")?;
      let Some(choice) = self.ask("Choose an option: ")? else {
        return self.farewell();
      };
      match MainChoice::parse(&choice) {
        Some(MainChoice::Generate) => self.generate_new_problem().await?,
        Some(MainChoice::Review) => self.review_problems()?,
        Some(MainChoice::ContinueMultiPart) => self.multi_part_menu().await?,
        Some(MainChoice::Evaluate) => self.evaluate_solution().await?,
        Some(MainChoice::Exit) => return self.farewell(),
        None => writeln!(self.out, "Invalid selection. Please try again.")?,
      }
    }
  }

  fn farewell(&mut self) -> io::Result<()> {
    writeln!(self.out, "Exiting. Good luck with your preparation!")?;
    self.out.flush()
  }

  /// Multi-part sub-menu. Returns to the caller on "Return", "Abandon" or end of input.
  pub async fn multi_part_menu(&mut self) -> io::Result<()> {
    loop {
      writeln!(self.out, "\nMulti-Part Problem Menu")?;
      writeln!(self.out, "1. Generate Next Part")?;
      writeln!(self.out, "2. Return to Main Menu")?;
      writeln!(self.out, "3. Abandon Multi-Part Problem")?;
      let Some(choice) = self.ask("Choose an option: ")? else { return Ok(()) };
      match PartChoice::parse(&choice) {
        Some(PartChoice::NextPart) => self.generate_next_part().await?,
        Some(PartChoice::Return) => return Ok(()),
        Some(PartChoice::Abandon) => {
          self.abandon_multi_part()?;
          return Ok(());
        }
        None => writeln!(self.out, "Invalid selection. Please try again.")?,
      }
    }
  }

  #[instrument(level = "info", skip(self), fields(difficulty = %self.current_difficulty))]
  pub async fn generate_new_problem(&mut self) -> io::Result<()> {
    let Some(manual) = self.ask("Do you want to select a difficulty level? (y/n): ")? else { return Ok(()) };
    if manual.eq_ignore_ascii_case("y") {
      let answer = self.ask("Choose difficulty (Easy, Medium, Hard): ")?.unwrap_or_default();
      self.current_difficulty = match answer.parse::<Difficulty>() {
        Ok(d) => d,
        Err(e) => {
          warn!(target: "problem", error = %e, "Bad difficulty input; defaulting to Easy");
          writeln!(self.out, "Invalid difficulty level selected. Defaulting to Easy.")?;
          Difficulty::Easy
        }
      };
    } else {
      self.auto_advance()?;
    }

    let Some(part_raw) = self.ask("Select problem type (single-part, multi-part): ")? else { return Ok(()) };
    let Some(style_raw) = self.ask("Select style (leetcode, real-world): ")? else { return Ok(()) };
    let (part_type, style) = match (part_raw.parse::<PartType>(), style_raw.parse::<Style>()) {
      (Ok(p), Ok(s)) => (p, s),
      (Err(e), _) | (_, Err(e)) => {
        warn!(target: "problem", error = %e, "Rejected problem selection");
        writeln!(self.out, "Invalid selection. Please try again.")?;
        return Ok(());
      }
    };

    let difficulty = self.current_difficulty;
    let req = ProblemRequest { part_type, style, difficulty, part_number: 1 };
    let prompt = build_problem_prompt(&self.prompts, &req, &mut self.rng);
    info!(target: "problem", %difficulty, %part_type, %style, prompt = %trunc_for_log(&prompt, 80), "Requesting new problem");

    let problem = match self.model.generate_problem(&prompt, difficulty).await {
      Ok(text) => text,
      Err(e) => {
        error!(target: "problem", error = %e, "Problem generation failed");
        writeln!(self.out, "Failed to generate problem ({e}). Please try again.")?;
        return Ok(());
      }
    };

    writeln!(self.out, "\nGenerated Problem ({difficulty}):\n{problem}\n")?;
    let title = extract_problem_title(&problem);
    let entry = self.record_problem(problem, &title, difficulty, part_type, style)?;

    if part_type == PartType::MultiPart {
      if let Err(e) = self.store.set_progress(Progress::start(entry)) {
        error!(target: "store", error = %e, "Error saving progress");
        writeln!(self.out, "Error saving progress: {e}")?;
      }
      self.multi_part_menu().await?;
    }
    Ok(())
  }

  #[instrument(level = "info", skip(self))]
  pub async fn generate_next_part(&mut self) -> io::Result<()> {
    let Some(mut progress) = self.store.progress.clone() else {
      writeln!(self.out, "No multi-part problem in progress.")?;
      return Ok(());
    };

    // Work on a copy so a failed call leaves the stored part number untouched.
    progress.current_part += 1;
    let part_number = progress.current_part;
    let req = ProblemRequest {
      part_type: PartType::MultiPart,
      style: progress.style,
      difficulty: progress.difficulty,
      part_number,
    };
    let prompt = build_problem_prompt(&self.prompts, &req, &mut self.rng);
    info!(target: "problem", part_number, difficulty = %progress.difficulty, "Requesting next part");

    let problem = match self.model.generate_problem(&prompt, progress.difficulty).await {
      Ok(text) => text,
      Err(e) => {
        error!(target: "problem", part_number, error = %e, "Next-part generation failed");
        writeln!(self.out, "Failed to generate the next part ({e}). Please try again.")?;
        return Ok(());
      }
    };

    writeln!(self.out, "\nGenerated Part {part_number}:\n{problem}\n")?;
    let title = format!("{}-part-{}", extract_problem_title(&problem), part_number);
    let entry = self.record_problem(problem, &title, progress.difficulty, progress.part_type, progress.style)?;

    progress.problem_history.push(entry);
    if let Err(e) = self.store.set_progress(progress) {
      error!(target: "store", error = %e, "Error saving progress");
      writeln!(self.out, "Error saving progress: {e}")?;
    }
    Ok(())
  }

  fn abandon_multi_part(&mut self) -> io::Result<()> {
    if self.store.progress.is_none() {
      return writeln!(self.out, "No multi-part problem in progress.");
    }
    match self.store.clear_progress() {
      Ok(()) => {
        info!(target: "problem", "Multi-part progress cleared");
        writeln!(self.out, "Multi-part problem abandoned.")
      }
      Err(e) => {
        error!(target: "store", error = %e, "Error clearing progress");
        writeln!(self.out, "Error clearing progress: {e}")
      }
    }
  }

  /// Save the problem file and append the history entry. Either write may fail; the
  /// entry is returned regardless so multi-part bookkeeping can continue.
  fn record_problem(
    &mut self,
    problem: String,
    title: &str,
    difficulty: Difficulty,
    part_type: PartType,
    style: Style,
  ) -> io::Result<ProblemEntry> {
    let timestamp = timestamp_now();
    let wanted = problem_filename(title, &timestamp);

    let filename = match self.store.save_problem_to_file(&problem, difficulty, &wanted) {
      Ok(path) => {
        writeln!(self.out, "Problem saved to file: {}", path.display())?;
        path.file_name().and_then(|n| n.to_str()).map(str::to_string).unwrap_or(wanted)
      }
      Err(e) => {
        error!(target: "store", error = %e, "Error saving problem to file");
        writeln!(self.out, "Error saving problem to file: {e}")?;
        wanted
      }
    };

    let entry = ProblemEntry { problem, difficulty, part_type, style, timestamp, filename };
    if let Err(e) = self.store.append_to_history(entry.clone()) {
      error!(target: "store", error = %e, "Error saving history");
      writeln!(self.out, "Error saving history: {e}")?;
    }
    Ok(entry)
  }

  /// Move one step up the ladder once enough problems exist at the current level.
  fn auto_advance(&mut self) -> io::Result<()> {
    if self.store.count_for(self.current_difficulty) < ADVANCE_AFTER {
      return Ok(());
    }
    if let Some(next) = self.current_difficulty.next() {
      info!(target: "problem", from = %self.current_difficulty, to = %next, "Auto-advancing difficulty");
      self.current_difficulty = next;
      writeln!(self.out, "Moving to {next} problems.")?;
    }
    Ok(())
  }

  pub fn review_problems(&mut self) -> io::Result<()> {
    if self.store.history.is_empty() {
      return writeln!(self.out, "No problems to review.");
    }
    for (idx, entry) in self.store.history.iter().enumerate() {
      writeln!(self.out, "\nProblem {} ({} - {} - {}):", idx + 1, entry.difficulty, entry.part_type, entry.style)?;
      writeln!(self.out, "Timestamp: {}", entry.timestamp)?;
      writeln!(self.out, "Filename: {}", entry.filename)?;
      writeln!(self.out, "Problem:\n{}\n", entry.problem)?;
    }
    Ok(())
  }

  #[instrument(level = "info", skip(self))]
  pub async fn evaluate_solution(&mut self) -> io::Result<()> {
    let Some(code_path) = self.ask("Enter the path to your code file: ")? else { return Ok(()) };
    let Some(problem_path) = self.ask("Enter the path to the problem statement file: ")? else { return Ok(()) };
    if code_path.is_empty() || problem_path.is_empty() {
      return writeln!(self.out, "Invalid file name.");
    }

    let code_path = PathBuf::from(code_path);
    let problem_path = PathBuf::from(problem_path);
    if !code_path.exists() {
      warn!(target: "problem", path = %code_path.display(), "Code file not found");
      return writeln!(self.out, "File not found.");
    }
    if !problem_path.exists() {
      warn!(target: "problem", path = %problem_path.display(), "Problem statement file not found");
      return writeln!(self.out, "Problem statement file not found.");
    }

    let (code, statement) = match (read_text(&code_path), read_text(&problem_path)) {
      (Ok(c), Ok(s)) => (c, s),
      (Err(e), _) | (_, Err(e)) => {
        error!(target: "problem", error = %e, "Error reading file");
        return writeln!(self.out, "Error reading file: {e}");
      }
    };

    match self.model.evaluate_solution(&statement, &code).await {
      Ok(text) => {
        let feedback = parse_feedback(&text);
        writeln!(self.out, "\nFeedback on your solution:\n")?;
        if feedback.is_empty() {
          writeln!(self.out, "{text}")?;
        } else {
          writeln!(self.out, "{feedback}")?;
        }
        self.follow_up_menu().await
      }
      Err(e) => {
        error!(target: "problem", error = %e, "Evaluation failed");
        writeln!(self.out, "Failed to evaluate the solution ({e}).")
      }
    }
  }

  async fn follow_up_menu(&mut self) -> io::Result<()> {
    loop {
      writeln!(self.out, "\nOptions:")?;
      writeln!(self.out, "1. Ask a follow-up question")?;
      writeln!(self.out, "2. Return to Main Menu")?;
      let Some(choice) = self.ask("Enter your choice (1 or 2): ")? else { return Ok(()) };
      match choice.as_str() {
        "1" => {
          let Some(question) = self.ask("Please enter your question: ")? else { return Ok(()) };
          if question.is_empty() {
            continue;
          }
          match self.model.follow_up(&question).await {
            Ok(answer) => writeln!(self.out, "\nAnswer:\n{answer}\n")?,
            Err(e) => {
              error!(target: "problem", error = %e, "Follow-up question failed");
              writeln!(self.out, "Failed to get an answer ({e}).")?;
            }
          }
        }
        "2" => return Ok(()),
        _ => writeln!(self.out, "Invalid choice. Please enter 1 or 2.")?,
      }
    }
  }

  /// Print `label`, read one line. `None` once input is exhausted.
  /// Bytes that are not UTF-8 are replaced, so they read as an invalid choice.
  fn ask(&mut self, label: &str) -> io::Result<Option<String>> {
    write!(self.out, "{label}")?;
    self.out.flush()?;
    let mut buf = Vec::new();
    if self.input.read_until(b'\n', &mut buf)? == 0 {
      return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&buf).trim().to_string()))
  }
}

fn read_text(path: &Path) -> Result<String, ForgeError> {
  if !path.exists() {
    return Err(ForgeError::FileNotFound(path.to_path_buf()));
  }
  std::fs::read_to_string(path).map_err(|e| ForgeError::io(path, e))
}
