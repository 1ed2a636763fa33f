//! Configuration: the API credential from `config.env`, runtime settings from the
//! environment, and optional prompt overrides from TOML.
//!
//! Env variables:
//!   PROBLEMS_HOME        : install directory (default: current directory)
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_MODEL         : generation model, default "gpt-4o"
//!   OPENAI_EVAL_MODEL    : evaluation model, default "gpt-4"
//!   OPENAI_TIMEOUT_SECS  : optional request timeout; unset means wait forever
//!   AGENT_CONFIG_PATH    : path to TOML config with a `[prompts]` table

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::ForgeError;

pub const CONFIG_FILE: &str = "config.env";
pub const API_KEY_NAME: &str = "OPENAI_API_KEY";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts used by the OpenAI client and the prompt builder.
/// Every field can be overridden in TOML; missing fields keep the defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generation_system: String,
  /// Placeholders: {difficulty} {style} {part} {data_structure} {algorithm}
  pub generation_user_template: String,
  /// Appended for part > 1 of a multi-part problem. Placeholder: {part_number}
  pub continuation_template: String,
  pub evaluation_system: String,
  /// Placeholders: {problem_statement} {code}
  pub evaluation_user_template: String,
  pub follow_up_system: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: "You are an expert in Apple iOS user interface engineering. Create real-world technical interview problems covering all aspects of user interface, including layout, animations, responsiveness, color contrast, user interaction, gestures, haptics, dynamic type, and anything else user interface related. Use Swift syntax and do not include a solution. Do not provide any hints or notes on what data structure and/or algorithm to use. Format the problem description in markdown. The problem must include a title, problem statement, examples, constraints, function signature, and the most optimal time and space complexity.".into(),
      generation_user_template: "Create a {difficulty} {style} {part}-part problem focusing on iOS user interface. The problem should involve {data_structure} and {algorithm}, and be relevant to real-world scenarios. Use Swift syntax and do not provide a solution. Do not provide hints or any detail of what data structure or algorithm to use to solve the problem.".into(),
      continuation_template: " This is part {part_number} of the problem, building upon the previous parts.".into(),
      evaluation_system: "You are an expert coding assistant proficient in Swift and algorithm analysis.".into(),
      evaluation_user_template: r#"I will provide you with a Swift function and a problem statement. Evaluate it based on the following criteria:

1. **Correctness**: Is the solution correct based on the problem statement? If it is correct, state 'Correct solution.'. If the solution is incorrect, start with 'The solution is incorrect.' and then explain in detail why it is not correct based on the problem requirements.

2. **Optimality**: If the solution is correct, evaluate whether it has the most optimal time and space complexity. If it is optimal, state 'The solution is optimal.'. If it is not, explain why it is not optimal and suggest potential improvements without revealing the full solution.

3. **Time and Space Complexity**: Provide a time and space complexity analysis and suggest improvements if necessary.

Please structure your evaluation using the following headings:
- **Correctness**
- **Optimality**
- **Time and Space Complexity**

**Problem Statement**:
{problem_statement}

**Swift Code**:
{code}

Provide your evaluation:"#.into(),
      follow_up_system: "You are an expert coding assistant proficient in Swift and algorithm analysis.".into(),
    }
  }
}

/// Runtime settings resolved once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
  pub home: PathBuf,
  pub base_url: String,
  pub model: String,
  pub eval_model: String,
  pub timeout: Option<Duration>,
  pub prompts: Prompts,
}

impl Settings {
  pub fn from_env() -> Self {
    let home = std::env::var("PROBLEMS_HOME")
      .map(PathBuf::from)
      .or_else(|_| std::env::current_dir())
      .unwrap_or_else(|_| PathBuf::from("."));
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    let eval_model = std::env::var("OPENAI_EVAL_MODEL").unwrap_or_else(|_| "gpt-4".into());
    let timeout = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.trim().parse::<u64>().ok())
      .filter(|secs| *secs > 0)
      .map(Duration::from_secs);
    let prompts = load_agent_config_from_env().map(|c| c.prompts).unwrap_or_default();

    Self { home, base_url, model, eval_model, timeout, prompts }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  load_agent_config(Path::new(&path))
}

pub fn load_agent_config(path: &Path) -> Option<AgentConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "problem_generator", path = %path.display(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "problem_generator", path = %path.display(), error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "problem_generator", path = %path.display(), error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// First `OPENAI_API_KEY=` value in `<home>/config.env`.
pub fn read_api_key(home: &Path) -> Result<String, ForgeError> {
  let path = home.join(CONFIG_FILE);
  info!(target: "problem_generator", path = %path.display(), "Looking for config.env");
  if !path.exists() {
    return Err(ForgeError::ConfigMissing(path));
  }
  let content = std::fs::read_to_string(&path).map_err(|e| ForgeError::io(&path, e))?;
  find_key(&content, API_KEY_NAME).ok_or(ForgeError::CredentialMissing)
}

/// Same as `read_api_key`, with every failure logged and collapsed to `None`.
pub fn load_api_key(home: &Path) -> Option<String> {
  match read_api_key(home) {
    Ok(key) => Some(key),
    Err(e) => {
      warn!(target: "problem_generator", error = %e, "No API credential available");
      None
    }
  }
}

fn find_key(content: &str, key: &str) -> Option<String> {
  content
    .lines()
    .map(str::trim)
    .filter_map(|line| line.split_once('='))
    .find(|(k, _)| *k == key)
    .map(|(_, v)| v.to_string())
}
