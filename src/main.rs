//! Problem Generator · interactive interview-practice CLI
//!
//! - Generates interview problems through the OpenAI chat API
//! - Keeps history and multi-part progress as JSON next to the problem files
//! - Evaluates a solution file against a problem statement
//!
//! Important env variables:
//!   PROBLEMS_HOME        : install directory holding config.env (default: cwd)
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_MODEL         : default "gpt-4o"
//!   OPENAI_EVAL_MODEL    : default "gpt-4"
//!   OPENAI_TIMEOUT_SECS  : optional request timeout
//!   AGENT_CONFIG_PATH    : path to TOML config with prompt overrides
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"
//!
//! The API key itself is read from `<PROBLEMS_HOME>/config.env` on every request.

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod naming;
mod prompt;
mod openai;
mod store;
mod feedback;
mod session;

use tracing::{info, warn};

use crate::config::{load_api_key, Settings};
use crate::openai::OpenAI;
use crate::session::Session;
use crate::store::Store;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = Settings::from_env();
  let store = Store::open(&settings.home);

  info!(
    target: "problem_generator",
    home = %store.home().display(),
    model = %settings.model,
    eval_model = %settings.eval_model,
    base_url = %settings.base_url,
    "Starting problem generator"
  );
  // Only a startup hint; each request re-reads the file.
  if load_api_key(store.home()).is_none() {
    warn!(target: "problem_generator", "Requests will fail until OPENAI_API_KEY is set in config.env");
  }

  let model = OpenAI::from_settings(&settings)?;
  let stdin = std::io::stdin();
  let mut session = Session::new(model, store, settings.prompts.clone(), stdin.lock(), std::io::stdout());
  session.run().await?;
  Ok(())
}
