//! Error taxonomy shared by the config loader, the OpenAI client, the store and the session.
//!
//! Nothing here is fatal: the session catches every variant at the menu-operation
//! boundary, logs it, tells the user, and goes back to the menu.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
  #[error("config file not found at {0}")]
  ConfigMissing(PathBuf),

  #[error("API key not found. Please set OPENAI_API_KEY in config.env")]
  CredentialMissing,

  #[error("network error: {0}")]
  Network(String),

  #[error("OpenAI HTTP {status}: {message}")]
  HttpStatus { status: u16, message: String },

  #[error("unexpected response format from API: {0}")]
  MalformedResponse(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("file error at {path}: {source}")]
  FileIo {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("file not found: {0}")]
  FileNotFound(PathBuf),

  #[error("invalid selection: {0}")]
  InvalidSelection(String),
}

impl ForgeError {
  /// Attach the offending path to an io error.
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    ForgeError::FileIo { path: path.into(), source }
  }
}

impl From<reqwest::Error> for ForgeError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      ForgeError::MalformedResponse(e.to_string())
    } else {
      ForgeError::Network(e.to_string())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn io_errors_carry_the_path() {
    let err = ForgeError::io("/tmp/x.json", std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
    let msg = err.to_string();
    assert!(msg.contains("/tmp/x.json"), "{msg}");
    assert!(msg.contains("disk full"), "{msg}");
  }

  #[test]
  fn credential_message_points_at_config_env() {
    assert!(ForgeError::CredentialMissing.to_string().contains("config.env"));
  }
}
