//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions and read back plain text from the first choice.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key. The key is re-read from `config.env` on every call.

use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::{read_api_key, Prompts, Settings};
use crate::domain::Difficulty;
use crate::error::ForgeError;
use crate::util::fill_template;

const GENERATION_TEMPERATURE: f32 = 0.7;
const EVALUATION_TEMPERATURE: f32 = 0.0;

/// The language-model operations the session needs.
#[async_trait]
pub trait ProblemModel {
  /// Problem text (markdown) for a generation prompt.
  async fn generate_problem(&self, prompt: &str, difficulty: Difficulty) -> Result<String, ForgeError>;

  /// Feedback on `code` against `problem_statement`, using the fixed rubric.
  async fn evaluate_solution(&self, problem_statement: &str, code: &str) -> Result<String, ForgeError>;

  /// Free-form question to the evaluation persona.
  async fn follow_up(&self, question: &str) -> Result<String, ForgeError>;
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub home: PathBuf,
  pub base_url: String,
  pub model: String,
  pub eval_model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  pub fn from_settings(settings: &Settings) -> Result<Self, ForgeError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = settings.timeout {
      builder = builder.timeout(timeout);
    }
    let client = builder.build()?;

    Ok(Self {
      client,
      home: settings.home.clone(),
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
      eval_model: settings.eval_model.clone(),
      prompts: settings.prompts.clone(),
    })
  }

  /// Plain-text chat completion with one system and one user message.
  #[instrument(level = "info", skip(self, model, system, user), fields(model = %model, user_len = user.len()))]
  async fn chat_plain(&self, model: &str, system: &str, user: &str, temperature: f32) -> Result<String, ForgeError> {
    let api_key = read_api_key(&self.home).map_err(|e| {
      error!(target: "problem_generator", error = %e, "API key not available; skipping request");
      e
    })?;

    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      n: 1,
      temperature,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, concat!("problem-generator/", env!("CARGO_PKG_VERSION")))
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", api_key))
      .json(&req).send().await
      .map_err(|e| {
        error!(target: "problem_generator", error = %e, "Error during API call");
        ForgeError::Network(e.to_string())
      })?;

    let status = res.status();
    let body = res.text().await.map_err(|e| {
      error!(target: "problem_generator", error = %e, "No data received from API");
      ForgeError::Network(e.to_string())
    })?;
    let elapsed = start.elapsed();

    if !status.is_success() {
      let message = extract_openai_error(&body).unwrap_or(body);
      error!(target: "problem_generator", %status, ?elapsed, "OpenAI returned an error status");
      return Err(ForgeError::HttpStatus { status: status.as_u16(), message });
    }

    let text = parse_completion(&body).map_err(|e| {
      error!(target: "problem_generator", error = %e, ?elapsed, "Unexpected response format from API");
      e
    })?;
    info!(target: "problem_generator", ?elapsed, response_len = text.len(), "Model response received");
    Ok(text)
  }
}

#[async_trait]
impl ProblemModel for OpenAI {
  #[instrument(level = "info", skip(self, prompt, difficulty), fields(model = %self.model))]
  async fn generate_problem(&self, prompt: &str, difficulty: Difficulty) -> Result<String, ForgeError> {
    debug!(target: "problem_generator", %difficulty, prompt_len = prompt.len(), "Generating problem");
    self.chat_plain(&self.model, &self.prompts.generation_system, prompt, GENERATION_TEMPERATURE).await
  }

  #[instrument(level = "info", skip(self, problem_statement, code),
               fields(problem_len = problem_statement.len(), code_len = code.len(), model = %self.eval_model))]
  async fn evaluate_solution(&self, problem_statement: &str, code: &str) -> Result<String, ForgeError> {
    let user = evaluation_message(&self.prompts, problem_statement, code);
    let text = self.chat_plain(&self.eval_model, &self.prompts.evaluation_system, &user, EVALUATION_TEMPERATURE).await?;
    Ok(text.trim().to_string())
  }

  #[instrument(level = "info", skip(self, question), fields(question_len = question.len()))]
  async fn follow_up(&self, question: &str) -> Result<String, ForgeError> {
    let text = self.chat_plain(&self.model, &self.prompts.follow_up_system, question, EVALUATION_TEMPERATURE).await?;
    Ok(text.trim().to_string())
  }
}

/// User message for the evaluation persona.
pub fn evaluation_message(prompts: &Prompts, problem_statement: &str, code: &str) -> String {
  fill_template(
    &prompts.evaluation_user_template,
    &[("problem_statement", problem_statement), ("code", code)],
  )
}

/// `choices[0].message.content` of a chat.completions body.
pub fn parse_completion(body: &str) -> Result<String, ForgeError> {
  let parsed: ChatCompletionResponse =
    serde_json::from_str(body).map_err(|e| ForgeError::MalformedResponse(e.to_string()))?;
  if let Some(usage) = &parsed.usage {
    info!(target: "problem_generator", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
  }
  parsed
    .choices
    .into_iter()
    .next()
    .ok_or_else(|| ForgeError::MalformedResponse("no choices in response".into()))?
    .message
    .content
    .ok_or_else(|| ForgeError::MalformedResponse("first choice has no content".into()))
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  n: u32,
  temperature: f32,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use tokio::task::JoinHandle;

  fn settings(home: PathBuf) -> Settings {
    // Nothing listens here; requests must never get this far.
    settings_at(home, "http://127.0.0.1:9/v1/")
  }

  fn settings_at(home: PathBuf, base_url: &str) -> Settings {
    Settings {
      home,
      base_url: base_url.into(),
      model: "gpt-4o".into(),
      eval_model: "gpt-4".into(),
      timeout: Some(std::time::Duration::from_secs(10)),
      prompts: Prompts::default(),
    }
  }

  fn home_with_key(key: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.env"), format!("OPENAI_API_KEY={key}\n")).unwrap();
    dir
  }

  /// Answers exactly one HTTP request with `status` and `body`.
  /// The handle yields the raw request (head and body) as received.
  async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
      let (mut sock, _) = listener.accept().await.unwrap();
      let mut raw = Vec::new();
      let mut buf = [0u8; 4096];
      loop {
        let n = sock.read(&mut buf).await.unwrap();
        if n == 0 {
          break;
        }
        raw.extend_from_slice(&buf[..n]);
        let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else { continue };
        let head = String::from_utf8_lossy(&raw[..end]).to_lowercase();
        let len = head
          .lines()
          .find_map(|l| l.strip_prefix("content-length:"))
          .and_then(|v| v.trim().parse::<usize>().ok())
          .unwrap_or(0);
        if raw.len() >= end + 4 + len {
          break;
        }
      }
      let reply = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
      );
      sock.write_all(reply.as_bytes()).await.unwrap();
      let _ = sock.shutdown().await;
      String::from_utf8_lossy(&raw).into_owned()
    });
    (format!("http://{addr}/v1"), handle)
  }

  fn split_request(raw: &str) -> (String, serde_json::Value) {
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    (head.to_lowercase(), serde_json::from_str(body).unwrap())
  }

  #[test]
  fn first_choice_content_is_extracted() {
    let body = r##"{"choices":[{"message":{"role":"assistant","content":"# Two Sum\nbody"}},{"message":{"content":"other"}}],
                   "usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"##;
    assert_eq!(parse_completion(body).unwrap(), "# Two Sum\nbody");
  }

  #[test]
  fn unexpected_shapes_are_malformed() {
    assert!(matches!(parse_completion("not json"), Err(ForgeError::MalformedResponse(_))));
    assert!(matches!(parse_completion(r#"{"choices":[]}"#), Err(ForgeError::MalformedResponse(_))));
    assert!(matches!(parse_completion(r#"{"choices":[{"message":{}}]}"#), Err(ForgeError::MalformedResponse(_))));
    assert!(matches!(parse_completion(r#"{"id":"x"}"#), Err(ForgeError::MalformedResponse(_))));
  }

  #[test]
  fn error_bodies_yield_their_message() {
    let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Incorrect API key provided"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  #[test]
  fn request_body_has_expected_shape() {
    let req = ChatCompletionRequest {
      model: "gpt-4o".into(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: "sys".into() },
        ChatMessageReq { role: "user".into(), content: "usr".into() },
      ],
      n: 1,
      temperature: 0.7,
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["model"], "gpt-4o");
    assert_eq!(v["n"], 1);
    assert_eq!(v["messages"][0]["role"], "system");
    assert_eq!(v["messages"][1]["content"], "usr");
  }

  #[test]
  fn evaluation_message_embeds_both_inputs() {
    let msg = evaluation_message(&Prompts::default(), "Return the sum.", "func f() {}");
    assert!(msg.contains("**Problem Statement**:\nReturn the sum."), "{msg}");
    assert!(msg.contains("func f() {}"), "{msg}");
    assert!(msg.contains("- **Time and Space Complexity**"), "{msg}");
  }

  #[tokio::test]
  async fn missing_credential_short_circuits_before_network() {
    let dir = TempDir::new().unwrap();
    let oa = OpenAI::from_settings(&settings(dir.path().to_path_buf())).unwrap();
    assert_eq!(oa.base_url, "http://127.0.0.1:9/v1");

    let err = oa.generate_problem("prompt", Difficulty::Easy).await.unwrap_err();
    assert!(matches!(err, ForgeError::ConfigMissing(_)), "{err}");

    std::fs::write(dir.path().join("config.env"), "OTHER=1\n").unwrap();
    let err = oa.evaluate_solution("p", "c").await.unwrap_err();
    assert!(matches!(err, ForgeError::CredentialMissing), "{err}");
  }

  #[tokio::test]
  async fn generation_request_carries_bearer_and_body() {
    let home = home_with_key("sk-abc");
    let (base, server) = serve_once("200 OK", r##"{"choices":[{"message":{"content":"# Two Sum\nx"}}]}"##).await;
    let oa = OpenAI::from_settings(&settings_at(home.path().to_path_buf(), &base)).unwrap();

    let text = oa.generate_problem("Create an Easy problem", Difficulty::Easy).await.unwrap();
    assert_eq!(text, "# Two Sum\nx");

    let (head, body) = split_request(&server.await.unwrap());
    assert!(head.starts_with("post /v1/chat/completions "), "{head}");
    assert!(head.contains("authorization: bearer sk-abc"), "{head}");
    assert!(head.contains("content-type: application/json"), "{head}");
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["n"], 1);
    assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6, "{body}");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "Create an Easy problem");
  }

  #[tokio::test]
  async fn evaluation_uses_eval_model_at_zero_temperature() {
    let home = home_with_key("sk-abc");
    let (base, server) = serve_once("200 OK", r#"{"choices":[{"message":{"content":"  **Correctness**\nok  "}}]}"#).await;
    let oa = OpenAI::from_settings(&settings_at(home.path().to_path_buf(), &base)).unwrap();

    let text = oa.evaluate_solution("Return the sum.", "func f() {}").await.unwrap();
    assert_eq!(text, "**Correctness**\nok");

    let (_, body) = split_request(&server.await.unwrap());
    assert_eq!(body["model"], "gpt-4");
    assert_eq!(body["temperature"].as_f64(), Some(0.0));
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("Return the sum.") && user.contains("func f() {}"), "{user}");
  }

  #[tokio::test]
  async fn error_status_maps_to_http_status_with_api_message() {
    let home = home_with_key("sk-wrong");
    let (base, server) = serve_once("401 Unauthorized", r#"{"error":{"message":"bad key","type":"invalid_request_error"}}"#).await;
    let oa = OpenAI::from_settings(&settings_at(home.path().to_path_buf(), &base)).unwrap();

    let err = oa.generate_problem("p", Difficulty::Easy).await.unwrap_err();
    match err {
      ForgeError::HttpStatus { status, message } => {
        assert_eq!(status, 401);
        assert_eq!(message, "bad key");
      }
      other => panic!("unexpected error: {other}"),
    }
    server.await.unwrap();
  }

  #[tokio::test]
  async fn success_without_choices_is_malformed() {
    let home = home_with_key("sk-abc");
    let (base, server) = serve_once("200 OK", r#"{"choices":[]}"#).await;
    let oa = OpenAI::from_settings(&settings_at(home.path().to_path_buf(), &base)).unwrap();

    let err = oa.follow_up("why?").await.unwrap_err();
    assert!(matches!(err, ForgeError::MalformedResponse(_)), "{err}");
    server.await.unwrap();
  }

  #[tokio::test]
  async fn refused_connection_is_a_network_error() {
    let home = home_with_key("sk-abc");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let oa = OpenAI::from_settings(&settings_at(home.path().to_path_buf(), &format!("http://{addr}/v1"))).unwrap();

    let err = oa.generate_problem("p", Difficulty::Easy).await.unwrap_err();
    assert!(matches!(err, ForgeError::Network(_)), "{err}");
  }
}
