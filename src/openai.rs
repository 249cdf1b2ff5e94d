//! Minimal OpenAI client for exercise generation.
//!
//! We call chat.completions with the learner's conversation and a single
//! `createProblem` function tool. When the model calls the tool, its
//! arguments become an `ExerciseDraft`; otherwise the reply is plain text
//! (typically a clarifying question).
//!
//! NOTE: We never log the API key, and message contents are truncated in logs.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::ExerciseDraft;
use crate::util::{fill_template, trunc_for_log};

pub const CREATE_PROBLEM_TOOL: &str = "createProblem";

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

/// One turn of the learner/assistant conversation, as sent by the client.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
  pub role: ChatRole,
  pub content: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
  User,
  Assistant,
}

/// Context about the library the model can reuse when naming categories/folders.
#[derive(Clone, Debug, Default)]
pub struct GenerationContext {
  pub categories: Vec<String>,
  pub folders: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatReply {
  pub content: String,
  pub generated: Option<ExerciseDraft>,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  /// Send the conversation; returns the assistant text and, if the model called
  /// `createProblem`, the exercise draft it produced.
  #[instrument(level = "info", skip(self, prompts, messages, ctx), fields(model = %self.model, turns = messages.len()))]
  pub async fn chat(
    &self,
    prompts: &Prompts,
    messages: &[ChatMessage],
    ctx: &GenerationContext,
  ) -> Result<ChatReply, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = build_request(&self.model, prompts, messages, ctx);

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "codedrill-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      error!(elapsed = ?start.elapsed(), %status, "OpenAI call failed");
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    info!(elapsed = ?start.elapsed(), "Model response received");
    parse_reply(body)
  }
}

fn build_request(model: &str, prompts: &Prompts, messages: &[ChatMessage], ctx: &GenerationContext) -> serde_json::Value {
  let context = fill_template(
    &prompts.generator_context_template,
    &[
      ("categories", &ctx.categories.join(", ")),
      ("folders", &ctx.folders.join(", ")),
    ],
  );
  let system = format!("{}\n\n{}", prompts.generator_system, context);

  let mut all = vec![json!({ "role": "system", "content": system })];
  all.extend(messages.iter().map(|m| json!({ "role": m.role, "content": m.content })));

  json!({
    "model": model,
    "messages": all,
    "temperature": prompts.generator_temperature,
    "max_tokens": prompts.generator_max_tokens,
    "tools": [create_problem_tool()],
    "tool_choice": "auto",
  })
}

fn create_problem_tool() -> serde_json::Value {
  json!({
    "type": "function",
    "function": {
      "name": CREATE_PROBLEM_TOOL,
      "description": "Create and register a Playwright practice exercise",
      "parameters": {
        "type": "object",
        "properties": {
          "title": { "type": "string", "description": "Exercise title" },
          "description": { "type": "string", "description": "What the learner must do" },
          "expectedCode": { "type": "string", "description": "Canonical one-line answer" },
          "alternativeAnswers": { "type": "array", "items": { "type": "string" }, "description": "Equivalent answers" },
          "hints": { "type": "array", "items": { "type": "string" }, "description": "Progressive hints" },
          "difficulty": { "type": "number", "minimum": 1, "maximum": 3, "description": "1 beginner, 2 intermediate, 3 advanced" },
          "category": { "type": "string", "description": "Category name" },
          "folderId": { "type": "string", "description": "Target folder id (defaults to ai-generated)" }
        },
        "required": ["title", "description", "expectedCode", "alternativeAnswers", "hints", "difficulty", "category"]
      }
    }
  })
}

/// Turn the completion into a reply, decoding a `createProblem` call if present.
fn parse_reply(body: ChatCompletionResponse) -> Result<ChatReply, String> {
  let message = body
    .choices
    .into_iter()
    .next()
    .map(|c| c.message)
    .ok_or_else(|| "OpenAI returned no choices".to_string())?;
  let content = message.content.unwrap_or_default().trim().to_string();

  let call = message
    .tool_calls
    .into_iter()
    .find(|c| c.function.name == CREATE_PROBLEM_TOOL);
  let Some(call) = call else {
    return Ok(ChatReply { content, generated: None });
  };

  let draft = parse_tool_arguments(&call.function.arguments).map_err(|e| {
    warn!(args = %trunc_for_log(&call.function.arguments, 200), error = %e, "Unreadable createProblem arguments");
    format!("JSON parse error: {}", e)
  })?;
  info!(title = %trunc_for_log(&draft.title, 60), "Exercise generated");

  let content = if content.is_empty() {
    format!("Created the exercise \"{}\".", draft.title)
  } else {
    content
  };
  Ok(ChatReply { content, generated: Some(draft) })
}

/// Models sometimes send the difficulty as a float (`2.0`); accept that too.
fn parse_tool_arguments(args: &str) -> Result<ExerciseDraft, serde_json::Error> {
  let mut value: serde_json::Value = serde_json::from_str(args)?;
  if let Some(d) = value.get("difficulty").and_then(|d| d.as_f64()) {
    value["difficulty"] = json!(d.round().clamp(0.0, 255.0) as u8);
  }
  serde_json::from_value(value)
}

// --- Chat DTOs ---

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
  #[serde(default)] tool_calls: Vec<ToolCall>,
}
#[derive(Deserialize)]
struct ToolCall { function: ToolFunction }
#[derive(Deserialize)]
struct ToolFunction { name: String, arguments: String }
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
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
