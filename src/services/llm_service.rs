use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

use crate::config::LlmConfig;

/// A request to the text generator: fixed instructions plus the user-facing prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug)]
pub enum LlmError {
    NotConfigured,
    HttpError(reqwest::Error),
    ResponseError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::NotConfigured => write!(f, "Text generation is not configured"),
            LlmError::HttpError(err) => write!(f, "HTTP error: {}", err),
            LlmError::ResponseError(msg) => write!(f, "Response error: {}", msg),
        }
    }
}

impl Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::HttpError(err)
    }
}

/// An external text-generation service: prompt in, free-form text out.
#[allow(async_fn_in_trait)]
pub trait TextGenerator: Clone + Send + Sync + 'static {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;

    /// Human-readable configuration state for the health report.
    fn describe(&self) -> Result<String, String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Chat-completions client for OpenAI and compatible endpoints.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl TextGenerator for OpenAiGenerator {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!("Requesting completion from {} with model {}", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ResponseError(format!(
                "Completion request failed with status {}: {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| LlmError::ResponseError("Completion contained no message".to_string()))
    }

    fn describe(&self) -> Result<String, String> {
        match &self.api_key {
            Some(_) => Ok(format!("Model {} at {}", self.model, self.base_url)),
            None => Err("OPENAI_API_KEY not configured".to_string()),
        }
    }
}
