use crate::{require_text, AiBackend, CompletionRequest};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use reviewgen_core::BackendError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a professional food content creator and image analyst.";

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` adapter. Works against any server
/// speaking that dialect through `base_url`.
pub struct OpenAiBackend {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiBackend {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Self, BackendError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BackendError::unavailable(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        })
    }

    fn headers(&self) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| BackendError::error("API key contains invalid header characters"))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: request
                .system
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }];
        messages.push(ChatMessage {
            role: "user",
            content: request.rendered_prompt(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

fn extract_content(response: ChatResponse) -> Result<String, BackendError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| BackendError::error("no choices in chat completion"))?;
    require_text(&content)
}

#[async_trait]
impl AiBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(request);

        debug!(model = %self.model, task = ?request.task, "OpenAI chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &error_text));
        }

        let chat: ChatResponse = response.json().await?;
        extract_content(chat)
    }
}
