use crate::{require_text, AiBackend, CompletionRequest};
use async_trait::async_trait;
use reqwest::Client;
use reviewgen_core::BackendError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Adapter for a locally served model exposing Ollama's `/api/generate`.
pub struct LocalModelBackend {
    http: Client,
    url: String,
    model: String,
}

impl LocalModelBackend {
    pub fn new(url: &str, model: &str) -> Result<Self, BackendError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| BackendError::unavailable(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            url: url.to_string(),
            model: model.to_string(),
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: request.rendered_prompt(),
            system: request.system.clone(),
            stream: false,
        }
    }
}

fn extract_response(body: GenerateResponse) -> Result<String, BackendError> {
    if let Some(error) = body.error {
        return Err(BackendError::error(format!("local model error: {error}")));
    }
    let text = body
        .response
        .ok_or_else(|| BackendError::error("local model response missing 'response' field"))?;
    require_text(&text)
}

#[async_trait]
impl AiBackend for LocalModelBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        debug!(model = %self.model, task = ?request.task, "Local model generate request");

        let response = self
            .http
            .post(&self.url)
            .json(&self.build_request(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &error_text));
        }

        let body: GenerateResponse = response.json().await?;
        extract_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompletionTask;

    #[test]
    fn test_request_is_non_streaming() {
        let backend = LocalModelBackend::new("http://localhost:11434/api/generate", "llama2")
            .unwrap();
        let request = CompletionRequest::new(CompletionTask::ImageCuration, "pick")
            .with_context(serde_json::json!({"candidates": ["http://img/1.jpg"]}));
        let body = serde_json::to_value(backend.build_request(&request)).unwrap();

        assert_eq!(body["model"], "llama2");
        assert_eq!(body["stream"], false);
        assert!(body.get("system").is_none());
        let prompt = body["prompt"].as_str().unwrap();
        assert!(prompt.starts_with("pick"));
        assert!(prompt.contains("http://img/1.jpg"));
    }

    #[test]
    fn test_extract_response() {
        let ok: GenerateResponse =
            serde_json::from_str(r#"{"model":"llama2","response":"hello","done":true}"#).unwrap();
        assert_eq!(extract_response(ok).unwrap(), "hello");

        let missing: GenerateResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(extract_response(missing).is_err());

        let failed: GenerateResponse =
            serde_json::from_str(r#"{"error":"model 'llama9' not found"}"#).unwrap();
        assert!(matches!(
            extract_response(failed),
            Err(BackendError::Error { message }) if message.contains("llama9")
        ));
    }
}
