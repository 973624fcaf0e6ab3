//! The AI capability used by the review pipeline.
//!
//! Everything the pipeline knows about a model is the [`AiBackend`] trait: one
//! request in, one string out, or a [`BackendError`]. Provider adapters
//! (OpenAI-compatible chat completions, an Ollama-style local server) live
//! behind it, and [`ResilientBackend`] adds the timeout and the single retry.

pub mod ollama;
pub mod openai;
pub mod resilient;
pub mod sanitize;

pub use ollama::LocalModelBackend;
pub use openai::OpenAiBackend;
pub use resilient::{get_retry_strategy, ResilientBackend, RetryPolicy, RetryStrategy};
pub use sanitize::{remove_think_tags, require_text};

use async_trait::async_trait;
use reviewgen_core::{BackendConfig, BackendError, ProviderKind};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Which pipeline stage issued a request. Adapters may log it; they must not
/// change behaviour on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionTask {
    ImageCuration,
    ReviewWriting,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub task: CompletionTask,
    pub system: Option<String>,
    pub prompt: String,
    /// Structured data backing the prompt, e.g. the candidate pool.
    pub context: Option<serde_json::Value>,
}

impl CompletionRequest {
    pub fn new(task: CompletionTask, prompt: impl Into<String>) -> Self {
        Self {
            task,
            system: None,
            prompt: prompt.into(),
            context: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// The prompt with the structured context appended as a JSON block, for
    /// providers that only take plain text.
    pub fn rendered_prompt(&self) -> String {
        match &self.context {
            Some(context) => {
                let json = serde_json::to_string_pretty(context).unwrap_or_default();
                format!("{}\n\n```json\n{}\n```", self.prompt, json)
            }
            None => self.prompt.clone(),
        }
    }
}

#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Short provider label used in logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;
}

/// Builds the configured provider wrapped in [`ResilientBackend`], or `None`
/// when AI is switched off.
pub fn build_backend(config: &BackendConfig) -> Result<Option<Arc<dyn AiBackend>>, BackendError> {
    let policy = RetryPolicy::from_config(config);

    let backend: Arc<dyn AiBackend> = match config.resolved_provider() {
        ProviderKind::None => {
            info!("AI backend disabled, using heuristic selection and template text");
            return Ok(None);
        }
        ProviderKind::OpenAi => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| BackendError::unavailable("OPENAI_API_KEY not set"))?;
            Arc::new(OpenAiBackend::new(
                api_key,
                &config.openai_base_url,
                &config.openai_model,
                config.max_tokens,
                config.temperature,
            )?)
        }
        ProviderKind::Local | ProviderKind::Auto => Arc::new(LocalModelBackend::new(
            &config.local_model_url,
            &config.local_model_name,
        )?),
    };

    info!(
        "Using AI backend '{}' (timeout {}s, retry on transient errors: {})",
        backend.name(),
        config.timeout_secs,
        config.retry_transient
    );
    Ok(Some(Arc::new(ResilientBackend::new(backend, policy))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_backend_disabled() {
        let config = BackendConfig {
            provider: ProviderKind::None,
            ..Default::default()
        };
        assert!(build_backend(&config).unwrap().is_none());
    }

    #[test]
    fn test_build_backend_openai_requires_key() {
        let config = BackendConfig {
            provider: ProviderKind::OpenAi,
            ..Default::default()
        };
        assert!(matches!(
            build_backend(&config),
            Err(BackendError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_build_backend_auto_picks_provider() {
        let local = build_backend(&BackendConfig::default()).unwrap().unwrap();
        assert_eq!(local.name(), "local");

        let config = BackendConfig {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let remote = build_backend(&config).unwrap().unwrap();
        assert_eq!(remote.name(), "openai");
    }

    #[test]
    fn test_request_serializes_task_tag() {
        let request = CompletionRequest::new(CompletionTask::ImageCuration, "pick images")
            .with_context(serde_json::json!({"candidates": []}));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["task"], "image_curation");
        assert!(value["context"]["candidates"].is_array());
    }
}
