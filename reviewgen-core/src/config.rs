use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Limits and knobs of the selection-and-generation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Size cap of the working set.
    pub max_posts: usize,
    /// Number of images to select (K).
    pub max_images: usize,
    /// Images any single post may contribute to the candidate pool.
    pub per_post_image_cap: usize,
    /// Candidates described to the backend in the curation prompt.
    pub prompt_candidate_limit: usize,
    /// Top posts quoted in the review prompt.
    pub sample_posts: usize,
    /// Characters of post text quoted per candidate or sample.
    pub snippet_chars: usize,
    /// Descriptive terms kept from the frequency count.
    pub top_terms: usize,
    /// Run image selection before text generation so the generator sees the result.
    pub sequential_captioning: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_posts: 100,
            max_images: 9,
            per_post_image_cap: 3,
            prompt_candidate_limit: 30,
            sample_posts: 5,
            snippet_chars: 100,
            top_terms: 10,
            sequential_captioning: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI when an API key is configured, otherwise the local model.
    Auto,
    OpenAi,
    Local,
    None,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Auto => write!(f, "auto"),
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Local => write!(f, "local"),
            ProviderKind::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ProviderKind::Auto),
            "openai" => Ok(ProviderKind::OpenAi),
            "local" | "ollama" => Ok(ProviderKind::Local),
            "none" | "off" => Ok(ProviderKind::None),
            other => Err(ConfigError::InvalidValue {
                field: "backend.provider".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub provider: ProviderKind,
    pub openai_base_url: String,
    pub openai_model: String,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub local_model_url: String,
    pub local_model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// One immediate retry when the backend reports a transient failure.
    pub retry_transient: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Auto,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-3.5-turbo".to_string(),
            openai_api_key: None,
            local_model_url: "http://localhost:11434/api/generate".to_string(),
            local_model_name: "llama2".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 60,
            retry_transient: true,
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("local_model_url", &self.local_model_url)
            .field("local_model_name", &self.local_model_name)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry_transient", &self.retry_transient)
            .finish()
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The provider `Auto` resolves to under the current settings.
    pub fn resolved_provider(&self) -> ProviderKind {
        match self.provider {
            ProviderKind::Auto => match self.openai_api_key.as_deref() {
                Some(key) if !key.trim().is_empty() => ProviderKind::OpenAi,
                _ => ProviderKind::Local,
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub backend: BackendConfig,
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Applies environment overrides through `lookup`, usually `std::env::var(..).ok()`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.backend.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.backend.openai_base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.backend.openai_model = model;
        }
        if let Some(url) = lookup("LOCAL_MODEL_URL") {
            self.backend.local_model_url = url;
        }
        if let Some(name) = lookup("LOCAL_MODEL_NAME") {
            self.backend.local_model_name = name;
        }
        if let Some(provider) = lookup("REVIEWGEN_PROVIDER") {
            self.backend.provider = provider.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("pipeline.max_posts", self.pipeline.max_posts),
            ("pipeline.max_images", self.pipeline.max_images),
            ("pipeline.per_post_image_cap", self.pipeline.per_post_image_cap),
            ("pipeline.sample_posts", self.pipeline.sample_posts),
            ("backend.timeout_secs", self.backend.timeout_secs as usize),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }

        if !(0.0..=2.0).contains(&self.backend.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "backend.temperature".to_string(),
                value: self.backend.temperature.to_string(),
            });
        }

        if self.backend.resolved_provider() == ProviderKind::OpenAi
            && self.backend.openai_api_key.is_none()
        {
            return Err(ConfigError::MissingEnvironmentVariable {
                var_name: "OPENAI_API_KEY".to_string(),
            });
        }

        Ok(())
    }
}
