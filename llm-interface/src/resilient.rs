use crate::{AiBackend, CompletionRequest};
use async_trait::async_trait;
use reviewgen_core::{BackendConfig, BackendError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Timeout and retry behaviour around a single backend call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Upper bound for one attempt
    pub timeout: Duration,
    /// Attempts in total; 2 means one immediate retry
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_attempts: 2,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_attempts: if config.retry_transient { 2 } else { 1 },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry immediately
    Retry,
    /// Don't retry, let the caller degrade
    NoRetry,
}

/// Only connection-level and overload failures get a second attempt.
pub fn get_retry_strategy(error: &BackendError) -> RetryStrategy {
    match error {
        BackendError::Unavailable { .. } => RetryStrategy::Retry,
        BackendError::Timeout { .. } => RetryStrategy::NoRetry,
        BackendError::Error { .. } => RetryStrategy::NoRetry,
    }
}

/// Wraps any backend with a per-attempt timeout and at most one retry.
pub struct ResilientBackend {
    inner: Arc<dyn AiBackend>,
    policy: RetryPolicy,
}

impl ResilientBackend {
    pub fn new(inner: Arc<dyn AiBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        match timeout(self.policy.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                seconds: self.policy.timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl AiBackend for ResilientBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let start_time = Instant::now();

            match self.attempt(request).await {
                Ok(text) => {
                    if attempt > 1 {
                        info!(
                            "Backend '{}' succeeded on attempt {} for {:?}",
                            self.inner.name(),
                            attempt,
                            request.task
                        );
                    }
                    return Ok(text);
                }
                Err(error) => {
                    debug!(
                        "Attempt {} of {:?} on '{}' failed after {:?}: {}",
                        attempt,
                        request.task,
                        self.inner.name(),
                        start_time.elapsed(),
                        error
                    );

                    let strategy = get_retry_strategy(&error);
                    if strategy == RetryStrategy::Retry && attempt < max_attempts {
                        info!("Retrying {:?} immediately due to: {}", request.task, error);
                        continue;
                    }

                    warn!(
                        "Backend '{}' gave up on {:?} after {} attempt(s): {}",
                        self.inner.name(),
                        request.task,
                        attempt,
                        error
                    );
                    return Err(error);
                }
            }
        }
    }
}
