use std::{sync::Arc, time::Duration};

use darkroom_config::RetryConfig;
use serde_json::{Map, Value};

use crate::{
    Predictor,
    error::{ErrorKind, ReplicateError, Result},
    output::extract_image_url,
};

/// Model input: the prompt plus model-specific fields
///
/// The prompt is kept apart so the caller can rewrite it between attempts
/// without touching image inputs or parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionInput {
    pub prompt: String,
    pub fields: Map<String, Value>,
}

impl PredictionInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            fields: Map::new(),
        }
    }

    /// Add a model parameter
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    /// Full input object sent to the model, using `prompt` as the prompt
    pub fn render(&self, prompt: &str) -> Value {
        let mut input = self.fields.clone();
        input.insert("prompt".to_owned(), Value::String(prompt.to_owned()));
        Value::Object(input)
    }
}

/// Successful generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// Normalized image URL from the model output
    pub image_url: String,
    /// Raw model output
    pub output: Value,
    /// Predictor calls made, including the safety rewrite
    pub attempts: u32,
    /// Whether the prompt had to be rewritten after a safety rejection
    pub prompt_rewritten: bool,
}

/// Retry limits and the safety-rewrite switch
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub safety_rewrite: bool,
    pub safety_suffix: String,
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based); linear, no jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_step: config.backoff_step,
            safety_rewrite: config.safety_rewrite,
            safety_suffix: config.safety_suffix.clone(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Runs model calls with bounded retries
///
/// - timeouts and network failures are retried after `attempt * backoff_step`
///   until `max_attempts` is used up
/// - a content-safety rejection is retried once with the safety suffix
///   appended to the prompt; that retry does not use up an attempt
/// - anything else fails immediately
#[derive(Clone)]
pub struct ResilientCaller {
    predictor: Arc<dyn Predictor>,
    policy: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(predictor: Arc<dyn Predictor>, policy: RetryPolicy) -> Self {
        Self { predictor, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generate an image with `model`, returning its normalized URL
    pub async fn call(&self, model: &str, input: &PredictionInput) -> Result<GenerationOutcome> {
        let mut prompt = input.prompt.clone();
        let mut prompt_rewritten = false;
        let mut attempt: u32 = 1;
        let mut calls: u32 = 0;

        loop {
            calls += 1;
            tracing::debug!(model, attempt, max_attempts = self.policy.max_attempts, "calling model");

            let result = self
                .predictor
                .predict(model, &input.render(&prompt))
                .await
                .and_then(|output| extract_image_url(&output).map(|image_url| (image_url, output)));

            let error = match result {
                Ok((image_url, output)) => {
                    tracing::info!(model, attempts = calls, prompt_rewritten, "generation succeeded");
                    return Ok(GenerationOutcome {
                        image_url,
                        output,
                        attempts: calls,
                        prompt_rewritten,
                    });
                }
                Err(error) => error,
            };

            match error.kind() {
                ErrorKind::SafetyRejected if self.policy.safety_rewrite && !prompt_rewritten => {
                    tracing::warn!(model, error = %error, "safety rejection, retrying with rewritten prompt");
                    prompt.push_str(&self.policy.safety_suffix);
                    prompt_rewritten = true;
                }
                kind if kind.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        model,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                kind if kind.is_transient() => {
                    tracing::error!(model, attempts = attempt, error = %error, "retries exhausted");
                    return Err(ReplicateError::Exhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    });
                }
                _ => {
                    tracing::error!(model, error = %error, "generation failed");
                    return Err(error);
                }
            }
        }
    }
}

impl std::fmt::Debug for ResilientCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientCaller")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
