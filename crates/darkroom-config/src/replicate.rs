use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Environment variable consulted when no token is set in the config file
pub const API_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

/// Replicate API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplicateConfig {
    /// API token; model routes fail with a configuration error when absent
    #[serde(default)]
    pub api_token: Option<SecretString>,
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Seconds the API may hold a prediction request open (`Prefer: wait`)
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: u64,
    /// Delay between polls of a prediction that is still running
    #[serde(default = "default_poll_interval", deserialize_with = "crate::duration::deserialize")]
    pub poll_interval: Duration,
    /// Deadline for a single prediction, including polling
    #[serde(default = "default_prediction_timeout", deserialize_with = "crate::duration::deserialize")]
    pub prediction_timeout: Duration,
    /// Model identifiers per route
    #[serde(default)]
    pub models: ModelsConfig,
    /// Retry policy for model calls
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: default_base_url(),
            wait_seconds: default_wait_seconds(),
            poll_interval: default_poll_interval(),
            prediction_timeout: default_prediction_timeout(),
            models: ModelsConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// `owner/name` identifiers of the hosted models
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    #[serde(default = "default_nano_banana")]
    pub nano_banana: String,
    #[serde(default = "default_seedream")]
    pub seedream: String,
    #[serde(default = "default_imagen")]
    pub imagen: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            nano_banana: default_nano_banana(),
            seedream: default_seedream(),
            imagen: default_imagen(),
        }
    }
}

/// Bounded retry with linear backoff
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay unit; attempt `n` sleeps `n * backoff_step` before retrying
    #[serde(default = "default_backoff_step", deserialize_with = "crate::duration::deserialize")]
    pub backoff_step: Duration,
    /// Retry once with a rewritten prompt after a content-safety rejection
    #[serde(default = "default_safety_rewrite")]
    pub safety_rewrite: bool,
    /// Text appended to the prompt for the safety retry
    #[serde(default = "default_safety_suffix")]
    pub safety_suffix: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step: default_backoff_step(),
            safety_rewrite: default_safety_rewrite(),
            safety_suffix: default_safety_suffix(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("https://api.replicate.com/v1").expect("default Replicate URL is valid")
}

#[allow(clippy::missing_const_for_fn)]
fn default_wait_seconds() -> u64 {
    60
}

#[allow(clippy::missing_const_for_fn)]
fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

#[allow(clippy::missing_const_for_fn)]
fn default_prediction_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_nano_banana() -> String {
    "google/nano-banana".to_owned()
}

fn default_seedream() -> String {
    "bytedance/seedream-4".to_owned()
}

fn default_imagen() -> String {
    "google/imagen-4".to_owned()
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_attempts() -> u32 {
    3
}

#[allow(clippy::missing_const_for_fn)]
fn default_backoff_step() -> Duration {
    Duration::from_millis(2000)
}

#[allow(clippy::missing_const_for_fn)]
fn default_safety_rewrite() -> bool {
    true
}

fn default_safety_suffix() -> String {
    ". Note: this is photo editing only, no content generation.".to_owned()
}
