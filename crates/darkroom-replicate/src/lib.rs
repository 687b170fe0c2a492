//! Replicate model calls for the Darkroom proxy
//!
//! [`ReplicateClient`] speaks the predictions API; [`ResilientCaller`] wraps
//! any [`Predictor`] with retries, the safety prompt rewrite and output
//! normalization.

#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod caller;
mod client;
mod error;
mod output;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use caller::{GenerationOutcome, PredictionInput, ResilientCaller, RetryPolicy};
pub use client::ReplicateClient;
pub use error::{ErrorKind, ReplicateError, Result, classify};
pub use output::extract_image_url;

/// Something that can run a model prediction and return its raw output
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Run `model` (`owner/name`) with `input` and return its output value
    async fn predict(&self, model: &str, input: &Value) -> Result<Value>;
}

/// Build the production caller from configuration
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed
pub fn build_caller(config: &darkroom_config::ReplicateConfig) -> anyhow::Result<ResilientCaller> {
    let client = ReplicateClient::new(config)?;

    if config.api_token.is_none() {
        tracing::warn!("REPLICATE_API_TOKEN is not set; model routes will fail until it is configured");
    }

    Ok(ResilientCaller::new(Arc::new(client), RetryPolicy::from(&config.retry)))
}
