use std::time::Duration;

use async_trait::async_trait;
use darkroom_config::ReplicateConfig;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::{
    Predictor,
    error::{ReplicateError, Result},
};

/// HTTP client for the Replicate predictions API
pub struct ReplicateClient {
    client: Client,
    api_token: Option<SecretString>,
    base_url: String,
    wait_seconds: u64,
    poll_interval: Duration,
    prediction_timeout: Duration,
}

impl ReplicateClient {
    /// Build a client from configuration
    ///
    /// A missing token is not an error here; calls fail with
    /// [`ReplicateError::MissingToken`] instead so the proxy can still serve
    /// its non-model routes.
    pub fn new(config: &ReplicateConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.prediction_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build Replicate HTTP client: {e}"))?;

        Ok(Self {
            client,
            api_token: config.api_token.clone(),
            base_url: config.base_url.as_str().trim_end_matches('/').to_owned(),
            wait_seconds: config.wait_seconds,
            poll_interval: config.poll_interval,
            prediction_timeout: config.prediction_timeout,
        })
    }

    fn token(&self) -> Result<&SecretString> {
        self.api_token
            .as_ref()
            .filter(|token| !token.expose_secret().is_empty())
            .ok_or(ReplicateError::MissingToken)
    }

    /// Fetch the latest state of a running prediction
    async fn poll(&self, prediction: &Prediction) -> Result<Prediction> {
        let url = prediction
            .urls
            .as_ref()
            .and_then(|urls| urls.get.clone())
            .unwrap_or_else(|| format!("{}/predictions/{}", self.base_url, prediction.id));

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?.expose_secret())
            .send()
            .await?;

        read_prediction(response).await
    }
}

/// Wire format for creating a prediction
#[derive(Serialize)]
struct CreatePrediction<'a> {
    input: &'a Value,
}

/// Wire format of a prediction object
#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl Prediction {
    fn error_message(&self) -> String {
        match &self.error {
            Some(Value::String(message)) => message.clone(),
            Some(Value::Null) | None => "Prediction failed without an error message".to_owned(),
            Some(other) => other.to_string(),
        }
    }
}

#[async_trait]
impl Predictor for ReplicateClient {
    async fn predict(&self, model: &str, input: &Value) -> Result<Value> {
        let url = format!("{}/models/{model}/predictions", self.base_url);
        let deadline = Instant::now() + self.prediction_timeout;

        tracing::debug!(model, "creating prediction");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token()?.expose_secret())
            .header("Prefer", format!("wait={}", self.wait_seconds))
            .json(&CreatePrediction { input })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(model, error = %e, "prediction request failed");
                ReplicateError::from(e)
            })?;

        let mut prediction = read_prediction(response).await?;

        loop {
            match prediction.status {
                PredictionStatus::Succeeded => {
                    tracing::debug!(model, prediction_id = %prediction.id, "prediction succeeded");
                    return prediction
                        .output
                        .filter(|output| !output.is_null())
                        .ok_or_else(|| ReplicateError::UnexpectedOutput("prediction produced no output".to_owned()));
                }
                PredictionStatus::Failed => {
                    let message = prediction.error_message();
                    tracing::warn!(model, prediction_id = %prediction.id, error = %message, "prediction failed");
                    return Err(ReplicateError::from_message(message));
                }
                PredictionStatus::Canceled => {
                    return Err(ReplicateError::Upstream {
                        status: None,
                        message: format!("Prediction {} was canceled", prediction.id),
                    });
                }
                PredictionStatus::Starting | PredictionStatus::Processing | PredictionStatus::Unknown => {
                    if Instant::now() + self.poll_interval > deadline {
                        return Err(ReplicateError::Timeout(format!(
                            "Prediction {} did not finish within {}s",
                            prediction.id,
                            self.prediction_timeout.as_secs()
                        )));
                    }

                    tokio::time::sleep(self.poll_interval).await;
                    prediction = self.poll(&prediction).await?;
                }
            }
        }
    }
}

/// Decode a prediction, mapping error responses to typed errors
async fn read_prediction(response: Response) -> Result<Prediction> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_owned());
        let message = error_detail(&body);

        tracing::error!(status = %status, error = %message, "Replicate API error");

        return Err(ReplicateError::from_status(status.as_u16(), message));
    }

    Ok(response.json::<Prediction>().await?)
}

/// Replicate reports problems as `{"title": ..., "detail": ...}`
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_owned())
}
