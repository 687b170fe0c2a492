use darkroom_config::FetchConfig;
use darkroom_images::{DataUrl, ImageNormalizer, ReferenceError, data_url};
use http::{StatusCode, header::CONTENT_TYPE};
use reqwest::Client;

use crate::error::{ApiError, Result};

/// Image bytes with their content type
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Loads images for the conversion, download and caching routes
///
/// Data URLs and this proxy's own temp image links are answered locally;
/// everything else is downloaded.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    normalizer: ImageNormalizer,
    max_bytes: u64,
}

impl ImageFetcher {
    pub fn new(config: &FetchConfig, normalizer: ImageNormalizer) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build image fetch client: {e}"))?;

        Ok(Self {
            client,
            normalizer,
            max_bytes: config.max_bytes,
        })
    }

    pub async fn fetch(&self, reference: &str) -> Result<FetchedImage> {
        let reference = reference.trim();

        if reference.starts_with("blob:") {
            return Err(ReferenceError::BlobUrl.into());
        }

        if reference.starts_with("data:") {
            let parsed = DataUrl::parse(reference)?;
            return Ok(FetchedImage {
                bytes: parsed.decode()?,
                mime: parsed.mime.to_owned(),
            });
        }

        if let Some(id) = self.normalizer.context().temp_image_id(reference) {
            let entry = self
                .normalizer
                .store()
                .get(id)
                .ok_or_else(|| ReferenceError::TempImageNotFound(id.to_owned()))?;
            return Ok(FetchedImage {
                bytes: entry.bytes()?,
                mime: entry.mime.clone(),
            });
        }

        let lower = reference.to_ascii_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return Err(ApiError::BadRequest(format!("Only http(s) image URLs can be fetched: {reference}")));
        }

        self.download(reference).await
    }

    async fn download(&self, url: &str) -> Result<FetchedImage> {
        tracing::debug!(url, "fetching remote image");

        let mut response = self.client.get(url).send().await.map_err(|e| {
            tracing::warn!(url, error = %e, "image fetch failed");
            transport_error(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Fetch {
                status: StatusCode::BAD_GATEWAY,
                message: format!("Failed to fetch image: upstream returned {status}"),
            });
        }

        let header_mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase());

        if let Some(length) = response.content_length()
            && length > self.max_bytes
        {
            tracing::warn!(url, length, limit = self.max_bytes, "remote image exceeds fetch limit");
            return Err(too_large(self.max_bytes));
        }

        // Content-Length may be absent or wrong, so the streamed body is capped too
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| transport_error(&e))? {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                tracing::warn!(url, limit = self.max_bytes, "remote image body exceeds fetch limit");
                return Err(too_large(self.max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }

        let mime = header_mime
            .filter(|mime| mime.starts_with("image/"))
            .or_else(|| data_url::sniff_mime(&bytes).map(str::to_owned))
            .unwrap_or_else(|| data_url::DEFAULT_MIME.to_owned());

        Ok(FetchedImage { bytes, mime })
    }
}

fn too_large(limit: u64) -> ApiError {
    ApiError::Fetch {
        status: StatusCode::BAD_GATEWAY,
        message: format!("Failed to fetch image: remote image exceeds {limit} bytes"),
    }
}

fn transport_error(error: &reqwest::Error) -> ApiError {
    let status = if error.is_timeout() {
        StatusCode::REQUEST_TIMEOUT
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    ApiError::Fetch {
        status,
        message: format!("Failed to fetch image: {error}"),
    }
}
