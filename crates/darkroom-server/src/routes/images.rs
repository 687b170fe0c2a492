use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::header,
    response::{IntoResponse, Response},
};
use darkroom_images::{DataUrl, data_url};
use serde::{Deserialize, Serialize};

use super::present;
use crate::{
    error::{ApiError, Result},
    state::AppState,
};

/// Browser cache lifetime for proxied images
const PROXY_CACHE_CONTROL: &str = "public, max-age=3600";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    image_data: Option<String>,
    file_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    success: bool,
    image_url: String,
    image_id: String,
}

/// Keep a data URL in the temp store and hand back a fetchable link
pub async fn upload(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>> {
    let Json(request) = payload?;

    let Some(image_data) = present(request.image_data) else {
        return Err(ApiError::BadRequest("No image data provided".to_owned()));
    };

    let parsed = DataUrl::parse(image_data.trim())?;
    parsed.decode()?;

    let image_id = state
        .store()
        .put(parsed.payload, parsed.mime, present(request.file_name))?;
    let image_url = state.context().temp_image_url(&image_id);
    tracing::info!(image_id = %image_id, mime = parsed.mime, stored = state.store().len(), "image uploaded");

    Ok(Json(UploadResponse {
        success: true,
        image_url,
        image_id,
    }))
}

/// Serve a stored image as raw bytes
pub async fn temp_image(State(state): State<AppState>, Path(image_id): Path<String>) -> Result<Response> {
    let Some(entry) = state.store().get(&image_id) else {
        return Err(ApiError::NotFound(format!("Image not found: {image_id}")));
    };

    let bytes = entry.bytes()?;
    Ok(([(header::CONTENT_TYPE, entry.mime.clone())], bytes).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlToBase64Request {
    image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UrlToBase64Response {
    success: bool,
    base64: String,
}

/// Convert any image reference into a data URL
pub async fn url_to_base64(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UrlToBase64Request>, JsonRejection>,
) -> Result<Json<UrlToBase64Response>> {
    let Json(request) = payload?;

    let Some(image_url) = present(request.image_url) else {
        return Err(ApiError::BadRequest("Missing required field: imageUrl".to_owned()));
    };

    let image = state.fetcher.fetch(&image_url).await?;

    Ok(Json(UrlToBase64Response {
        success: true,
        base64: data_url::encode_data_url(&image.mime, &image.bytes),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    url: Option<String>,
    filename: Option<String>,
}

impl ImageQuery {
    fn url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Missing required parameter: url".to_owned()))
    }
}

/// Re-serve an image as a file download
pub async fn download(
    State(state): State<AppState>,
    query: std::result::Result<Query<ImageQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query?;

    let image = state.fetcher.fetch(query.url()?).await?;
    let filename = query
        .filename
        .as_deref()
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("edited-image.{}", data_url::extension_for_mime(&image.mime)));

    tracing::debug!(filename = %filename, bytes = image.bytes.len(), "serving download");

    Ok((
        [
            (header::CONTENT_TYPE, image.mime),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        image.bytes,
    )
        .into_response())
}

/// Proxy an image so the browser can read it without CORS restrictions
pub async fn fetch_image(
    State(state): State<AppState>,
    query: std::result::Result<Query<ImageQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query?;

    let image = state.fetcher.fetch(query.url()?).await?;

    Ok((
        [
            (header::CONTENT_TYPE, image.mime),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_owned()),
            (header::CACHE_CONTROL, PROXY_CACHE_CONTROL.to_owned()),
        ],
        image.bytes,
    )
        .into_response())
}

/// Keep only characters that are safe inside a quoted header value
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    cleaned.trim_matches('.').to_owned()
}
