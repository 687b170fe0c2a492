mod aspect;
mod generate;
mod images;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Deserialize;

use crate::state::AppState;

/// All proxy routes except the health check
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/nano-banana", post(generate::nano_banana))
        .route("/api/seedream-4", post(generate::seedream))
        .route("/api/imagen4-generate", post(generate::imagen))
        .route("/api/upload-image", post(images::upload))
        .route("/api/url-to-base64", post(images::url_to_base64))
        .route("/api/fetch-image", get(images::fetch_image))
        .route("/temp-images/{image_id}", get(images::temp_image))
        .route("/download-image", get(images::download))
}

/// One image reference or a list of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ImageInputs {
    One(String),
    Many(Vec<String>),
}

impl ImageInputs {
    /// Non-blank references in request order
    pub(crate) fn into_vec(self) -> Vec<String> {
        let all = match self {
            Self::One(single) => vec![single],
            Self::Many(many) => many,
        };
        all.into_iter().filter(|input| !input.trim().is_empty()).collect()
    }
}

/// Treat blank strings like missing fields
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
