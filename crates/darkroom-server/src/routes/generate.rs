use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use darkroom_replicate::{GenerationOutcome, PredictionInput};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ImageInputs, aspect, present};
use crate::{
    error::{ApiError, Result},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct NanoBananaRequest {
    prompt: Option<String>,
    image_input: Option<ImageInputs>,
    output_format: Option<String>,
    hotspot: Option<Hotspot>,
}

/// Point of interest in percent of image width and height
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Hotspot {
    x: f64,
    y: f64,
}

impl Hotspot {
    fn validate(self) -> Result<Self> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if in_range(self.x) && in_range(self.y) {
            Ok(self)
        } else {
            Err(ApiError::BadRequest(
                "Hotspot coordinates must be between 0 and 100".to_owned(),
            ))
        }
    }

    fn instruction(self) -> String {
        format!(
            " Focus the edit on the area around {:.0}% from the left and {:.0}% from the top of the image.",
            self.x, self.y
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    success: bool,
    image_url: String,
    data: Value,
}

/// Edit one or more images with Nano Banana
pub async fn nano_banana(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NanoBananaRequest>, JsonRejection>,
) -> Result<Json<EditResponse>> {
    let Json(request) = payload?;

    let images = request.image_input.map(ImageInputs::into_vec).unwrap_or_default();
    let (Some(mut prompt), false) = (present(request.prompt), images.is_empty()) else {
        return Err(ApiError::BadRequest(
            "Missing required fields: prompt and image_input".to_owned(),
        ));
    };

    if let Some(hotspot) = request.hotspot {
        prompt.push_str(&hotspot.validate()?.instruction());
    }

    let output_format = match request.output_format.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "png",
        _ => "jpg",
    };

    let image_input = state.normalizer.normalize_all(&images)?;
    tracing::info!(images = image_input.len(), output_format, "nano-banana edit requested");

    let input = PredictionInput::new(prompt)
        .with("image_input", image_input)
        .with("output_format", output_format);

    let GenerationOutcome { image_url, output, .. } = state.caller.call(&state.models.nano_banana, &input).await?;

    Ok(Json(EditResponse {
        success: true,
        image_url,
        data: output,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SeedreamRequest {
    prompt: Option<String>,
    aspect_ratio: Option<String>,
    image_input: Option<ImageInputs>,
    object_image: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedreamResponse {
    success: bool,
    image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_url: Option<String>,
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

/// Generate or compose with Seedream-4, caching the result locally
pub async fn seedream(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SeedreamRequest>, JsonRejection>,
) -> Result<Json<SeedreamResponse>> {
    let Json(request) = payload?;

    let Some(prompt) = present(request.prompt) else {
        return Err(ApiError::BadRequest("Missing required field: prompt".to_owned()));
    };

    let mut images = request.image_input.map(ImageInputs::into_vec).unwrap_or_default();
    images.extend(present(request.object_image));
    let image_input = state.normalizer.normalize_all(&images)?;

    let aspect_ratio = aspect::seedream_ratio(request.aspect_ratio.as_deref(), !image_input.is_empty());
    let size = aspect::seedream_size(request.size.as_deref());
    tracing::info!(images = image_input.len(), aspect_ratio, size, "seedream generation requested");

    let mut input = PredictionInput::new(prompt)
        .with("aspect_ratio", aspect_ratio)
        .with("size", size)
        .with("max_images", 1)
        .with("sequential_image_generation", "disabled");
    if !image_input.is_empty() {
        input = input.with("image_input", image_input);
    }

    let GenerationOutcome { image_url, output, .. } = state.caller.call(&state.models.seedream, &input).await?;

    let response = match cache_output(&state, &image_url).await {
        Ok(local_url) => SeedreamResponse {
            success: true,
            image_url: local_url,
            original_url: Some(image_url),
            data: output,
            warning: None,
        },
        Err(error) => {
            tracing::warn!(url = %image_url, error = %error, "could not cache generated image");
            SeedreamResponse {
                success: true,
                image_url,
                original_url: None,
                data: output,
                warning: Some(format!("Image could not be cached locally: {error}")),
            }
        }
    };

    Ok(Json(response))
}

/// Copy a generated image into the temp store and return its local link
async fn cache_output(state: &AppState, remote_url: &str) -> Result<String> {
    let image = state.fetcher.fetch(remote_url).await?;
    let id = state.store().put_bytes(&image.bytes, image.mime, None)?;
    Ok(state.context().temp_image_url(&id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagenRequest {
    prompt: Option<String>,
    aspect_ratio: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagenResponse {
    success: bool,
    image_url: String,
    model: String,
    prompt: String,
    aspect_ratio: &'static str,
}

/// Text-to-image with Imagen-4
pub async fn imagen(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ImagenRequest>, JsonRejection>,
) -> Result<Json<ImagenResponse>> {
    let Json(request) = payload?;

    let Some(prompt) = present(request.prompt) else {
        return Err(ApiError::BadRequest("Missing required field: prompt".to_owned()));
    };

    let aspect_ratio = aspect::imagen_ratio(request.aspect_ratio.as_deref());
    tracing::info!(aspect_ratio, "imagen generation requested");

    let input = PredictionInput::new(prompt.clone())
        .with("aspect_ratio", aspect_ratio)
        .with("safety_filter_level", "block_only_high")
        .with("output_format", "jpg");

    let outcome = state.caller.call(&state.models.imagen, &input).await?;

    Ok(Json(ImagenResponse {
        success: true,
        image_url: outcome.image_url,
        model: state.models.imagen.clone(),
        prompt,
        aspect_ratio,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hotspot_bounds() {
        assert!(Hotspot { x: 0.0, y: 100.0 }.validate().is_ok());
        assert!(Hotspot { x: -1.0, y: 50.0 }.validate().is_err());
        assert!(Hotspot { x: 50.0, y: 100.5 }.validate().is_err());
        assert!(Hotspot { x: f64::NAN, y: 50.0 }.validate().is_err());
    }

    #[test]
    fn hotspot_instruction_mentions_coordinates() {
        let text = Hotspot { x: 25.4, y: 70.0 }.instruction();
        assert!(text.contains("25% from the left"));
        assert!(text.contains("70% from the top"));
    }

    #[test]
    fn image_input_accepts_string_or_array() {
        let one: NanoBananaRequest =
            serde_json::from_str(r#"{"prompt":"p","image_input":"https://example.com/a.png"}"#).unwrap();
        assert_eq!(one.image_input.unwrap().into_vec().len(), 1);

        let many: NanoBananaRequest =
            serde_json::from_str(r#"{"prompt":"p","image_input":["a","", "b"]}"#).unwrap();
        assert_eq!(many.image_input.unwrap().into_vec(), vec!["a", "b"]);
    }
}
