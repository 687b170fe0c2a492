//! Aspect ratio tables per model

/// Friendly names the front-end sends instead of ratios
const ALIASES: &[(&str, &str)] = &[
    ("square", "1:1"),
    ("landscape", "16:9"),
    ("portrait", "9:16"),
    ("wide", "21:9"),
];

const SEEDREAM_RATIOS: &[&str] = &[
    "1:1",
    "4:3",
    "3:4",
    "16:9",
    "9:16",
    "3:2",
    "2:3",
    "21:9",
    "match_input_image",
];

const IMAGEN_RATIOS: &[&str] = &["1:1", "9:16", "16:9", "3:4", "4:3"];

const SEEDREAM_SIZES: &[&str] = &["1K", "2K", "4K"];

/// Aspect ratio for Seedream-4
///
/// Defaults to matching the input image when there is one, square otherwise.
pub fn seedream_ratio(requested: Option<&str>, has_images: bool) -> &'static str {
    let fallback = if has_images { "match_input_image" } else { "1:1" };
    lookup(requested, SEEDREAM_RATIOS).unwrap_or(fallback)
}

/// Aspect ratio for Imagen-4, square unless a supported ratio is requested
pub fn imagen_ratio(requested: Option<&str>) -> &'static str {
    lookup(requested, IMAGEN_RATIOS).unwrap_or("1:1")
}

/// Output size for Seedream-4
pub fn seedream_size(requested: Option<&str>) -> &'static str {
    requested
        .map(str::trim)
        .and_then(|size| {
            SEEDREAM_SIZES
                .iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(size))
        })
        .copied()
        .unwrap_or("2K")
}

fn lookup(requested: Option<&str>, supported: &[&'static str]) -> Option<&'static str> {
    let requested = requested?.trim();
    if requested.is_empty() {
        return None;
    }

    let lowered = requested.to_ascii_lowercase();
    let ratio = ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map_or(lowered.as_str(), |(_, ratio)| *ratio);

    let found = supported.iter().find(|candidate| **candidate == ratio).copied();
    if found.is_none() {
        tracing::debug!(requested, "unsupported aspect ratio, using default");
    }
    found
}
