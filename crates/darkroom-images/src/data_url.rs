//! `data:<mime>;base64,<payload>` parsing, building and MIME sniffing

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};

use crate::error::{ReferenceError, Result};

/// Fallback MIME when nothing better is known
pub const DEFAULT_MIME: &str = "image/jpeg";

/// Base64 prefixes of common image magic bytes
pub(crate) const BASE64_SIGNATURES: &[(&str, &str)] = &[
    ("/9j/", "image/jpeg"),
    ("iVBORw0KGgo", "image/png"),
    ("R0lGOD", "image/gif"),
    ("UklGR", "image/webp"),
];

/// Standard alphabet, tolerant of missing padding
pub const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Borrowed view of a parsed data URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    pub mime: &'a str,
    pub payload: &'a str,
}

impl<'a> DataUrl<'a> {
    /// Parse a base64 data URL
    ///
    /// An empty media type is read as `image/jpeg`.
    pub fn parse(input: &'a str) -> Result<Self> {
        let rest = input
            .strip_prefix("data:")
            .ok_or_else(|| ReferenceError::InvalidDataUrl("missing 'data:' prefix".to_owned()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ReferenceError::InvalidDataUrl("missing ',' separator".to_owned()))?;

        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| ReferenceError::InvalidDataUrl("only base64 data URLs are supported".to_owned()))?;

        if payload.is_empty() {
            return Err(ReferenceError::InvalidDataUrl("empty payload".to_owned()));
        }

        Ok(Self {
            mime: if mime.is_empty() { DEFAULT_MIME } else { mime },
            payload,
        })
    }

    /// Decode the payload
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_base64(self.payload)
    }
}

/// Build `data:<mime>;base64,<payload>`
pub fn to_data_url(mime: &str, payload: &str) -> String {
    format!("data:{mime};base64,{payload}")
}

/// Encode bytes as a data URL
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    to_data_url(mime, &LENIENT_BASE64.encode(bytes))
}

/// Decode a base64 payload, ignoring surrounding whitespace
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    LENIENT_BASE64
        .decode(payload.trim())
        .map_err(|e| ReferenceError::InvalidBase64(e.to_string()))
}

/// MIME type implied by the first characters of a base64 payload
pub fn mime_from_base64(payload: &str) -> Option<&'static str> {
    BASE64_SIGNATURES
        .iter()
        .find(|(signature, _)| payload.starts_with(signature))
        .map(|(_, mime)| *mime)
}

/// MIME type from the magic bytes of decoded content
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
}

/// File extension for an image MIME type
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime.split(';').next().unwrap_or_default().trim() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/heic" => "heic",
        "image/svg+xml" => "svg",
        _ => "jpg",
    }
}
