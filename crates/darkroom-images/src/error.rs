use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReferenceError>;

/// Longest slice of the offending input echoed back in error messages
const ECHO_LIMIT: usize = 50;

/// Failures while classifying or resolving an image reference
///
/// All of these are client input problems and map to `400`, except a
/// missing temp image which the routes report as `404` on direct lookups
/// and an oversized image which maps to `413`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// `blob:` URLs only exist inside the browser that created them
    #[error("Blob URLs are not supported. Please upload the image first.")]
    BlobUrl,

    /// A local temp image link whose entry is absent or evicted
    #[error("Temp image not found: {0}")]
    TempImageNotFound(String),

    /// Malformed `data:` URL
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// Payload that is not decodable base64
    #[error("Invalid base64 image data: {0}")]
    InvalidBase64(String),

    /// Payload bigger than the temp store's byte budget
    #[error("Image is too large to store: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    /// Nothing in the repair ladder could make sense of the input
    #[error("Invalid image reference: \"{0}\"")]
    Unrecognized(String),
}

impl ReferenceError {
    /// Build an `Unrecognized` error echoing the start of the input
    pub fn unrecognized(input: &str) -> Self {
        Self::Unrecognized(input.chars().take(ECHO_LIMIT).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_echoes_bounded_prefix() {
        let long = "x".repeat(200);
        let ReferenceError::Unrecognized(prefix) = ReferenceError::unrecognized(&long) else {
            panic!("wrong variant");
        };
        assert_eq!(prefix.len(), ECHO_LIMIT);
    }
}
