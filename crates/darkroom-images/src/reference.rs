//! Classification and resolution of client-supplied image references
//!
//! Clients send images in whatever form the browser had at hand: data URLs,
//! CDN links, links to this proxy's own temp images, bare base64 and,
//! occasionally, garbage. [`parse`] picks exactly one [`ImageReference`]
//! variant using ordered rules; [`resolve`] turns it into a string the model
//! API accepts (an `http(s)` URL or a data URL).

use std::sync::Arc;

use base64::Engine;
use url::Url;

use crate::{
    data_url::{BASE64_SIGNATURES, DEFAULT_MIME, LENIENT_BASE64, mime_from_base64, to_data_url},
    error::{ReferenceError, Result},
    store::TempImageStore,
};

/// Path segment under which temp images are served
pub const TEMP_IMAGE_PATH: &str = "/temp-images/";

/// Hosts whose links are accepted even without a scheme
const EXTERNAL_HOST_MARKERS: &[&str] = &[
    "replicate.delivery",
    "firebasestorage.googleapis.com",
    "storage.googleapis.com",
];

/// Shortest run of base64 characters treated as an embedded payload
const MIN_BASE64_RUN: usize = 100;

/// A classified image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Already a `data:` URL; passed through unchanged
    DataUrl(String),
    /// Fetchable `http(s)` link
    ExternalUrl(String),
    /// Id of an image held in the temp store
    LocalTempRef(String),
    /// Base64 payload recovered from a malformed input
    RawBase64 { mime: &'static str, payload: String },
    /// Unrecognized text, encoded as-is as a last resort
    GuessedText(String),
}

/// Where this proxy's own temp image links live
#[derive(Debug, Clone)]
pub struct ReferenceContext {
    public_base: String,
    local_prefixes: Vec<String>,
}

impl ReferenceContext {
    /// Build from the externally visible base URL (e.g. `http://localhost:3001`)
    ///
    /// When the base points at a loopback name, both `localhost` and
    /// `127.0.0.1` spellings on the same port are recognized.
    pub fn new(public_base: &str) -> Self {
        let public_base = public_base.trim_end_matches('/').to_owned();
        let mut local_prefixes = vec![format!("{public_base}{TEMP_IMAGE_PATH}")];

        if let Ok(url) = Url::parse(&public_base)
            && let Some(host) = url.host_str()
            && matches!(host, "localhost" | "127.0.0.1")
        {
            let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
            for alias in ["localhost", "127.0.0.1"] {
                let prefix = format!("{}://{alias}{port}{TEMP_IMAGE_PATH}", url.scheme());
                if !local_prefixes.contains(&prefix) {
                    local_prefixes.push(prefix);
                }
            }
        }

        Self {
            public_base,
            local_prefixes,
        }
    }

    /// Public link for a temp image id
    pub fn temp_image_url(&self, id: &str) -> String {
        format!("{}{TEMP_IMAGE_PATH}{id}", self.public_base)
    }

    /// Extract the temp image id when `input` is one of our own links
    pub fn temp_image_id<'a>(&self, input: &'a str) -> Option<&'a str> {
        self.local_prefixes
            .iter()
            .find_map(|prefix| input.strip_prefix(prefix.as_str()))
            .map(|rest| rest.split(['?', '#', '/']).next().unwrap_or_default())
            .filter(|id| !id.is_empty())
    }
}

/// Classify an input string; first matching rule wins
///
/// 1. `blob:` is rejected
/// 2. `data:` passes through
/// 3. our own temp image links become [`ImageReference::LocalTempRef`]
/// 4. `http(s)://` or a known storage host passes through
/// 5. anything else goes through the repair ladder
pub fn parse(input: &str, context: &ReferenceContext) -> Result<ImageReference> {
    let candidate = input.trim();

    if candidate.is_empty() {
        return Err(ReferenceError::unrecognized(input));
    }

    if candidate.starts_with("blob:") {
        return Err(ReferenceError::BlobUrl);
    }

    if input.trim_start().starts_with("data:") {
        return Ok(ImageReference::DataUrl(input.trim_start().to_owned()));
    }

    if let Some(id) = context.temp_image_id(candidate) {
        return Ok(ImageReference::LocalTempRef(id.to_owned()));
    }

    if has_http_scheme(candidate) || EXTERNAL_HOST_MARKERS.iter().any(|host| candidate.contains(host)) {
        return Ok(ImageReference::ExternalUrl(candidate.to_owned()));
    }

    Ok(repair(candidate))
}

/// Turn a classified reference into a string the model API accepts
pub fn resolve(reference: &ImageReference, store: &TempImageStore) -> Result<String> {
    match reference {
        ImageReference::DataUrl(url) | ImageReference::ExternalUrl(url) => Ok(url.clone()),
        ImageReference::LocalTempRef(id) => store
            .get(id)
            .map(|entry| entry.data_url())
            .ok_or_else(|| ReferenceError::TempImageNotFound(id.clone())),
        ImageReference::RawBase64 { mime, payload } => Ok(to_data_url(mime, payload)),
        ImageReference::GuessedText(text) => Ok(to_data_url(DEFAULT_MIME, &LENIENT_BASE64.encode(text))),
    }
}

/// Best-effort recovery for inputs matching no recognized form
///
/// The results are guesses: a string that merely contains a signature or a
/// long base64-looking run is assumed to be an image.
fn repair(candidate: &str) -> ImageReference {
    if let Some((mime, payload)) = find_signature(candidate).or_else(|| find_base64_run(candidate)) {
        tracing::warn!(mime, stripped = candidate.len() - payload.len(), "recovered raw base64 image reference");
        return ImageReference::RawBase64 {
            mime,
            payload: payload.to_owned(),
        };
    }

    if let Some(start) = candidate.find("http") {
        let url = candidate[start..].split_whitespace().next().unwrap_or_default();
        tracing::warn!(url, "truncated image reference to embedded URL");
        return ImageReference::ExternalUrl(url.to_owned());
    }

    tracing::warn!(
        prefix = %candidate.chars().take(20).collect::<String>(),
        "unrecognized image reference, encoding raw text as JPEG"
    );
    ImageReference::GuessedText(candidate.to_owned())
}

/// Earliest known image signature; payload runs from it to the end of the base64 run
fn find_signature(candidate: &str) -> Option<(&'static str, &str)> {
    BASE64_SIGNATURES
        .iter()
        .filter_map(|(signature, mime)| candidate.find(signature).map(|pos| (pos, *mime)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(pos, mime)| (mime, base64_run_at(candidate, pos)))
}

/// First base64-charset run long enough to be an image payload
fn find_base64_run(candidate: &str) -> Option<(&'static str, &str)> {
    let mut start = None;

    for (pos, ch) in candidate.char_indices().chain(std::iter::once((candidate.len(), ' '))) {
        match (is_base64_char(ch), start) {
            (true, None) => start = Some(pos),
            (false, Some(begin)) => {
                if pos - begin >= MIN_BASE64_RUN {
                    let run = &candidate[begin..pos];
                    return Some((mime_from_base64(run).unwrap_or(DEFAULT_MIME), run));
                }
                start = None;
            }
            _ => {}
        }
    }

    None
}

fn base64_run_at(candidate: &str, start: usize) -> &str {
    let tail = &candidate[start..];
    let end = tail.find(|ch: char| !is_base64_char(ch)).unwrap_or(tail.len());
    &tail[..end]
}

const fn is_base64_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '+' | '/' | '=')
}

fn has_http_scheme(candidate: &str) -> bool {
    let lower = candidate.get(..8).unwrap_or(candidate).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Parses and resolves references against a shared temp store
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    context: ReferenceContext,
    store: Arc<TempImageStore>,
}

impl ImageNormalizer {
    pub fn new(context: ReferenceContext, store: Arc<TempImageStore>) -> Self {
        Self { context, store }
    }

    pub fn context(&self) -> &ReferenceContext {
        &self.context
    }

    pub fn store(&self) -> &TempImageStore {
        &self.store
    }

    /// Classify and resolve a single reference
    pub fn normalize(&self, input: &str) -> Result<String> {
        let reference = parse(input, &self.context)?;
        tracing::debug!(kind = reference.kind(), "normalized image reference");
        resolve(&reference, &self.store)
    }

    /// Normalize every reference, failing on the first bad one
    pub fn normalize_all<I, S>(&self, inputs: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        inputs.into_iter().map(|input| self.normalize(input.as_ref())).collect()
    }
}

impl ImageReference {
    /// Short variant label for logs
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DataUrl(_) => "data_url",
            Self::ExternalUrl(_) => "external_url",
            Self::LocalTempRef(_) => "local_temp",
            Self::RawBase64 { .. } => "raw_base64",
            Self::GuessedText(_) => "guessed_text",
        }
    }
}
