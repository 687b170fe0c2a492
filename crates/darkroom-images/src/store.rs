use std::{sync::Arc, time::Duration};

use base64::Engine;
use darkroom_config::TempImagesConfig;
use jiff::Timestamp;
use moka::{policy::EvictionPolicy, sync::Cache};
use rand::Rng;

use crate::{
    data_url::{LENIENT_BASE64, decode_base64, to_data_url},
    error::{ReferenceError, Result},
};

/// Length of the random suffix in generated ids
const ID_SUFFIX_LEN: usize = 9;

/// Image held in memory so it can be served from a local URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempImage {
    pub id: String,
    /// Base64 payload without the `data:` header
    pub data: String,
    pub mime: String,
    pub filename: Option<String>,
    pub uploaded_at: Timestamp,
}

impl TempImage {
    /// Re-assemble the entry as a data URL
    pub fn data_url(&self) -> String {
        to_data_url(&self.mime, &self.data)
    }

    /// Decoded image bytes
    pub fn bytes(&self) -> Result<Vec<u8>> {
        decode_base64(&self.data)
    }
}

/// Bounded, expiring map from generated id to image payload
///
/// Shared by handlers through `Arc`. Every put is admitted; when the entry
/// count or byte budget is exceeded the least recently used entries go
/// first, and all entries expire after the configured TTL.
///
/// Each entry weighs its payload length, but never less than
/// `max_bytes / capacity`, so the weight budget caps both the number of
/// entries and the bytes they hold.
#[derive(Clone)]
pub struct TempImageStore {
    entries: Cache<String, Arc<TempImage>>,
    max_bytes: u64,
}

impl TempImageStore {
    pub fn new(capacity: u64, max_bytes: u64, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        let min_weight = (max_bytes / capacity).max(1);
        let budget = min_weight.saturating_mul(capacity);

        let entries = Cache::builder()
            .max_capacity(budget)
            .weigher(move |_id: &String, entry: &Arc<TempImage>| {
                let weight = (entry.data.len() as u64).max(min_weight);
                u32::try_from(weight).unwrap_or(u32::MAX)
            })
            .eviction_policy(EvictionPolicy::lru())
            .time_to_live(ttl)
            .build();

        Self {
            entries,
            max_bytes: budget,
        }
    }

    pub fn from_config(config: &TempImagesConfig) -> Self {
        Self::new(config.capacity, config.max_bytes, config.ttl)
    }

    /// Store a base64 payload and return its id
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::TooLarge`] when the payload alone exceeds
    /// the byte budget
    pub fn put(&self, data: impl Into<String>, mime: impl Into<String>, filename: Option<String>) -> Result<String> {
        let data = data.into();
        let size = data.len() as u64;
        if size > self.max_bytes {
            return Err(ReferenceError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        let uploaded_at = Timestamp::now();
        let id = generate_id(uploaded_at);

        let entry = TempImage {
            id: id.clone(),
            data,
            mime: mime.into(),
            filename,
            uploaded_at,
        };

        tracing::debug!(image_id = %id, mime = %entry.mime, bytes = size, "stored temp image");
        self.entries.insert(id.clone(), Arc::new(entry));

        Ok(id)
    }

    /// Store raw bytes, encoding them as base64
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::TooLarge`] when the encoded payload exceeds
    /// the byte budget
    pub fn put_bytes(&self, bytes: &[u8], mime: impl Into<String>, filename: Option<String>) -> Result<String> {
        self.put(LENIENT_BASE64.encode(bytes), mime, filename)
    }

    pub fn get(&self, id: &str) -> Option<Arc<TempImage>> {
        self.entries.get(id)
    }

    pub fn remove(&self, id: &str) {
        self.entries.invalidate(id);
    }

    /// Approximate number of live entries; expired or evicted ones may be
    /// counted until the cache runs its housekeeping
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest total payload the store holds before evicting
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

impl std::fmt::Debug for TempImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempImageStore")
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

/// `<unix millis>-<random lowercase alphanumerics>`
fn generate_id(at: Timestamp) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();

    format!("{}-{suffix}", at.as_millisecond())
}
