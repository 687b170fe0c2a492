use std::time::Duration;

use serde::Deserialize;

/// Temp image store limits
///
/// The store evicts the least recently used entries once either `capacity`
/// entries or `max_bytes` of base64 payload are held, and drops every entry
/// after `ttl`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TempImagesConfig {
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    /// Upper bound on the summed base64 payload size
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_ttl", deserialize_with = "crate::duration::deserialize")]
    pub ttl: Duration,
}

impl Default for TempImagesConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_bytes: default_max_bytes(),
            ttl: default_ttl(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_capacity() -> u64 {
    500
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_bytes() -> u64 {
    512 * 1024 * 1024
}

#[allow(clippy::missing_const_for_fn)]
fn default_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}
