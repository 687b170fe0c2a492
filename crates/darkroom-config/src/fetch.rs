use std::time::Duration;

use serde::Deserialize;

/// Outbound image download settings (proxy, download and caching routes)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    #[serde(default = "default_timeout", deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Largest remote body accepted, checked against `Content-Length` and
    /// again while streaming
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("darkroom/{}", env!("CARGO_PKG_VERSION"))
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_bytes() -> u64 {
    50 * 1024 * 1024
}
