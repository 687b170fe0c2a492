//! Programmatic configuration builder for integration tests

use std::{net::SocketAddr, time::Duration};

use darkroom_config::Config;
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Defaults with a token set and retries fast enough for tests
    pub fn new() -> Self {
        let mut config = Config::default();
        config.server.listen_address = Some(SocketAddr::from(([127, 0, 0, 1], 0)));
        config.replicate.api_token = Some(SecretString::from("r8_test_token"));
        config.replicate.poll_interval = Duration::from_millis(10);
        config.replicate.prediction_timeout = Duration::from_secs(10);
        config.replicate.retry.backoff_step = Duration::from_millis(10);
        config.fetch.timeout = Duration::from_secs(5);

        Self { config }
    }

    /// Point model calls at a mock Replicate API
    pub fn with_replicate(mut self, base_url: &str) -> Self {
        self.config.replicate.base_url = base_url.parse().expect("valid URL");
        self
    }

    pub fn without_token(mut self) -> Self {
        self.config.replicate.api_token = None;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.replicate.retry.max_attempts = attempts;
        self
    }

    pub fn without_safety_rewrite(mut self) -> Self {
        self.config.replicate.retry.safety_rewrite = false;
        self
    }

    pub fn with_public_url(mut self, url: &str) -> Self {
        self.config.server.public_url = url.parse().expect("valid URL");
        self
    }

    /// Cap remote image downloads
    pub fn with_fetch_max_bytes(mut self, max_bytes: u64) -> Self {
        self.config.fetch.max_bytes = max_bytes;
        self
    }

    /// Shrink the temp store
    pub fn with_temp_images(mut self, capacity: u64, max_bytes: u64) -> Self {
        self.config.temp_images.capacity = capacity;
        self.config.temp_images.max_bytes = max_bytes;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
