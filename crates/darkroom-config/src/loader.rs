use std::path::Path;

use secrecy::{ExposeSecret, SecretString};

use crate::{Config, replicate::API_TOKEN_ENV};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, deserializes,
    /// applies environment fallbacks and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, expansion or parsing
    /// fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Load the file at `path` if it exists, otherwise start from defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file fails to load or the resulting
    /// configuration is invalid
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let mut config = Self::default();
        config.apply_env_fallbacks();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from raw TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let mut config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.apply_env_fallbacks();
        config.validate()?;

        Ok(config)
    }

    /// Fill the Replicate token from `REPLICATE_API_TOKEN` when the file
    /// leaves it unset or empty
    fn apply_env_fallbacks(&mut self) {
        let configured = self
            .replicate
            .api_token
            .as_ref()
            .is_some_and(|token| !token.expose_secret().is_empty());

        if configured {
            return;
        }

        self.replicate.api_token = std::env::var(API_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from);
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_server()?;
        self.validate_replicate()?;
        self.validate_limits()?;
        Ok(())
    }

    fn validate_server(&self) -> anyhow::Result<()> {
        let scheme = self.server.public_url.scheme();
        if scheme != "http" && scheme != "https" {
            anyhow::bail!("server.public_url must use http or https, got '{scheme}'");
        }

        if self.server.body_limit_mb == 0 {
            anyhow::bail!("server.body_limit_mb must be greater than 0");
        }

        if self.server.health.enabled && !self.server.health.path.starts_with('/') {
            anyhow::bail!("server.health.path must start with '/', got '{}'", self.server.health.path);
        }

        Ok(())
    }

    fn validate_replicate(&self) -> anyhow::Result<()> {
        let replicate = &self.replicate;

        if replicate.retry.max_attempts == 0 {
            anyhow::bail!("replicate.retry.max_attempts must be at least 1");
        }

        if replicate.poll_interval.is_zero() {
            anyhow::bail!("replicate.poll_interval must be greater than 0");
        }

        if replicate.prediction_timeout.is_zero() {
            anyhow::bail!("replicate.prediction_timeout must be greater than 0");
        }

        for (route, model) in [
            ("nano_banana", &replicate.models.nano_banana),
            ("seedream", &replicate.models.seedream),
            ("imagen", &replicate.models.imagen),
        ] {
            let valid = model
                .split_once('/')
                .is_some_and(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'));
            if !valid {
                anyhow::bail!("replicate.models.{route} must look like 'owner/name', got '{model}'");
            }
        }

        Ok(())
    }

    fn validate_limits(&self) -> anyhow::Result<()> {
        if self.temp_images.capacity == 0 {
            anyhow::bail!("temp_images.capacity must be at least 1");
        }

        if self.temp_images.max_bytes < self.temp_images.capacity {
            anyhow::bail!(
                "temp_images.max_bytes ({}) must be at least temp_images.capacity ({})",
                self.temp_images.max_bytes,
                self.temp_images.capacity
            );
        }

        if self.temp_images.ttl.is_zero() {
            anyhow::bail!("temp_images.ttl must be greater than 0");
        }

        if self.fetch.timeout.is_zero() {
            anyhow::bail!("fetch.timeout must be greater than 0");
        }

        if self.fetch.max_bytes == 0 {
            anyhow::bail!("fetch.max_bytes must be greater than 0");
        }

        Ok(())
    }
}
