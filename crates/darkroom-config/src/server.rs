use std::net::SocketAddr;

use serde::Deserialize;
use url::Url;

use crate::{cors::CorsConfig, health::HealthConfig};

/// Port the proxy listens on when nothing else is configured
pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind (defaults to `0.0.0.0:3001`)
    pub listen_address: Option<SocketAddr>,
    /// Externally visible base URL used to build temp image links
    #[serde(default = "default_public_url")]
    pub public_url: Url,
    /// Maximum accepted request body in megabytes (base64 uploads are large)
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            public_url: default_public_url(),
            body_limit_mb: default_body_limit_mb(),
            health: HealthConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Address to bind, falling back to all interfaces on the default port
    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))
    }

    /// Public base URL without a trailing slash
    pub fn public_base(&self) -> String {
        self.public_url.as_str().trim_end_matches('/').to_owned()
    }
}

fn default_public_url() -> Url {
    Url::parse("http://localhost:3001").expect("default public URL is valid")
}

#[allow(clippy::missing_const_for_fn)]
fn default_body_limit_mb() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_development() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_address().port(), DEFAULT_PORT);
        assert_eq!(config.public_base(), "http://localhost:3001");
        assert_eq!(config.body_limit_mb, 50);
    }

    #[test]
    fn public_base_strips_trailing_slash() {
        let config: ServerConfig = toml::from_str(r#"public_url = "https://edit.example.com/""#).unwrap();
        assert_eq!(config.public_base(), "https://edit.example.com");
    }
}
