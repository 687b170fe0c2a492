use serde::Deserialize;

/// Liveness check served at `path` (`/health` unless configured)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Route path; must start with `/`
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: default_path(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_enabled() -> bool {
    true
}

fn default_path() -> String {
    "/health".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_path() {
        let config: HealthConfig = toml::from_str(r#"path = "/healthz""#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.path, "/healthz");
    }
}
