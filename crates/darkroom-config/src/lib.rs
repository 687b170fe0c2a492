#![allow(clippy::must_use_candidate)]

pub mod cors;
mod duration;
mod env;
pub mod fetch;
pub mod health;
mod loader;
pub mod replicate;
pub mod server;
pub mod telemetry;
pub mod temp_images;

use serde::Deserialize;

pub use cors::*;
pub use fetch::*;
pub use health::*;
pub use replicate::*;
pub use server::*;
pub use telemetry::{ExportProtocol, ExporterConfig, TelemetryConfig};
pub use temp_images::*;

/// Top-level Darkroom configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Replicate API and model configuration
    #[serde(default)]
    pub replicate: ReplicateConfig,
    /// In-memory temp image store configuration
    #[serde(default)]
    pub temp_images: TempImagesConfig,
    /// Outbound image fetching configuration
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Logging and tracing configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
