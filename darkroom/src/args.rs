use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Darkroom image-editing proxy
#[derive(Debug, Parser)]
#[command(name = "darkroom", about = "Proxy between the photo editor front-end and Replicate image models")]
pub struct Args {
    /// Path to configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "darkroom.toml", env = "DARKROOM_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "DARKROOM_LISTEN")]
    pub listen: Option<SocketAddr>,
}
