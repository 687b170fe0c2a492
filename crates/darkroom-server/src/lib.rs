//! HTTP surface of the Darkroom proxy

#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod cors;
mod error;
mod fetch;
mod health;
mod routes;
mod state;

use std::{net::SocketAddr, sync::Arc};

use axum::{Router, extract::DefaultBodyLimit};
use darkroom_config::Config;
use darkroom_images::{ImageNormalizer, ReferenceContext, TempImageStore};
use tower_http::trace::TraceLayer;

pub use error::{ApiError, Result};
pub use fetch::{FetchedImage, ImageFetcher};
pub use state::AppState;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if an outbound HTTP client cannot be constructed
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(TempImageStore::from_config(&config.temp_images));
        let context = ReferenceContext::new(&config.server.public_base());
        let normalizer = ImageNormalizer::new(context, store);

        let state = AppState {
            caller: darkroom_replicate::build_caller(&config.replicate)?,
            fetcher: ImageFetcher::new(&config.fetch, normalizer.clone())?,
            normalizer,
            models: Arc::new(config.replicate.models.clone()),
        };

        Ok(Self::with_state(config, state))
    }

    /// Build the server around prepared state
    pub fn with_state(config: &Config, state: AppState) -> Self {
        let mut app = Router::new();

        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        let body_limit = config.server.body_limit_mb.saturating_mul(1024 * 1024);

        app = app
            .merge(routes::router().with_state(state))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(TraceLayer::new_for_http())
            .layer(cors::cors_layer(&config.server.cors));

        Self {
            router: app,
            listen_address: config.server.listen_address(),
        }
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
