//! Web layer module
//!
//! A thin addon-protocol surface over [`StreamService`]: the manifest, the
//! stream resource and a health check. Handlers only map HTTP to pipeline
//! calls and pipeline errors to status codes.

use anyhow::Result;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::{cache::CacheRegistry, config::Config, pipeline::StreamService};

pub mod handlers;
pub mod responses;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<StreamService>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let caches = CacheRegistry::new(&config.cache);
        let service = StreamService::new(&config, &caches)?;
        Ok(Self {
            config: Arc::new(config),
            service: Arc::new(service),
        })
    }
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let addr: SocketAddr =
            format!("{}:{}", state.config.web.host, state.config.web.port).parse()?;
        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    /// Start the web server
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Create the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/manifest.json", get(handlers::addon::manifest))
        .route("/stream/{content_type}/{id}", get(handlers::addon::streams))
        .route(
            "/stream/{content_type}/{id}/{extras}",
            get(handlers::addon::streams_with_extras),
        )
        // Middleware (applied in reverse order)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
