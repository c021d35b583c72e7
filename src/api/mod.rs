//! HTTP API server for talkback

pub mod chat;
pub mod health;
pub mod transcribe;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::relay::ChatRelay;
use crate::Result;

/// Shared state for API handlers
pub struct ApiState {
    pub relay: ChatRelay,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    relay: ChatRelay,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub const fn new(relay: ChatRelay, port: u16) -> Self {
        Self {
            relay,
            port,
            static_dir: None,
        }
    }

    /// Set the static files directory for serving the web UI
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState { relay: self.relay }),
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .nest("/api", api_router(self.state.clone()))
            .merge(health::router(self.state.clone()));

        if let Some(ref static_dir) = self.static_dir {
            tracing::info!(path = %static_dir.display(), "serving static files");
            router = router.fallback_service(ServeDir::new(static_dir));
        }

        // CORS layer for cross-origin requests from a browser front end
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        self.serve(listener).await
    }

    /// Serve on an already-bound listener
    ///
    /// # Errors
    ///
    /// Returns error if the server fails while running
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let port = listener.local_addr().map_or(self.port, |a| a.port());
        tracing::info!(port, model = %self.state.relay.model(), "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Routes mounted under `/api`
pub fn api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(chat::router(state))
        .merge(transcribe::router())
}
