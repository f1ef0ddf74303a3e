//! Main web server setup and startup.
//!
//! [`WebServer`] composes the axum router, registers all routes, and runs
//! the HTTP listener until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, InvalidHeaderValue};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::WebConfig;
use crate::api;
use crate::state::AppState;

/// The TaskLinx web server.
pub struct WebServer {
    config: WebConfig,
    origin: HeaderValue,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.frontend_url` is not a valid header value.
    pub fn new(config: WebConfig, state: AppState) -> Result<Self, InvalidHeaderValue> {
        let origin = HeaderValue::from_str(config.frontend_url.trim_end_matches('/'))?;
        Ok(Self {
            config,
            origin,
            state: Arc::new(state),
        })
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the axum router with all routes registered.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(self.origin.clone())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(true);

        Router::new()
            .route("/", get(api::root))
            .route("/health", get(api::health))
            .route("/auth/login", get(api::login))
            .route("/auth/callback", post(api::callback))
            .route("/tasks/execute", post(api::execute_task))
            .route("/tasks/history", get(api::task_history))
            .route("/user/profile", get(api::profile))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(addr = %addr, origin = ?self.origin, "starting web server");
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("web server stopped");
        Ok(())
    }
}
