//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum app: one catch-all route into the switchyard `Router`
//! - Wire up middleware (tracing, timeout, request ID)
//! - Buffer request bodies within the configured limit
//! - Apply configuration updates while serving
//! - Shut down gracefully on the lifecycle signal

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::middleware::request_id_middleware;
use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::routing::Router;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub max_body_size: usize,
}

/// Serves a switchyard [`Router`] over HTTP.
pub struct HttpServer {
    app: axum::Router,
    router: Arc<Router>,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, router: Arc<Router>) -> Self {
        let state = AppState {
            router: Arc::clone(&router),
            max_body_size: config.routing.max_body_size,
        };
        let app = Self::build_app(config, state);
        Self { app, router }
    }

    /// Build the Axum app with all middleware layers.
    #[allow(deprecated)]
    fn build_app(config: &ServerConfig, state: AppState) -> axum::Router {
        axum::Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn(request_id_middleware))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
    }

    /// The Axum app, for embedding or in-process tests.
    pub fn app(&self) -> axum::Router {
        self.app.clone()
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Serve until `shutdown` fires, applying configs from `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let router = Arc::clone(&self.router);
        let updates = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match router.apply_config(&config) {
                    Ok(()) => tracing::info!(
                        error_pages = router.error_pages().len(),
                        "Configuration applied"
                    ),
                    Err(e) => tracing::error!(error = %e, "Rejected configuration update"),
                }
            }
        });

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        updates.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Hands every request to the switchyard router.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("unknown"));

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                request_id = ?request_id,
                path = parts.uri.path(),
                error = %e,
                "Failed to buffer request body"
            );
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let context = RequestContext::new(parts.method, parts.uri.path())
        .with_headers(parts.headers)
        .with_body(body.to_vec());

    tracing::debug!(
        request_id = ?request_id,
        method = %context.method(),
        path = context.path(),
        "Dispatching request"
    );

    let router = Arc::clone(&state.router);
    match tokio::task::spawn_blocking(move || router.handle(&context)).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(request_id = ?request_id, error = %e, "Dispatch task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
