//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all handler
//! - Wire up middleware (request ID, tracing, timeout, limits)
//! - Bind server to listener, plain or TLS
//! - Dispatch every request to the session front door
//! - Stop gracefully when shutdown is triggered

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::config::AppConfig;
use crate::dispatch::Dispatcher;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::lifecycle::startup::StartupError;
use crate::net::tls::load_tls_config;
use crate::session::{SessionRegistry, StorageBackend};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the session service.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Result<Self, StartupError> {
        let backend = StorageBackend::from_config(&config.storage);
        tracing::info!(backend = ?backend, "Session storage selected");

        let registry = Arc::new(SessionRegistry::new(backend)?);
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            config.dispatcher.greeting.as_str(),
        )?);

        let state = AppState {
            dispatcher: dispatcher.clone(),
        };
        let router = Self::build_router(&config, state);

        Ok(Self {
            router,
            config,
            dispatcher,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections));

        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(middleware)
    }

    /// The fully layered application, for in-process use.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;

        match &self.config.listener.tls {
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                        tracing::info!("Draining in-flight requests");
                    })
                    .await?;
            }
            Some(tls) => {
                let rustls =
                    load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
                let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
                let handle = axum_server::Handle::new();

                let trigger = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    tracing::info!(grace_secs = grace.as_secs(), "Draining in-flight requests");
                    trigger.graceful_shutdown(Some(grace));
                });

                tracing::info!(address = %addr, "HTTPS server starting");
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every request goes through the dispatcher.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    let span = tracing::info_span!(
        "request",
        request_id = request.request_id().unwrap_or("unknown"),
        method = %request.method(),
        path = %request.uri().path(),
    );
    state.dispatcher.fetch(request).instrument(span).await
}
