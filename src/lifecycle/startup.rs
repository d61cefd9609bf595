//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order (metrics, server)
//! - Bind the listener and begin accepting traffic
//! - Tie OS signals to graceful shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::observability::metrics;
use crate::routing::RouteError;

/// Anything that stops the service from coming up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("route table: {0}")]
    Routes(#[from] RouteError),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid address {0:?}")]
    Address(String),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Bring the service up and serve until a stop signal arrives.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(config)?;

    let listener = TcpListener::bind(&server.config().listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        max_connections = server.config().listener.max_connections,
        request_timeout_secs = server.config().timeouts.request_secs,
        tls = server.config().listener.tls.is_some(),
        "Listening for connections"
    );

    let shutdown = Arc::new(Shutdown::new());
    let receiver = shutdown.subscribe();
    spawn_signal_listener(shutdown);

    server.run(listener, receiver).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_metrics_address_fails_fast() {
        let mut config = AppConfig::default();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "not-an-address".into();

        let err = run(config).await.unwrap_err();
        assert!(matches!(err, StartupError::Address(ref addr) if addr == "not-an-address"));
        assert_eq!(err.to_string(), "invalid address \"not-an-address\"");
    }
}
