//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::time::Duration;

use edge_sessions::config::AppConfig;
use edge_sessions::http::HttpServer;
use edge_sessions::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A running server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Trigger shutdown and wait for the server task to finish.
    #[allow(dead_code)]
    pub async fn stop(self) -> Result<(), std::io::Error> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

/// Start a server with `config` on 127.0.0.1 and an OS-assigned port.
pub async fn start_server(mut config: AppConfig) -> TestServer {
    config.listener.bind_address = "127.0.0.1:0".to_string();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, receiver));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Start a server with the default configuration.
#[allow(dead_code)]
pub async fn start_default_server() -> TestServer {
    start_server(AppConfig::default()).await
}
