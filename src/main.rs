//! Edge session service.
//!
//! A stateless front door that mints session identifiers and forwards
//! session-scoped requests to per-session stateful units.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request ID, trace, timeout, limits)
//!                         │
//!                         ▼
//!                     dispatch (front door router)
//!                         │  GET /                  → greeting
//!                         │  POST /api/session      → mint id
//!                         │  * /api/session/:id/*   → forward
//!                         ▼
//!                     session::registry (one unit per id, input gate)
//!                         │
//!                         ▼
//!                     session::object (sub-router) → session::store
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use edge_sessions::config::load_or_default;
use edge_sessions::lifecycle::startup;
use edge_sessions::observability::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "edge-sessions")]
#[command(about = "Session front door and per-session event store", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("edge-sessions: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("edge-sessions: logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "edge-sessions starting"
    );

    match startup::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
