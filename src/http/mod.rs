//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID stamped and propagated)
//!     → dispatch (front door router, session units)
//!     → response.rs (error boundary, status mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{error_response, handle_errors};
pub use server::{AppState, HttpServer};
