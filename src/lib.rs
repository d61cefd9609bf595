//! Edge session service library.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod session;

pub use config::schema::AppConfig;
pub use dispatch::Dispatcher;
pub use error::Error;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use session::{SessionId, SessionRegistry};
