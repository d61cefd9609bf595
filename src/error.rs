//! Request-time error taxonomy.
//!
//! Interior components fail fast with [`Error`]; the only place an error
//! becomes an HTTP response is the boundary in [`crate::http::response`].
//! An unmatched route is not an error: it is answered with the Router's
//! fallback status.

use axum::http::StatusCode;
use thiserror::Error;

use crate::session::store::StoreError;

/// Errors raised while handling a single request.
#[derive(Debug, Error)]
pub enum Error {
    /// A session id string could not be parsed.
    #[error("invalid session identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The durable store failed.
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    /// A handler's structured body could not be serialized.
    #[error("failed to encode response body: {0}")]
    Encode(#[from] serde_json::Error),

    /// A request or response could not be assembled.
    #[error("failed to build http message: {0}")]
    Http(#[from] axum::http::Error),

    /// A handler returned no response at a layer that must answer.
    #[error("handler produced no response")]
    NoResponse,
}

impl Error {
    /// Status code reported by the error boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::InvalidIdentifier("nope".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::NoResponse.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidIdentifier("xyz".into());
        assert_eq!(err.to_string(), "invalid session identifier: \"xyz\"");
        assert_eq!(Error::NoResponse.to_string(), "handler produced no response");
    }
}
