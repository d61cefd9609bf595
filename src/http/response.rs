//! Error boundary for routed responses.
//!
//! # Responsibilities
//! - Turn a router outcome into exactly one response
//! - Map request-time errors to status codes with a diagnostic body
//! - Log every fault once, at the layer where it surfaced
//!
//! # Design Decisions
//! - Malformed identifiers answer 400; every other fault answers 500
//! - A router that produced no response is itself a fault

use std::future::Future;

use axum::body::Body;
use axum::http::{header, HeaderValue, Response};

use crate::error::Error;
use crate::routing::reply::TEXT_CONTENT_TYPE;

/// Await `dispatch` and convert any error into a text response.
pub async fn handle_errors<F>(layer: &'static str, dispatch: F) -> Response<Body>
where
    F: Future<Output = Result<Option<Response<Body>>, Error>>,
{
    match dispatch.await.and_then(|response| response.ok_or(Error::NoResponse)) {
        Ok(response) => response,
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(layer, status = status.as_u16(), error = %e, "Request failed");
            } else {
                tracing::warn!(layer, status = status.as_u16(), error = %e, "Request rejected");
            }
            error_response(&e)
        }
    }
}

/// Plain-text response describing `err`.
pub fn error_response(err: &Error) -> Response<Body> {
    let mut response = Response::new(Body::from(err.to_string()));
    *response.status_mut() = err.status();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(TEXT_CONTENT_TYPE),
    );
    response
}
