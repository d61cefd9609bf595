//! Handler return values and their normalization into responses.
//!
//! Handlers return a [`Reply`] instead of building responses by hand, so a
//! status-code shorthand, plain text, structured data and a fully formed
//! response all share one return type.

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const TEXT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

/// What a route handler produced.
#[derive(Debug)]
pub enum Reply {
    /// No response; the handler consumed the response channel itself.
    Empty,
    /// A response already in final form, passed through unchanged.
    Response(Response<Body>),
    /// An empty-body response with this status.
    Status(StatusCode),
    /// A text body with the default status.
    Text(String),
    /// A JSON body with the default status.
    Json(Value),
}

impl Reply {
    /// Serialize `value` into a [`Reply::Json`].
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Normalize into a response. [`Reply::Empty`] yields `None`.
    pub fn into_response(self) -> Result<Option<Response<Body>>, Error> {
        let response = match self {
            Reply::Empty => return Ok(None),
            Reply::Response(response) => response,
            Reply::Status(status) => Response::builder().status(status).body(Body::empty())?,
            Reply::Text(text) => Response::builder()
                .header(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)
                .body(Body::from(text))?,
            Reply::Json(value) => Response::builder()
                .header(header::CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(Body::from(serde_json::to_vec(&value)?))?,
        };
        Ok(Some(response))
    }
}

impl From<StatusCode> for Reply {
    fn from(status: StatusCode) -> Self {
        Self::Status(status)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Response<Body>> for Reply {
    fn from(response: Response<Body>) -> Self {
        Self::Response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_status_reply() {
        let response = Reply::from(StatusCode::NOT_FOUND)
            .into_response()
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_text_reply() {
        let response = Reply::from("hi").into_response().unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            TEXT_CONTENT_TYPE
        );
        assert_eq!(body_string(response).await, "hi");
    }

    #[tokio::test]
    async fn test_json_reply() {
        let response = Reply::from(json!({"a": 1})).into_response().unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            JSON_CONTENT_TYPE
        );
        assert_eq!(body_string(response).await, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_json_from_serialize() {
        #[derive(Serialize)]
        struct Ack {
            ok: bool,
        }
        let response = Reply::json(&Ack { ok: true })
            .unwrap()
            .into_response()
            .unwrap()
            .unwrap();
        assert_eq!(body_string(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_response_passthrough() {
        let original = Response::builder()
            .status(StatusCode::ACCEPTED)
            .header("x-custom", "kept")
            .body(Body::from("raw"))
            .unwrap();
        let response = Reply::from(original).into_response().unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-custom"], "kept");
        assert_eq!(body_string(response).await, "raw");
    }

    #[test]
    fn test_empty_reply() {
        assert!(Reply::Empty.into_response().unwrap().is_none());
    }
}
