use std::collections::BTreeMap;

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One recorded session event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub timestamp: u64,
}

/// Answer to recording an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub ok: bool,
    pub session: String,
    pub key: String,
    pub event: Event,
}

/// Every event of one session, keyed by storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventListing {
    pub size: usize,
    pub values: BTreeMap<String, Event>,
}

#[derive(Debug, Deserialize)]
struct NewSession {
    id: String,
}

pub struct SessionClient {
    client: Client,
    base_url: String,
}

impl SessionClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /`.
    pub async fn greeting(&self) -> Result<String, ClientError> {
        let resp = self.client.get(format!("{}/", self.base_url)).send().await?;
        Ok(check(resp).await?.text().await?)
    }

    /// Mint a new session and return its identifier.
    pub async fn create_session(&self) -> Result<String, ClientError> {
        let resp = self
            .client
            .post(format!("{}/api/session", self.base_url))
            .send()
            .await?;
        let created: NewSession = decode(resp).await?;
        Ok(created.id)
    }

    /// Record an event, keyed by `event_id` or by its timestamp when absent.
    pub async fn record_event(
        &self,
        session: &str,
        event_id: Option<&str>,
    ) -> Result<Acknowledgement, ClientError> {
        let path = match event_id {
            Some(id) => format!("/{id}"),
            None => "/".to_string(),
        };
        let resp = self.session_request(Method::POST, session, &path).await?;
        decode(resp).await
    }

    /// List every event recorded in `session`.
    pub async fn list_events(&self, session: &str) -> Result<EventListing, ClientError> {
        let resp = self.session_request(Method::GET, session, "/").await?;
        decode(resp).await
    }

    /// Send an arbitrary request into a session; `path` is the session-relative path.
    pub async fn session_request(
        &self,
        method: Method,
        session: &str,
        path: &str,
    ) -> Result<Response, reqwest::Error> {
        self.client
            .request(method, format!("{}/api/session/{}{}", self.base_url, session, path))
            .send()
            .await
    }
}

async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status { status, body })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let text = check(resp).await?.text().await?;
    Ok(serde_json::from_str(&text)?)
}
