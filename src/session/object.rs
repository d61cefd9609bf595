//! The per-session stateful unit.
//!
//! # Sub-routes
//! ```text
//! GET  /        → {"size": n, "values": {key: event, ...}}
//! POST (/:id)   → record {id?, timestamp}, answer with an acknowledgement
//! ```
//!
//! A unit has no state beyond "empty" and "populated"; only `POST` moves it
//! between the two. Requests reach a unit one at a time through its
//! [`SessionHandle`](crate::session::SessionHandle).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Request, Response};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::http::response::handle_errors;
use crate::observability::metrics;
use crate::routing::{Params, Reply, RouteError, Router};
use crate::session::id::SessionId;
use crate::session::store::{DurableStore, Entries};

/// Layer label for session routers.
pub const SESSION_LAYER: &str = "session";

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Body of `GET /`.
#[derive(Debug, Serialize)]
struct Listing {
    size: usize,
    values: Entries,
}

/// Body of `POST (/:id)`.
#[derive(Debug, Serialize)]
struct Acknowledgement {
    ok: bool,
    session: SessionId,
    key: String,
    event: SessionEvent,
}

/// Context handed to session sub-route handlers.
#[derive(Clone)]
pub struct SessionContext {
    id: SessionId,
    storage: Arc<dyn DurableStore>,
    last_timestamp: Arc<AtomicU64>,
}

impl SessionContext {
    /// Current time in epoch milliseconds, strictly after the previous event.
    fn next_timestamp(&self) -> u64 {
        let now = epoch_millis();
        let previous = self
            .last_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Build the sub-route table shared by every session unit.
pub fn session_routes() -> Result<Router<SessionContext>, RouteError> {
    let mut router = Router::named(SESSION_LAYER);
    router
        .route("GET", "/", list_events)?
        .route("POST", "(/:id)", record_event)?;
    Ok(router)
}

async fn list_events(
    _request: Request<Body>,
    ctx: SessionContext,
    _params: Params,
) -> Result<Reply, Error> {
    let values = ctx.storage.list().await?;
    Reply::json(&Listing {
        size: values.len(),
        values,
    })
}

async fn record_event(
    _request: Request<Body>,
    ctx: SessionContext,
    params: Params,
) -> Result<Reply, Error> {
    let timestamp = ctx.next_timestamp();
    let event = SessionEvent {
        id: params.get("id").map(str::to_string),
        timestamp,
    };
    let key = event.id.clone().unwrap_or_else(|| timestamp.to_string());

    ctx.storage.put(&key, serde_json::to_value(&event)?).await?;
    metrics::record_session_event();
    tracing::debug!(session = %ctx.id, key = %key, timestamp, "Session event recorded");

    Reply::json(&Acknowledgement {
        ok: true,
        session: ctx.id,
        key,
        event,
    })
}

/// A session unit: one durable store behind the session sub-routes.
pub struct SessionObject {
    ctx: SessionContext,
    routes: Arc<Router<SessionContext>>,
}

impl SessionObject {
    pub fn new(
        id: SessionId,
        storage: Arc<dyn DurableStore>,
        routes: Arc<Router<SessionContext>>,
    ) -> Self {
        Self {
            ctx: SessionContext {
                id,
                storage,
                last_timestamp: Arc::new(AtomicU64::new(0)),
            },
            routes,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.ctx.id
    }

    pub fn storage(&self) -> &Arc<dyn DurableStore> {
        &self.ctx.storage
    }

    /// True until the first event is recorded through this unit.
    pub fn is_pristine(&self) -> bool {
        self.ctx.last_timestamp.load(Ordering::SeqCst) == 0
    }

    /// Serve one request addressed to this unit.
    pub async fn fetch(&self, request: Request<Body>) -> Response<Body> {
        handle_errors(SESSION_LAYER, self.routes.respond(request, self.ctx.clone())).await
    }
}

impl std::fmt::Debug for SessionObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionObject")
            .field("id", &self.ctx.id)
            .finish_non_exhaustive()
    }
}
