//! Stateless front door.
//!
//! # Routes
//! ```text
//! GET  /                        → greeting text
//! POST /api/session             → {"id": "<new session id>"}
//! *    /api/session/:id(/*)     → forwarded to the session unit, path = remainder
//! ```
//!
//! # Design Decisions
//! - The dispatcher owns no session state; everything stateful lives behind
//!   the registry
//! - Forwarded requests keep method, headers, body, and query string; only
//!   the path is rewritten

use std::sync::Arc;

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{Request, Response, Uri};
use serde::Serialize;

use crate::error::Error;
use crate::http::response::handle_errors;
use crate::routing::{Params, Reply, RouteError, Router};
use crate::session::{SessionId, SessionRegistry};

/// Layer label for the dispatcher router.
pub const DISPATCHER_LAYER: &str = "dispatcher";

/// Context handed to dispatcher handlers.
#[derive(Clone)]
pub struct DispatchContext {
    registry: Arc<SessionRegistry>,
    greeting: Arc<str>,
}

#[derive(Debug, Serialize)]
struct NewSession {
    id: SessionId,
}

/// The front door router with its shared context.
#[derive(Debug)]
pub struct Dispatcher {
    router: Router<DispatchContext>,
    ctx: DispatchContext,
}

impl std::fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchContext")
            .field("greeting", &self.greeting)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        greeting: impl Into<Arc<str>>,
    ) -> Result<Self, RouteError> {
        let mut router = Router::named(DISPATCHER_LAYER);
        router
            .route("GET", "/", greet)?
            .route("POST", "/api/session", create_session)?
            .route("*", "/api/session/:id(/*)", forward_to_session)?;

        for route in router.routes() {
            tracing::debug!(method = %route.method(), template = %route.pattern(), "Route registered");
        }

        Ok(Self {
            router,
            ctx: DispatchContext {
                registry,
                greeting: greeting.into(),
            },
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.ctx.registry
    }

    pub fn router(&self) -> &Router<DispatchContext> {
        &self.router
    }

    /// Serve one inbound request.
    pub async fn fetch(&self, request: Request<Body>) -> Response<Body> {
        handle_errors(DISPATCHER_LAYER, self.router.respond(request, self.ctx.clone())).await
    }
}

async fn greet(
    _request: Request<Body>,
    ctx: DispatchContext,
    _params: Params,
) -> Result<Reply, Error> {
    Ok(Reply::Text(ctx.greeting.to_string()))
}

async fn create_session(
    _request: Request<Body>,
    ctx: DispatchContext,
    _params: Params,
) -> Result<Reply, Error> {
    let id = ctx.registry.mint();
    Reply::json(&NewSession { id })
}

async fn forward_to_session(
    request: Request<Body>,
    ctx: DispatchContext,
    params: Params,
) -> Result<Reply, Error> {
    let handle = ctx.registry.resolve(params.get("id").unwrap_or_default())?;
    let path = params.wildcard().unwrap_or("/");
    let forwarded = rewrite_path(request, path)?;

    tracing::debug!(
        session = %handle.id(),
        method = %forwarded.method(),
        uri = %forwarded.uri(),
        "Forwarding to session"
    );
    let response = handle.fetch(forwarded).await;
    ctx.registry.release(handle);
    Ok(Reply::Response(response))
}

/// Replace the path of `request`, keeping its query string.
fn rewrite_path(request: Request<Body>, path: &str) -> Result<Request<Body>, Error> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = match parts.uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut uri = parts.uri.clone().into_parts();
    uri.path_and_query =
        Some(PathAndQuery::try_from(path_and_query).map_err(axum::http::Error::from)?);
    parts.uri = Uri::from_parts(uri).map_err(axum::http::Error::from)?;

    Ok(Request::from_parts(parts, body))
}
