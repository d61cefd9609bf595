//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Look up the first route accepting a (method, path) pair
//! - Invoke the handler and normalize its [`Reply`]
//!
//! # Design Decisions
//! - Built once by an explicit constructor, immutable afterwards
//! - Registration order is the only tie-break: earlier routes win
//! - No match is answered with the caller's fallback status, not an error

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::error::Error;
use crate::observability::metrics;
use crate::routing::matcher::{Params, PathPattern, PatternError};
use crate::routing::reply::Reply;

/// Future returned by a boxed route handler.
pub type HandlerFuture = BoxFuture<'static, Result<Reply, Error>>;

type BoxedHandler<C> = Arc<dyn Fn(Request<Body>, C, Params) -> HandlerFuture + Send + Sync>;

/// Errors raised while building a route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid method token {0:?}")]
    InvalidMethod(String),

    #[error("invalid path template {template:?}: {source}")]
    Pattern {
        template: String,
        #[source]
        source: PatternError,
    },
}

/// Which request methods a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// `*`: every method.
    Any,
    Only(Method),
}

impl MethodFilter {
    /// Parse `*` or an HTTP method token.
    pub fn parse(token: &str) -> Result<Self, RouteError> {
        if token == "*" {
            return Ok(Self::Any);
        }
        Method::from_bytes(token.as_bytes())
            .map(Self::Only)
            .map_err(|_| RouteError::InvalidMethod(token.to_string()))
    }

    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Only(expected) => expected == method,
        }
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Only(method) => f.write_str(method.as_str()),
        }
    }
}

/// A registered (method, template, handler) triple.
pub struct Route<C> {
    method: MethodFilter,
    pattern: PathPattern,
    handler: BoxedHandler<C>,
}

impl<C> Route<C> {
    pub fn method(&self) -> &MethodFilter {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }
}

impl<C> fmt::Debug for Route<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.pattern.template())
            .finish_non_exhaustive()
    }
}

/// The route chosen for a request, with its captures.
#[derive(Debug)]
pub struct RouteMatch<'a, C> {
    pub route: &'a Route<C>,
    pub params: Params,
}

/// An ordered route table.
///
/// `C` is the context handed to every handler; it is cloned per request.
pub struct Router<C> {
    layer: &'static str,
    routes: Vec<Route<C>>,
}

impl<C> fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("layer", &self.layer)
            .field("routes", &self.routes)
            .finish()
    }
}

impl<C: Clone + Send + 'static> Router<C> {
    /// Create an empty router. `layer` labels its logs and metrics.
    pub fn named(layer: &'static str) -> Self {
        Self {
            layer,
            routes: Vec::new(),
        }
    }

    /// Append a route. Overlapping templates are allowed.
    pub fn route<F, Fut>(
        &mut self,
        method: &str,
        template: &str,
        handler: F,
    ) -> Result<&mut Self, RouteError>
    where
        F: Fn(Request<Body>, C, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, Error>> + Send + 'static,
    {
        let method = MethodFilter::parse(method)?;
        let pattern = PathPattern::compile(template).map_err(|source| RouteError::Pattern {
            template: template.to_string(),
            source,
        })?;
        let handler: BoxedHandler<C> = Arc::new(
            move |request: Request<Body>, ctx: C, params: Params| -> HandlerFuture {
                Box::pin(handler(request, ctx, params))
            },
        );

        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(self)
    }

    pub fn layer(&self) -> &'static str {
        self.layer
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route<C>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route, in registration order, accepting `method` and `path`.
    pub fn match_request(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, C>> {
        self.routes
            .iter()
            .filter(|route| route.method.accepts(method))
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    /// Dispatch with a 404 fallback.
    pub async fn respond(
        &self,
        request: Request<Body>,
        ctx: C,
    ) -> Result<Option<Response<Body>>, Error> {
        self.respond_or(request, ctx, StatusCode::NOT_FOUND).await
    }

    /// Dispatch `request`; unmatched requests get `fallback` with no body.
    pub async fn respond_or(
        &self,
        request: Request<Body>,
        ctx: C,
        fallback: StatusCode,
    ) -> Result<Option<Response<Body>>, Error> {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let Some(RouteMatch { route, params }) = self.match_request(&method, &path) else {
            tracing::debug!(
                layer = self.layer,
                method = %method,
                path = %path,
                status = fallback.as_u16(),
                "No route matched"
            );
            metrics::record_request(self.layer, method.as_str(), fallback.as_str(), start);
            return Reply::Status(fallback).into_response();
        };

        tracing::debug!(
            layer = self.layer,
            method = %method,
            path = %path,
            route = %route.pattern,
            "Route matched"
        );

        let response = (route.handler)(request, ctx, params)
            .await
            .and_then(Reply::into_response);

        let status = match &response {
            Ok(Some(response)) => response.status().as_str().to_string(),
            Ok(None) => "none".to_string(),
            Err(e) => e.status().as_str().to_string(),
        };
        metrics::record_request(self.layer, method.as_str(), &status, start);
        response
    }
}
