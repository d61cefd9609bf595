//! Session identity and unit lookup.
//!
//! # Responsibilities
//! - Mint fresh identifiers
//! - Parse client-supplied identifiers
//! - Hand out a handle to the unique unit behind an identifier, creating it
//!   on first use
//!
//! # Design Decisions
//! - One unit per identifier for the life of the registry; two handles for
//!   the same id always reach the same store
//! - Each unit has an input gate: requests to one unit run one at a time in
//!   arrival order, requests to different units run in parallel
//! - A released unit that nobody holds and that never stored an event is
//!   forgotten, so reading arbitrary ids does not grow the registry

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::observability::metrics;
use crate::routing::{RouteError, Router};
use crate::session::id::SessionId;
use crate::session::object::{session_routes, SessionContext, SessionObject};
use crate::session::store::StorageBackend;

struct Slot {
    gate: Mutex<()>,
    object: SessionObject,
}

/// Shared reference to one session unit.
#[derive(Clone)]
pub struct SessionHandle {
    slot: Arc<Slot>,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        self.slot.object.id()
    }

    pub fn object(&self) -> &SessionObject {
        &self.slot.object
    }

    /// Deliver a request to the unit once every earlier request has finished.
    pub async fn fetch(&self, request: Request<Body>) -> Response<Body> {
        let _turn = self.slot.gate.lock().await;
        self.slot.object.fetch(request).await
    }

    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.slot.gate.lock().await
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", self.id())
            .finish()
    }
}

/// Namespace of session units.
pub struct SessionRegistry {
    units: DashMap<SessionId, Arc<Slot>>,
    backend: StorageBackend,
    routes: Arc<Router<SessionContext>>,
}

impl SessionRegistry {
    pub fn new(backend: StorageBackend) -> Result<Self, RouteError> {
        Ok(Self {
            units: DashMap::new(),
            backend,
            routes: Arc::new(session_routes()?),
        })
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Produce an identifier no live unit is using.
    pub fn mint(&self) -> SessionId {
        loop {
            let id = SessionId::new_unique();
            if !self.units.contains_key(&id) {
                metrics::record_session_minted();
                tracing::info!(session = %id, "Session minted");
                return id;
            }
        }
    }

    /// Parse `raw` and return its unit.
    pub fn resolve(&self, raw: &str) -> Result<SessionHandle, Error> {
        let id: SessionId = raw.parse()?;
        Ok(self.get(&id))
    }

    /// The unit for `id`, created empty if this is its first use.
    pub fn get(&self, id: &SessionId) -> SessionHandle {
        let slot = {
            let entry = self.units.entry(*id).or_insert_with(|| {
                tracing::debug!(session = %id, "Session unit created");
                Arc::new(Slot {
                    gate: Mutex::new(()),
                    object: SessionObject::new(*id, self.backend.open(id), self.routes.clone()),
                })
            });
            Arc::clone(&entry)
        };
        metrics::record_active_sessions(self.units.len());
        SessionHandle { slot }
    }

    /// Give back `handle`, evicting its unit if it is idle and never recorded anything.
    pub fn release(&self, handle: SessionHandle) {
        let id = *handle.id();
        drop(handle);

        // The shard lock is held during the check, so no `get` can clone the slot meanwhile.
        let evicted = self
            .units
            .remove_if(&id, |_, slot| {
                Arc::strong_count(slot) == 1 && slot.object.is_pristine()
            })
            .is_some();
        if evicted {
            tracing::debug!(session = %id, "Idle session unit evicted");
            metrics::record_active_sessions(self.units.len());
        }
    }

    /// Number of live units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("units", &self.units.len())
            .field("backend", &self.backend)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use serde_json::Value;
    use std::collections::HashSet;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(StorageBackend::Memory).unwrap()
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_mint_is_distinct_and_lazy() {
        let registry = registry();
        let ids: HashSet<SessionId> = (0..500).map(|_| registry.mint()).collect();
        assert_eq!(ids.len(), 500);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_rejects_malformed() {
        let registry = registry();
        let err = registry.resolve("not-a-session").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_same_id_same_unit() {
        let registry = registry();
        let id = registry.mint();

        let first = registry.resolve(&id.to_string()).unwrap();
        let second = registry.get(&id);
        assert_eq!(first.id(), &id);
        assert!(Arc::ptr_eq(&first.slot, &second.slot));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_units_are_isolated() {
        let registry = registry();
        let a = registry.get(&registry.mint());
        let b = registry.get(&registry.mint());

        a.fetch(request(Method::POST, "/e1")).await;
        let listing = json_body(b.fetch(request(Method::GET, "/")).await).await;
        assert_eq!(listing["size"], 0);
        let listing = json_body(a.fetch(request(Method::GET, "/")).await).await;
        assert_eq!(listing["size"], 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_to_one_unit() {
        let registry = Arc::new(registry());
        let id = registry.mint();

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let handle = registry.get(&id);
                tokio::spawn(async move {
                    let response = handle.fetch(request(Method::POST, &format!("/e{i}"))).await;
                    assert_eq!(response.status(), StatusCode::OK);
                    json_body(response).await["event"]["timestamp"]
                        .as_u64()
                        .unwrap()
                })
            })
            .collect();

        let mut stamps = HashSet::new();
        for task in tasks {
            stamps.insert(task.await.unwrap());
        }
        assert_eq!(stamps.len(), 32);

        let listing = json_body(registry.get(&id).fetch(request(Method::GET, "/")).await).await;
        assert_eq!(listing["size"], 32);
    }

    #[tokio::test]
    async fn test_release_evicts_only_untouched_units() {
        let registry = registry();

        for _ in 0..100 {
            let visitor = registry.get(&registry.mint());
            let response = visitor.fetch(request(Method::GET, "/")).await;
            assert_eq!(response.status(), StatusCode::OK);
            registry.release(visitor);
        }
        assert!(registry.is_empty());

        let id = registry.mint();
        let used = registry.get(&id);
        used.fetch(request(Method::POST, "/kept")).await;
        registry.release(used);
        assert_eq!(registry.len(), 1);

        let other = registry.mint();
        let first = registry.get(&other);
        let second = registry.get(&other);
        registry.release(first);
        assert_eq!(registry.len(), 2);
        registry.release(second);
        assert_eq!(registry.len(), 1);

        let listing = json_body(registry.get(&id).fetch(request(Method::GET, "/")).await).await;
        assert_eq!(listing["size"], 1);
    }

    #[tokio::test]
    async fn test_file_backend_survives_new_registry() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StorageBackend::File {
            data_dir: dir.path().to_path_buf(),
        };

        let id = {
            let registry = SessionRegistry::new(backend.clone()).unwrap();
            let id = registry.mint();
            registry.get(&id).fetch(request(Method::POST, "/kept")).await;
            id
        };

        let registry = SessionRegistry::new(backend).unwrap();
        let listing = json_body(registry.get(&id).fetch(request(Method::GET, "/")).await).await;
        assert_eq!(listing["size"], 1);
        assert!(listing["values"].get("kept").is_some());
    }
}
