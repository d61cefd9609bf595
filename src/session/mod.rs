//! Session units and their registry.
//!
//! # Data Flow
//! ```text
//! identifier string
//!     → registry.rs (parse, find or create the unit)
//!     → SessionHandle::fetch (wait for the unit's input gate)
//!     → object.rs (session sub-routes)
//!     → store.rs (durable key-value entries)
//! ```

pub mod id;
pub mod object;
pub mod registry;
pub mod store;

pub use id::SessionId;
pub use object::{session_routes, SessionContext, SessionEvent, SessionObject, SESSION_LAYER};
pub use registry::{SessionHandle, SessionRegistry};
pub use store::{DurableStore, Entries, FileStore, MemoryStore, StorageBackend, StoreError};
