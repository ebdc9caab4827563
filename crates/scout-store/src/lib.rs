//! scout-store — the discovery store.
//!
//! A concurrent registry of environments keyed by name with a unique
//! secondary namespace key. State is rebuilt from the orchestrator
//! event stream; nothing is persisted.
//!
//! # Architecture
//!
//! ```text
//! Store (Arc, Clone)
//!   ├── RwLock<HashMap<name → Environment>>
//!   ├── add / update / delete  ← event reducer (write lock)
//!   └── get / get_all / list / match  ← HTTP handlers (read lock)
//! ```
//!
//! Probe destruction runs under the write lock, so reads never observe
//! an entry whose probes are mid-teardown.

pub mod environment;
pub mod error;
pub mod store;

pub use environment::{Environment, EnvironmentResponse};
pub use error::{StoreError, StoreResult};
pub use store::Store;
