//! scout-prom — Prometheus querying for scout.
//!
//! Wraps the Prometheus HTTP API behind a typed client and exposes two
//! querier shapes with interval-based caching:
//!
//! - **single** — a templated query expanded per environment, expected
//!   to return exactly one sample
//! - **bulk** — one non-templated query answering for every bound
//!   environment at once, indexed by a match label
//!
//! # Architecture
//!
//! ```text
//! Client (reqwest) ── /api/v1/query ──► Vec<Sample>
//!   ▲
//!   │ QueryBackend (injectable in tests)
//!   │
//! SingleQuery ─┐
//! BulkQuery  ──┴─► Executor (per environment, interval cache)
//! ```
//!
//! Environments bind to a querier through an [`Executor`], which caches
//! the last successful sample for the configured interval and
//! serializes concurrent reads behind its own mutex.

pub mod bulk;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod single;
pub mod template;

mod telemetry;

pub use bulk::BulkQuery;
pub use client::{Client, ClientConfig, PromConfig, QueryBackend, Sample};
pub use config::{MatchOn, QueryConfig, QueryKind};
pub use error::QueryError;
pub use executor::{Executor, Querier};
pub use single::SingleQuery;
pub use template::QueryTemplate;

use std::sync::Arc;

/// Build a querier of the configured kind.
pub fn new_querier(
    backend: Arc<dyn QueryBackend>,
    cfg: QueryConfig,
) -> Result<Arc<dyn Querier>, QueryError> {
    match cfg.kind {
        QueryKind::Single => Ok(SingleQuery::new(backend, cfg)?),
        QueryKind::Bulk => Ok(BulkQuery::new(backend, cfg)?),
    }
}
