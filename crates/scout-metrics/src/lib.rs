//! scout-metrics — service metrics for scout.
//!
//! Provides labeled gauge/counter/histogram families, callback gauges,
//! and Prometheus text exposition. Collectors register against a
//! `Registry`; the process-global registry backs the `/metrics`
//! endpoint.
//!
//! # Architecture
//!
//! ```text
//! Registry
//!   ├── gauge_vec() / counter_vec() / histogram_vec() → Arc<Family>
//!   ├── gauge_fn() → callback gauge evaluated at render time
//!   └── render() → text/plain for the /metrics endpoint
//! ```
//!
//! Subsystems hold their families in `LazyLock` statics bound to
//! [`global()`], so instrumentation points stay one-liners.

pub mod family;
pub mod registry;

pub use family::{CounterVec, GaugeVec, HistogramVec};
pub use registry::Registry;

use std::sync::LazyLock;

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// The process-global registry serving the `/metrics` endpoint.
pub fn global() -> &'static Registry {
    &GLOBAL
}
