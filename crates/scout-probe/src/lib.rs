//! scout-probe — lazy, cached value sources for environment attributes.
//!
//! A probe is a future value of one attribute of one environment; a
//! prober is the factory binding a shared querier to an environment.
//! Three probe variants exist:
//!
//! - **static** — a fixed value from a namespace annotation
//! - **single** — backed by a per-environment time-series query
//! - **bulk** — a thin view over a query shared by many environments
//!
//! Status probes yield `bool`; metadata probes yield the
//! dynamically-typed [`MetaValue`].

pub mod convert;
pub mod meta;
pub mod probe;
pub mod prom;

pub use convert::FromSample;
pub use meta::{parse_meta_annotation, MetaType, MetaValue};
pub use probe::{Probe, Prober, StaticProbe};
pub use prom::{new_meta_prober, PromProber};

pub use scout_prom::QueryError as ProbeError;
