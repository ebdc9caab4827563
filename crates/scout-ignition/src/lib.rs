//! scout-ignition — out-of-band wake-up requests for environments.
//!
//! An ignition provider receives a trigger request for one environment
//! and performs a provider-defined side effect. The built-in
//! `prometheus` provider records the request as a gauge observation so
//! external automation (alert rules, scalers) can react to it. Every
//! provider is wrapped with trigger counting.

pub mod config;
pub mod error;
pub mod prometheus;
pub mod provider;

pub use config::{PrometheusProviderConfig, ProviderConfig, ProviderType};
pub use error::IgnitionError;
pub use prometheus::PrometheusProvider;
pub use provider::{new_provider, Provider, TriggerRequest};
