//! Probe and prober contracts, plus the static probe.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ProbeError;

/// A lazy, cached value source for one environment attribute.
#[async_trait]
pub trait Probe<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// The current value, refreshed per the source's own policy.
    async fn value(&self) -> Result<T, ProbeError>;

    /// Time of the last successful observation, if any.
    fn last_update(&self) -> Option<DateTime<Utc>>;

    /// Release any resources held in the backing querier.
    async fn destroy(&self) {}
}

/// A factory binding a value source to one environment.
pub trait Prober<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    fn add_environment(&self, name: &str, namespace: &str)
        -> Result<Arc<dyn Probe<T>>, ProbeError>;
}

/// A probe holding a fixed value. Never fails, never updates.
pub struct StaticProbe<T> {
    value: T,
}

impl<T> StaticProbe<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<T> Probe<T> for StaticProbe<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn value(&self) -> Result<T, ProbeError> {
        Ok(self.value.clone())
    }

    fn last_update(&self) -> Option<DateTime<Utc>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_probe_returns_its_value() {
        let probe = StaticProbe::new(true);
        assert!(probe.value().await.unwrap());
        assert!(probe.last_update().is_none());
    }

    #[tokio::test]
    async fn static_probe_survives_destroy() {
        let probe = StaticProbe::new("fixed".to_string());
        probe.destroy().await;
        assert_eq!(probe.value().await.unwrap(), "fixed");
    }
}
