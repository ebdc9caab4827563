//! Per-environment query executors.
//!
//! An [`Executor`] binds one environment to a querier and caches the
//! last successful sample for the querier's interval. Concurrent reads
//! on the same executor serialize behind its mutex, so at most one
//! refresh is in flight per environment.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::client::Sample;
use crate::config::QueryConfig;
use crate::error::QueryError;

/// The querier side of an executor binding.
#[async_trait]
pub trait Querier: Send + Sync {
    /// The querier's configuration.
    fn config(&self) -> &QueryConfig;

    /// Run (or serve from a shared cache) the query for one
    /// environment, returning the raw sample.
    async fn query_for(&self, name: &str, namespace: &str) -> Result<Sample, QueryError>;

    /// Reserve the environment's slot. Called once when binding.
    fn register(&self, name: &str, namespace: &str);

    /// Release the environment's slot. Called once on destroy.
    fn release(&self, name: &str, namespace: &str);
}

#[derive(Default)]
struct CacheState {
    sample: Option<Sample>,
    fetched_at: Option<Instant>,
    destroyed: bool,
}

/// A bound, interval-cached view of one querier for one environment.
pub struct Executor {
    querier: Arc<dyn Querier>,
    name: String,
    namespace: String,
    cache: tokio::sync::Mutex<CacheState>,
    last_update: Mutex<Option<DateTime<Utc>>>,
}

impl Executor {
    /// Bind an environment to a querier.
    pub fn bind(querier: Arc<dyn Querier>, name: &str, namespace: &str) -> Self {
        querier.register(name, namespace);
        Self {
            querier,
            name: name.to_string(),
            namespace: namespace.to_string(),
            cache: tokio::sync::Mutex::new(CacheState::default()),
            last_update: Mutex::new(None),
        }
    }

    /// The current sample, refreshed at most once per interval.
    pub async fn sample(&self) -> Result<Sample, QueryError> {
        let mut cache = self.cache.lock().await;
        if cache.destroyed {
            return Err(QueryError::Destroyed);
        }

        if let (Some(sample), Some(fetched_at)) = (&cache.sample, cache.fetched_at) {
            if fetched_at.elapsed() < self.querier.config().interval {
                return Ok(sample.clone());
            }
        }

        let sample = self
            .querier
            .query_for(&self.name, &self.namespace)
            .await?;
        cache.sample = Some(sample.clone());
        cache.fetched_at = Some(Instant::now());
        *self.last_update.lock().unwrap() = Some(Utc::now());
        Ok(sample)
    }

    /// The numeric sample value.
    pub async fn value(&self) -> Result<f64, QueryError> {
        Ok(self.sample().await?.value)
    }

    /// The textual sample value: the configured extract label if
    /// present on the sample, otherwise the stringified numeric.
    pub async fn text(&self) -> Result<String, QueryError> {
        let sample = self.sample().await?;
        Ok(self.text_of(&sample))
    }

    /// Extract the textual value from an already-fetched sample.
    pub fn text_of(&self, sample: &Sample) -> String {
        if let Some(label) = &self.querier.config().extract_label {
            if let Some(value) = sample.labels.get(label) {
                if !value.is_empty() {
                    return value.clone();
                }
            }
        }
        format!("{}", sample.value)
    }

    /// The time of the last successful refresh.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.lock().unwrap()
    }

    /// Drop the cache and release the querier slot. Further reads
    /// fail with [`QueryError::Destroyed`].
    pub async fn destroy(&self) {
        let mut cache = self.cache.lock().await;
        if cache.destroyed {
            return;
        }
        cache.destroyed = true;
        cache.sample = None;
        cache.fetched_at = None;
        *self.last_update.lock().unwrap() = None;
        self.querier.release(&self.name, &self.namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryKind;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingQuerier {
        cfg: QueryConfig,
        calls: AtomicUsize,
    }

    impl CountingQuerier {
        fn new(interval: Duration) -> Self {
            Self {
                cfg: QueryConfig {
                    name: "test".to_string(),
                    kind: QueryKind::Single,
                    query: "vector(1)".to_string(),
                    match_on: None,
                    match_label: None,
                    extract_label: Some("version".to_string()),
                    interval,
                    timeout: Duration::from_millis(100),
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Querier for CountingQuerier {
        fn config(&self) -> &QueryConfig {
            &self.cfg
        }

        async fn query_for(&self, _name: &str, _namespace: &str) -> Result<Sample, QueryError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Sample {
                labels: HashMap::from([("version".to_string(), format!("v{n}"))]),
                value: n as f64,
                timestamp: Utc::now(),
            })
        }

        fn register(&self, _name: &str, _namespace: &str) {}
        fn release(&self, _name: &str, _namespace: &str) {}
    }

    #[tokio::test]
    async fn serves_cached_sample_within_interval() {
        let querier = Arc::new(CountingQuerier::new(Duration::from_secs(60)));
        let exec = Executor::bind(querier.clone(), "a", "env-a");

        assert_eq!(exec.value().await.unwrap(), 1.0);
        assert_eq!(exec.value().await.unwrap(), 1.0);
        assert_eq!(querier.calls.load(Ordering::SeqCst), 1);
        assert!(exec.last_update().is_some());
    }

    #[tokio::test]
    async fn refreshes_after_interval() {
        let querier = Arc::new(CountingQuerier::new(Duration::from_millis(10)));
        let exec = Executor::bind(querier.clone(), "a", "env-a");

        assert_eq!(exec.value().await.unwrap(), 1.0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(exec.value().await.unwrap(), 2.0);
        assert_eq!(querier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn text_prefers_extract_label() {
        let querier = Arc::new(CountingQuerier::new(Duration::from_secs(60)));
        let exec = Executor::bind(querier, "a", "env-a");
        assert_eq!(exec.text().await.unwrap(), "v1");
    }

    #[tokio::test]
    async fn destroy_rejects_further_reads() {
        let querier = Arc::new(CountingQuerier::new(Duration::from_secs(60)));
        let exec = Executor::bind(querier, "a", "env-a");
        exec.destroy().await;
        assert!(matches!(exec.value().await, Err(QueryError::Destroyed)));
        assert!(exec.last_update().is_none());
    }
}
