//! Bulk queries shared by every bound environment.
//!
//! One query answers for all environments at once; the result vector is
//! indexed by the configured match label. The cache refreshes at most
//! once per interval regardless of how many environments read from it,
//! and concurrent readers serialize behind the querier mutex during a
//! refresh.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::client::{QueryBackend, Sample};
use crate::config::{MatchOn, QueryConfig, QueryKind};
use crate::error::QueryError;
use crate::executor::Querier;
use crate::telemetry::QueryTimer;

#[derive(Default)]
struct BulkState {
    last_query: Option<Instant>,
    last_query_at: Option<DateTime<Utc>>,
    cache: HashMap<String, Sample>,
}

/// A non-templated query whose result rows are fanned out across
/// environments by match key.
pub struct BulkQuery {
    backend: Arc<dyn QueryBackend>,
    cfg: QueryConfig,
    match_on: MatchOn,
    match_label: String,
    state: tokio::sync::Mutex<BulkState>,
    slots: Mutex<HashSet<String>>,
}

impl BulkQuery {
    pub fn new(backend: Arc<dyn QueryBackend>, cfg: QueryConfig) -> Result<Arc<Self>, QueryError> {
        cfg.validate()?;
        if cfg.kind != QueryKind::Bulk {
            return Err(QueryError::InvalidConfig(format!(
                "kind {} is not bulk",
                cfg.kind
            )));
        }
        // validate() guarantees both are present for bulk configs.
        let match_on = cfg.match_on.expect("validated bulk config");
        let match_label = cfg.match_label.clone().expect("validated bulk config");
        debug!(
            name = %cfg.name,
            query = %cfg.query,
            interval = ?cfg.interval,
            timeout = ?cfg.timeout,
            match_on = ?match_on,
            match_label = %match_label,
            "created bulk query"
        );
        Ok(Arc::new(Self {
            backend,
            cfg,
            match_on,
            match_label,
            state: tokio::sync::Mutex::new(BulkState::default()),
            slots: Mutex::new(HashSet::new()),
        }))
    }

    fn match_key(&self, name: &str, namespace: &str) -> String {
        match self.match_on {
            MatchOn::Name => name.to_string(),
            MatchOn::Namespace => namespace.to_string(),
        }
    }

    /// Number of environments currently bound.
    pub fn bound_environments(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

#[async_trait]
impl Querier for BulkQuery {
    fn config(&self) -> &QueryConfig {
        &self.cfg
    }

    async fn query_for(&self, name: &str, namespace: &str) -> Result<Sample, QueryError> {
        let mut state = self.state.lock().await;
        let timer = QueryTimer::start(&self.cfg.name, "bulk");
        let key = self.match_key(name, namespace);

        if let Some(last_query) = state.last_query {
            if last_query.elapsed() < self.cfg.interval {
                timer.finish("cached");
                if let Some(sample) = state.cache.get(&key) {
                    return Ok(sample.clone());
                }
                // Interval has not elapsed and the key has no data:
                // absence is legitimate, report a zero sample stamped
                // with the last refresh.
                let at = state.last_query_at.unwrap_or_else(Utc::now);
                return Ok(Sample::zero(at));
            }
        }

        state.cache.clear();
        debug!(name = %self.cfg.name, query = %self.cfg.query, "executing bulk query");
        let samples = self
            .backend
            .query(&self.cfg.query, self.cfg.timeout, None)
            .await?;
        if samples.is_empty() {
            warn!(name = %self.cfg.name, query = %self.cfg.query, "bulk query returned no results");
        }

        for sample in samples {
            let row_key = sample
                .labels
                .get(&self.match_label)
                .cloned()
                .unwrap_or_default();
            state.cache.insert(row_key, sample);
        }
        state.last_query = Some(Instant::now());
        state.last_query_at = Some(Utc::now());
        timer.finish("success");

        match state.cache.get(&key) {
            Some(sample) => Ok(sample.clone()),
            None => {
                warn!(
                    name = %self.cfg.name,
                    match_key = %key,
                    "no result for bound environment after bulk query"
                );
                Ok(Sample::zero(Utc::now()))
            }
        }
    }

    fn register(&self, name: &str, namespace: &str) {
        self.slots
            .lock()
            .unwrap()
            .insert(self.match_key(name, namespace));
    }

    fn release(&self, name: &str, namespace: &str) {
        self.slots
            .lock()
            .unwrap()
            .remove(&self.match_key(name, namespace));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingBackend {
        calls: AtomicUsize,
        rows: Vec<(&'static str, f64)>,
    }

    #[async_trait]
    impl QueryBackend for CountingBackend {
        async fn query(
            &self,
            _promql: &str,
            _timeout: Duration,
            _limit: Option<usize>,
        ) -> Result<Vec<Sample>, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .rows
                .iter()
                .map(|(ns, value)| Sample {
                    labels: HashMap::from([("namespace".to_string(), ns.to_string())]),
                    value: *value,
                    timestamp: Utc::now(),
                })
                .collect())
        }
    }

    fn cfg(interval: Duration) -> QueryConfig {
        QueryConfig {
            name: "active".to_string(),
            kind: QueryKind::Bulk,
            query: "sum(up) by (namespace)".to_string(),
            match_on: Some(MatchOn::Namespace),
            match_label: Some("namespace".to_string()),
            extract_label: None,
            interval,
            timeout: Duration::from_millis(100).min(interval / 2),
        }
    }

    #[tokio::test]
    async fn one_query_serves_all_environments() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            rows: vec![("env-a", 1.0), ("env-b", 2.0)],
        });
        let query = BulkQuery::new(backend.clone(), cfg(Duration::from_secs(60))).unwrap();

        let a = query.query_for("a", "env-a").await.unwrap();
        let b = query.query_for("b", "env-b").await.unwrap();
        assert_eq!(a.value, 1.0);
        assert_eq!(b.value, 2.0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_environment_gets_zero_sample() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            rows: vec![("env-a", 1.0)],
        });
        let query = BulkQuery::new(backend, cfg(Duration::from_secs(60))).unwrap();

        let missing = query.query_for("c", "env-c").await.unwrap();
        assert_eq!(missing.value, 0.0);
        // A fresh cache hit for an unknown key also reports zero.
        let missing = query.query_for("c", "env-c").await.unwrap();
        assert_eq!(missing.value, 0.0);
    }

    #[tokio::test]
    async fn refresh_happens_after_interval() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            rows: vec![("env-a", 1.0)],
        });
        let query = BulkQuery::new(backend.clone(), cfg(Duration::from_millis(10))).unwrap();

        query.query_for("a", "env-a").await.unwrap();
        query.query_for("a", "env-a").await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        query.query_for("a", "env-a").await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn executor_destroy_releases_slot() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            rows: vec![],
        });
        let query = BulkQuery::new(backend, cfg(Duration::from_secs(60))).unwrap();

        let exec = Executor::bind(query.clone(), "a", "env-a");
        assert_eq!(query.bound_environments(), 1);
        exec.destroy().await;
        assert_eq!(query.bound_environments(), 0);
    }
}
