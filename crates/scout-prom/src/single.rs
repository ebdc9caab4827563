//! Single-sample queries expanded per environment.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::client::{QueryBackend, Sample};
use crate::config::{QueryConfig, QueryKind};
use crate::error::QueryError;
use crate::executor::Querier;
use crate::telemetry::QueryTimer;
use crate::template::QueryTemplate;

/// A templated query expected to return exactly one sample per
/// environment. Each bound environment caches independently.
pub struct SingleQuery {
    backend: Arc<dyn QueryBackend>,
    template: QueryTemplate,
    cfg: QueryConfig,
}

impl SingleQuery {
    pub fn new(backend: Arc<dyn QueryBackend>, cfg: QueryConfig) -> Result<Arc<Self>, QueryError> {
        cfg.validate()?;
        if cfg.kind != QueryKind::Single {
            return Err(QueryError::InvalidConfig(format!(
                "kind {} is not single",
                cfg.kind
            )));
        }
        let template = QueryTemplate::parse(&cfg.query)?;
        debug!(
            name = %cfg.name,
            query = %cfg.query,
            interval = ?cfg.interval,
            timeout = ?cfg.timeout,
            "created single-sample query"
        );
        Ok(Arc::new(Self {
            backend,
            template,
            cfg,
        }))
    }
}

#[async_trait]
impl Querier for SingleQuery {
    fn config(&self) -> &QueryConfig {
        &self.cfg
    }

    async fn query_for(&self, name: &str, namespace: &str) -> Result<Sample, QueryError> {
        let timer = QueryTimer::start(&self.cfg.name, "single");
        let query = self.template.render(name, namespace);
        debug!(
            name = %self.cfg.name,
            env_name = name,
            env_namespace = namespace,
            query = %query,
            "executing query"
        );

        // Limit to 2 so an overflowing result set is detected without
        // transferring it.
        let samples = self
            .backend
            .query(&query, self.cfg.timeout, Some(2))
            .await?;

        match samples.len() {
            0 => {
                warn!(name = %self.cfg.name, env_name = name, query = %query, "query returned no results");
                Err(QueryError::ResultNotFound)
            }
            1 => {
                timer.finish("success");
                Ok(samples.into_iter().next().unwrap())
            }
            n => {
                warn!(
                    name = %self.cfg.name,
                    env_name = name,
                    query = %query,
                    num_results = n,
                    "query returned too many results"
                );
                Err(QueryError::TooManyResults(n))
            }
        }
    }

    fn register(&self, _name: &str, _namespace: &str) {}

    fn release(&self, _name: &str, _namespace: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchOn;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::time::Duration;

    struct FixedBackend {
        samples: Vec<Sample>,
    }

    #[async_trait]
    impl QueryBackend for FixedBackend {
        async fn query(
            &self,
            _promql: &str,
            _timeout: Duration,
            _limit: Option<usize>,
        ) -> Result<Vec<Sample>, QueryError> {
            Ok(self.samples.clone())
        }
    }

    fn sample(value: f64) -> Sample {
        Sample {
            labels: HashMap::new(),
            value,
            timestamp: Utc::now(),
        }
    }

    fn cfg() -> QueryConfig {
        QueryConfig {
            name: "healthy".to_string(),
            kind: QueryKind::Single,
            query: "vector(1)".to_string(),
            match_on: None,
            match_label: None,
            extract_label: None,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn one_sample_succeeds() {
        let query = SingleQuery::new(
            Arc::new(FixedBackend {
                samples: vec![sample(1.0)],
            }),
            cfg(),
        )
        .unwrap();
        let result = query.query_for("a", "env-a").await.unwrap();
        assert_eq!(result.value, 1.0);
    }

    #[tokio::test]
    async fn zero_samples_is_not_found() {
        let query = SingleQuery::new(Arc::new(FixedBackend { samples: vec![] }), cfg()).unwrap();
        assert!(matches!(
            query.query_for("a", "env-a").await,
            Err(QueryError::ResultNotFound)
        ));
    }

    #[tokio::test]
    async fn two_samples_is_too_many() {
        let query = SingleQuery::new(
            Arc::new(FixedBackend {
                samples: vec![sample(1.0), sample(2.0)],
            }),
            cfg(),
        )
        .unwrap();
        assert!(matches!(
            query.query_for("a", "env-a").await,
            Err(QueryError::TooManyResults(2))
        ));
    }

    #[tokio::test]
    async fn rejects_bulk_config() {
        let mut bulk = cfg();
        bulk.kind = QueryKind::Bulk;
        bulk.match_on = Some(MatchOn::Name);
        bulk.match_label = Some("env".to_string());
        assert!(SingleQuery::new(Arc::new(FixedBackend { samples: vec![] }), bulk).is_err());
    }
}
