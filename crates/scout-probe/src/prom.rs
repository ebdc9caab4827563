//! Probes backed by time-series queries.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use scout_prom::{new_querier, Executor, QueryBackend, QueryConfig, Querier};

use crate::convert::FromSample;
use crate::meta::{MetaProbe, MetaType, MetaValue};
use crate::probe::{Probe, Prober};
use crate::ProbeError;

/// A prober binding environments to one querier, producing typed
/// probes through the result type's sample conversion.
pub struct PromProber<T> {
    querier: Arc<dyn Querier>,
    _type: PhantomData<fn() -> T>,
}

impl<T: FromSample> PromProber<T> {
    /// Build the querier for `cfg` and wrap it as a typed prober.
    pub fn new(backend: Arc<dyn QueryBackend>, cfg: QueryConfig) -> Result<Self, ProbeError> {
        Ok(Self::from_querier(new_querier(backend, cfg)?))
    }

    /// Wrap an existing querier.
    pub fn from_querier(querier: Arc<dyn Querier>) -> Self {
        Self {
            querier,
            _type: PhantomData,
        }
    }
}

impl<T: FromSample> Prober<T> for PromProber<T> {
    fn add_environment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Arc<dyn Probe<T>>, ProbeError> {
        debug!(
            prober = %self.querier.config().name,
            env_name = name,
            env_namespace = namespace,
            "binding environment to querier"
        );
        Ok(Arc::new(PromProbe::<T> {
            exec: Executor::bind(self.querier.clone(), name, namespace),
            _type: PhantomData,
        }))
    }
}

struct PromProbe<T> {
    exec: Executor,
    _type: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T: FromSample> Probe<T> for PromProbe<T> {
    async fn value(&self) -> Result<T, ProbeError> {
        let sample = self.exec.sample().await?;
        let text = self.exec.text_of(&sample);
        Ok(T::from_sample(sample.value, &text))
    }

    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.exec.last_update()
    }

    async fn destroy(&self) {
        self.exec.destroy().await;
    }
}

/// Adapts a typed prober to produce metadata probes.
struct MetaProber<T> {
    inner: PromProber<T>,
}

impl<T> Prober<MetaValue> for MetaProber<T>
where
    T: FromSample,
    MetaValue: From<T>,
{
    fn add_environment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Arc<dyn Probe<MetaValue>>, ProbeError> {
        let probe = self.inner.add_environment(name, namespace)?;
        Ok(MetaProbe::wrap(probe))
    }
}

/// Build a metadata prober for the declared result type.
pub fn new_meta_prober(
    backend: Arc<dyn QueryBackend>,
    meta_type: MetaType,
    cfg: QueryConfig,
) -> Result<Arc<dyn Prober<MetaValue>>, ProbeError> {
    let querier = new_querier(backend, cfg)?;
    Ok(match meta_type {
        MetaType::String => Arc::new(MetaProber {
            inner: PromProber::<String>::from_querier(querier),
        }),
        MetaType::Bool => Arc::new(MetaProber {
            inner: PromProber::<bool>::from_querier(querier),
        }),
        MetaType::Number => Arc::new(MetaProber {
            inner: PromProber::<f64>::from_querier(querier),
        }),
        MetaType::Timestamp => Arc::new(MetaProber {
            inner: PromProber::<DateTime<Utc>>::from_querier(querier),
        }),
    })
}
