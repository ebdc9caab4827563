//! Provider contract and trigger instrumentation.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use tracing::debug;

use scout_metrics::CounterVec;

use crate::config::ProviderConfig;
use crate::error::IgnitionError;
use crate::prometheus::PrometheusProvider;

static IGNITION_TRIGGERS: LazyLock<Arc<CounterVec>> = LazyLock::new(|| {
    scout_metrics::global().counter_vec(
        "ignition_triggers_total",
        "Total number of ignition trigger attempts.",
        &["provider", "environment", "namespace", "status"],
    )
});

/// One ignition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRequest {
    pub environment: String,
    pub namespace: String,
}

/// Performs the provider-defined ignition side effect.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn trigger(&self, req: TriggerRequest) -> Result<(), IgnitionError>;
}

/// Wraps a provider with trigger counting.
struct InstrumentedProvider<P> {
    provider_name: &'static str,
    next: P,
}

#[async_trait]
impl<P: Provider> Provider for InstrumentedProvider<P> {
    async fn trigger(&self, req: TriggerRequest) -> Result<(), IgnitionError> {
        let environment = req.environment.clone();
        let namespace = req.namespace.clone();
        match self.next.trigger(req).await {
            Ok(()) => {
                IGNITION_TRIGGERS.inc(&[self.provider_name, &environment, &namespace, "accepted"]);
                Ok(())
            }
            Err(err) => {
                IGNITION_TRIGGERS.inc(&[self.provider_name, &environment, &namespace, "error"]);
                Err(err)
            }
        }
    }
}

/// Build the configured provider, wrapped with instrumentation.
pub fn new_provider(cfg: &ProviderConfig) -> Arc<dyn Provider> {
    debug!(provider = cfg.provider_type.as_str(), "initializing ignition provider");
    match cfg.provider_type {
        crate::config::ProviderType::Prometheus => Arc::new(InstrumentedProvider {
            provider_name: cfg.provider_type.as_str(),
            next: PrometheusProvider::new(cfg.prometheus.clone().unwrap_or_default()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_counts_accepted() {
        let provider = new_provider(&ProviderConfig::default());
        provider
            .trigger(TriggerRequest {
                environment: "counted".to_string(),
                namespace: "env-counted".to_string(),
            })
            .await
            .unwrap();

        assert!(
            IGNITION_TRIGGERS.get(&["prometheus", "counted", "env-counted", "accepted"]) >= 1.0
        );
    }

    #[tokio::test]
    async fn trigger_counts_errors() {
        let provider = new_provider(&ProviderConfig::default());
        let err = provider
            .trigger(TriggerRequest {
                environment: String::new(),
                namespace: "env-x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IgnitionError::EnvironmentRequired));
        assert!(IGNITION_TRIGGERS.get(&["prometheus", "", "env-x", "error"]) >= 1.0);
    }
}
