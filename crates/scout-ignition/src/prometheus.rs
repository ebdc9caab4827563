//! The built-in Prometheus ignition provider.
//!
//! Ignition is recorded as a gauge observation; whatever reacts to the
//! request (alert rule, scaler, operator) watches the metric.

use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use scout_metrics::GaugeVec;

use crate::config::PrometheusProviderConfig;
use crate::error::IgnitionError;
use crate::provider::{Provider, TriggerRequest};

static IGNITION_REQUESTED_AT: LazyLock<Arc<GaugeVec>> = LazyLock::new(|| {
    scout_metrics::global().gauge_vec(
        "last_ignition_requested",
        "Unix timestamp of the latest ignition trigger request.",
        &["environment", "namespace"],
    )
});

pub struct PrometheusProvider {
    _cfg: PrometheusProviderConfig,
}

impl PrometheusProvider {
    pub fn new(cfg: PrometheusProviderConfig) -> Self {
        Self { _cfg: cfg }
    }
}

#[async_trait]
impl Provider for PrometheusProvider {
    async fn trigger(&self, req: TriggerRequest) -> Result<(), IgnitionError> {
        if req.environment.is_empty() {
            return Err(IgnitionError::EnvironmentRequired);
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as f64;
        IGNITION_REQUESTED_AT.set(&[&req.environment, &req.namespace], now);
        Ok(())
    }
}
