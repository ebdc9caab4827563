//! Prober setup from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, warn};

use scout_probe::{new_meta_prober, MetaValue, Prober, PromProber};
use scout_prom::{Client, QueryBackend};

use crate::config::FileConfig;

/// Globally configured probers, built once at startup and bound to
/// every discovered environment.
#[derive(Default)]
pub struct Probers {
    pub checks: HashMap<String, Arc<dyn Prober<bool>>>,
    pub metadata: HashMap<String, Arc<dyn Prober<MetaValue>>>,
}

/// Initialize status check and metadata probers.
///
/// Any prober that cannot be set up aborts startup.
pub async fn setup_probers(cfg: &FileConfig) -> anyhow::Result<Probers> {
    let mut probers = Probers::default();

    let Some(prom_cfg) = &cfg.prometheus else {
        if !cfg.status_checks.is_empty() || !cfg.metadata.is_empty() {
            warn!("status checks or metadata configured without a prometheus backend, ignoring them");
        }
        return Ok(probers);
    };

    debug!(url = %prom_cfg.address, "setting up Prometheus client");
    let backend: Arc<dyn QueryBackend> = Arc::new(
        Client::connect(prom_cfg)
            .await
            .context("failed to create Prometheus client")?,
    );

    for (name, check) in &cfg.status_checks {
        let mut check = check.clone();
        check.name = name.clone();
        let prober = PromProber::<bool>::new(backend.clone(), check)
            .with_context(|| format!("failed to create prober for check {name:?}"))?;
        probers.checks.insert(name.clone(), Arc::new(prober));
    }

    for (name, metadata) in &cfg.metadata {
        let prober = new_meta_prober(backend.clone(), metadata.meta_type, metadata.query_config(name))
            .with_context(|| format!("failed to create metadata prober for {name:?}"))?;
        probers.metadata.insert(name.clone(), prober);
    }

    Ok(probers)
}
