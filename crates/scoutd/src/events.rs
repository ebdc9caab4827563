//! Namespace event reduction.
//!
//! Translates namespace add/update/delete events into store mutations,
//! building probe sets from annotations and the globally configured
//! probers. Per-environment annotations always shadow global probers
//! of the same name.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use scout_metrics::CounterVec;
use scout_probe::{parse_meta_annotation, MetaValue, Probe, Prober, StaticProbe};
use scout_store::{Environment, Store};

/// Label carrying the environment name.
pub const LABEL_ENV_NAME: &str = "name.scout.dev";
/// Annotation prefix for endpoint URLs.
pub const ANNOTATION_URL_PREFIX: &str = "url.scout.dev/";
/// Annotation prefix for static status checks.
pub const ANNOTATION_STATUS_PREFIX: &str = "status.scout.dev/";
/// Annotation prefix for static metadata.
pub const ANNOTATION_METADATA_PREFIX: &str = "metadata.scout.dev/";

static EVENTS_PROCESSED: LazyLock<Arc<CounterVec>> = LazyLock::new(|| {
    scout_metrics::global().counter_vec(
        "events_processed_total",
        "Total number of processed namespace events.",
        &["event_type", "status"],
    )
});

/// The slice of a namespace object the reducer consumes.
#[derive(Debug, Clone)]
pub struct NamespaceView {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl NamespaceView {
    /// The environment name declared on the namespace, if any.
    pub fn env_name(&self) -> &str {
        self.labels
            .get(LABEL_ENV_NAME)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Reduces namespace events into store mutations.
pub struct EventHandler {
    store: Store,
    checks: HashMap<String, Arc<dyn Prober<bool>>>,
    metadata: HashMap<String, Arc<dyn Prober<MetaValue>>>,
}

impl EventHandler {
    pub fn new(
        store: Store,
        checks: HashMap<String, Arc<dyn Prober<bool>>>,
        metadata: HashMap<String, Arc<dyn Prober<MetaValue>>>,
    ) -> Self {
        Self {
            store,
            checks,
            metadata,
        }
    }

    pub async fn handle_add(&self, ns: &NamespaceView) {
        let name = ns.env_name();
        if name.is_empty() {
            debug!(namespace = %ns.name, "namespace has no environment name, skipping");
            return;
        }

        let env = self.build_environment(name, ns);
        match self.store.add(env).await {
            Ok(()) => EVENTS_PROCESSED.inc(&["namespace_add", "success"]),
            Err(err) => {
                error!(name, error = %err, "failed to add environment");
                EVENTS_PROCESSED.inc(&["namespace_add", "error"]);
            }
        }
    }

    pub async fn handle_update(&self, old_ns: &NamespaceView, new_ns: &NamespaceView) {
        let old_name = old_ns.env_name();
        let new_name = new_ns.env_name();
        if new_name.is_empty() {
            debug!(namespace = %new_ns.name, "namespace has no environment name, skipping");
            return;
        }

        let env = self.build_environment(new_name, new_ns);
        match self.store.update(old_name, env).await {
            Ok(()) => EVENTS_PROCESSED.inc(&["namespace_update", "success"]),
            Err(err) => {
                error!(old_name, new_name, error = %err, "failed to update environment");
                EVENTS_PROCESSED.inc(&["namespace_update", "error"]);
            }
        }
    }

    pub async fn handle_delete(&self, ns: &NamespaceView) {
        let name = ns.env_name();
        if name.is_empty() {
            debug!(namespace = %ns.name, "namespace has no environment name, skipping");
            return;
        }

        match self.store.delete(name).await {
            Ok(()) => EVENTS_PROCESSED.inc(&["namespace_delete", "success"]),
            Err(err) => {
                error!(name, error = %err, "failed to delete environment");
                EVENTS_PROCESSED.inc(&["namespace_delete", "error"]);
            }
        }
    }

    fn build_environment(&self, name: &str, ns: &NamespaceView) -> Environment {
        Environment {
            name: name.to_string(),
            namespace: ns.name.clone(),
            created_at: ns.created_at,
            urls: self.build_urls(ns),
            status_checks: self.build_status_checks(name, ns),
            meta_probes: self.build_meta_probes(name, ns),
        }
    }

    fn build_urls(&self, ns: &NamespaceView) -> BTreeMap<String, String> {
        let mut urls = BTreeMap::new();
        for (key, value) in &ns.annotations {
            if let Some(endpoint) = key.strip_prefix(ANNOTATION_URL_PREFIX) {
                debug!(%key, %value, "found environment URL annotation");
                urls.insert(endpoint.to_string(), value.clone());
            }
        }
        urls
    }

    fn build_status_checks(
        &self,
        env_name: &str,
        ns: &NamespaceView,
    ) -> HashMap<String, Arc<dyn Probe<bool>>> {
        let mut checks: HashMap<String, Arc<dyn Probe<bool>>> = HashMap::new();

        for (key, value) in &ns.annotations {
            if let Some(check) = key.strip_prefix(ANNOTATION_STATUS_PREFIX) {
                debug!(%key, %value, "found environment status check annotation");
                let enabled = value == "true" || value == "1";
                checks.insert(check.to_string(), Arc::new(StaticProbe::new(enabled)));
            }
        }

        for (check, prober) in &self.checks {
            if checks.contains_key(check) {
                // Annotation shadows the global prober.
                continue;
            }
            match prober.add_environment(env_name, &ns.name) {
                Ok(probe) => {
                    checks.insert(check.clone(), probe);
                }
                Err(err) => {
                    error!(%check, env_name, error = %err, "failed to add environment to prober");
                }
            }
        }

        checks
    }

    fn build_meta_probes(
        &self,
        env_name: &str,
        ns: &NamespaceView,
    ) -> HashMap<String, Arc<dyn Probe<MetaValue>>> {
        let mut probes: HashMap<String, Arc<dyn Probe<MetaValue>>> = HashMap::new();

        for (key, value) in &ns.annotations {
            if let Some(meta) = key.strip_prefix(ANNOTATION_METADATA_PREFIX) {
                debug!(%key, %value, "found environment metadata annotation");
                probes.insert(meta.to_string(), parse_meta_annotation(value));
            }
        }

        for (meta, prober) in &self.metadata {
            if probes.contains_key(meta) {
                continue;
            }
            match prober.add_environment(env_name, &ns.name) {
                Ok(probe) => {
                    probes.insert(meta.clone(), probe);
                }
                Err(err) => {
                    error!(metadata = %meta, env_name, error = %err, "failed to add environment to metadata prober");
                }
            }
        }

        probes
    }
}
