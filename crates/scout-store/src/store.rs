//! The concurrent environment registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use tokio::sync::RwLock;
use tracing::{info, warn};

use scout_metrics::GaugeVec;

use crate::environment::Environment;
use crate::error::{StoreError, StoreResult};

static ENV_INFO: LazyLock<Arc<GaugeVec>> = LazyLock::new(|| {
    scout_metrics::global().gauge_vec(
        "environment_info",
        "Liveness of discovered environments.",
        &["name", "namespace"],
    )
});

/// Thread-safe registry of environments keyed by name.
///
/// Cheap to clone; all clones share the same map.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    env: RwLock<HashMap<String, Environment>>,
    live: AtomicUsize,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the total-environments gauge against the global
    /// registry. Called once at startup.
    pub fn register_metrics(&self) {
        let store = self.clone();
        scout_metrics::global().gauge_fn(
            "environments",
            "Total number of discovered environments.",
            move || store.count() as f64,
        );
    }

    /// Add a new environment.
    ///
    /// A name collision destroys the prior entry and inserts the new
    /// one; refusing the insert would desynchronize the store from the
    /// orchestrator's event stream.
    pub async fn add(&self, env: Environment) -> StoreResult<()> {
        let mut map = self.inner.env.write().await;
        self.add_locked(&mut map, env).await
    }

    async fn add_locked(
        &self,
        map: &mut HashMap<String, Environment>,
        env: Environment,
    ) -> StoreResult<()> {
        env.validate()?;

        if let Some(existing) = map.get(&env.name) {
            warn!(
                name = %env.name,
                old_namespace = %existing.namespace,
                new_namespace = %env.namespace,
                "environment with this name already exists, overwriting it"
            );
            self.delete_locked(map, &env.name).await?;
        }

        ENV_INFO.set(&[&env.name, &env.namespace], 1.0);
        map.insert(env.name.clone(), env);
        self.inner.live.store(map.len(), Ordering::Relaxed);
        Ok(())
    }

    /// Remove an environment and destroy every probe it owns.
    pub async fn delete(&self, name: &str) -> StoreResult<()> {
        let mut map = self.inner.env.write().await;
        self.delete_locked(&mut map, name).await
    }

    async fn delete_locked(
        &self,
        map: &mut HashMap<String, Environment>,
        name: &str,
    ) -> StoreResult<()> {
        let env = map
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        for probe in env.status_checks.values() {
            probe.destroy().await;
        }
        for probe in env.meta_probes.values() {
            probe.destroy().await;
        }

        ENV_INFO.remove(&[&env.name, &env.namespace]);
        self.inner.live.store(map.len(), Ordering::Relaxed);
        Ok(())
    }

    /// Look up an environment by name.
    pub async fn get(&self, name: &str) -> StoreResult<Environment> {
        let map = self.inner.env.read().await;
        map.get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Look up an environment by its backing namespace.
    pub async fn get_by_namespace(&self, namespace: &str) -> StoreResult<Environment> {
        let map = self.inner.env.read().await;
        map.values()
            .find(|env| env.namespace == namespace)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("namespace {namespace}")))
    }

    /// Snapshot every environment. Order is unspecified.
    pub async fn get_all(&self) -> Vec<Environment> {
        let map = self.inner.env.read().await;
        map.values().cloned().collect()
    }

    /// Every environment name, sorted ascending.
    pub async fn list_names(&self) -> Vec<String> {
        let map = self.inner.env.read().await;
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of environments matching a status filter, sorted
    /// ascending.
    pub async fn names_matching_state(&self, filter: &HashMap<String, bool>) -> Vec<String> {
        let map = self.inner.env.read().await;
        let mut names = Vec::new();
        for (name, env) in map.iter() {
            if env.matches_status(filter).await {
                names.push(name.clone());
            }
        }
        names.sort();
        names
    }

    /// Number of live environments.
    pub fn count(&self) -> usize {
        self.inner.live.load(Ordering::Relaxed)
    }

    /// Update the environment previously known as `old_name`.
    ///
    /// Falls back to `add` when `old_name` is absent. When any
    /// immutable field differs the old entry is destroyed and the new
    /// one added, so probe teardown runs exactly once per entry.
    pub async fn update(&self, old_name: &str, env: Environment) -> StoreResult<()> {
        let mut map = self.inner.env.write().await;

        let Some(current) = map.get(old_name) else {
            return self.add_locked(&mut map, env).await;
        };

        if current.immutable_fields_differ(&env) {
            info!(
                old_name,
                new_name = %env.name,
                namespace = %env.namespace,
                "immutable fields changed, re-adding environment"
            );
            self.delete_locked(&mut map, old_name).await?;
            return self.add_locked(&mut map, env).await;
        }

        let mut merged = current.clone();
        merged.urls = env.urls;
        merged.status_checks = env.status_checks;
        merged.meta_probes = env.meta_probes;
        map.insert(merged.name.clone(), merged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use scout_probe::StaticProbe;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use chrono::DateTime;
    use scout_probe::{Probe, ProbeError};

    fn env(name: &str, namespace: &str) -> Environment {
        Environment {
            name: name.to_string(),
            namespace: namespace.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            urls: BTreeMap::new(),
            status_checks: HashMap::new(),
            meta_probes: HashMap::new(),
        }
    }

    struct TrackingProbe {
        destroyed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Probe<bool> for TrackingProbe {
        async fn value(&self) -> Result<bool, ProbeError> {
            Ok(true)
        }

        fn last_update(&self) -> Option<DateTime<Utc>> {
            None
        }

        async fn destroy(&self) {
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn add_and_get() {
        let store = Store::new();
        store.add(env("a", "env-a")).await.unwrap();

        let got = store.get("a").await.unwrap();
        assert_eq!(got.name, "a");
        assert_eq!(got.namespace, "env-a");
        assert_eq!(store.count(), 1);
        assert!(matches!(
            store.get("missing").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn add_rejects_invalid() {
        let store = Store::new();
        assert!(matches!(
            store.add(env("", "env-a")).await,
            Err(StoreError::InvalidEnvironment(_))
        ));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn name_collision_overwrites_and_destroys() {
        let store = Store::new();
        let destroyed = Arc::new(AtomicBool::new(false));

        let mut first = env("a", "env-a");
        first.status_checks.insert(
            "healthy".to_string(),
            Arc::new(TrackingProbe {
                destroyed: destroyed.clone(),
            }),
        );
        store.add(first).await.unwrap();

        store.add(env("a", "env-b")).await.unwrap();
        assert!(destroyed.load(Ordering::SeqCst));
        assert_eq!(store.count(), 1);
        assert_eq!(store.get("a").await.unwrap().namespace, "env-b");
    }

    #[tokio::test]
    async fn delete_destroys_probes() {
        let store = Store::new();
        let destroyed = Arc::new(AtomicBool::new(false));

        let mut e = env("a", "env-a");
        e.status_checks.insert(
            "healthy".to_string(),
            Arc::new(TrackingProbe {
                destroyed: destroyed.clone(),
            }),
        );
        store.add(e).await.unwrap();

        store.delete("a").await.unwrap();
        assert!(destroyed.load(Ordering::SeqCst));
        assert_eq!(store.count(), 0);
        assert!(matches!(
            store.delete("a").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn get_by_namespace_finds_unique_entry() {
        let store = Store::new();
        store.add(env("a", "env-a")).await.unwrap();
        store.add(env("b", "env-b")).await.unwrap();

        assert_eq!(store.get_by_namespace("env-b").await.unwrap().name, "b");
        assert!(store.get_by_namespace("env-missing").await.is_err());
    }

    #[tokio::test]
    async fn list_names_is_sorted() {
        let store = Store::new();
        store.add(env("charlie", "env-c")).await.unwrap();
        store.add(env("alpha", "env-a")).await.unwrap();
        store.add(env("bravo", "env-b")).await.unwrap();

        assert_eq!(store.list_names().await, vec!["alpha", "bravo", "charlie"]);
    }

    #[tokio::test]
    async fn update_in_place_replaces_maps() {
        let store = Store::new();
        store.add(env("a", "env-a")).await.unwrap();

        let mut updated = env("a", "env-a");
        updated
            .urls
            .insert("api".to_string(), "https://api.example".to_string());
        updated
            .status_checks
            .insert("healthy".to_string(), Arc::new(StaticProbe::new(true)));
        store.update("a", updated).await.unwrap();

        let got = store.get("a").await.unwrap();
        assert_eq!(got.urls.get("api").unwrap(), "https://api.example");
        assert!(got.status_checks.contains_key("healthy"));
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn update_immutable_change_recreates_entry() {
        let store = Store::new();
        let destroyed = Arc::new(AtomicBool::new(false));

        let mut e = env("a", "env-a");
        e.status_checks.insert(
            "healthy".to_string(),
            Arc::new(TrackingProbe {
                destroyed: destroyed.clone(),
            }),
        );
        store.add(e).await.unwrap();

        store.update("a", env("renamed", "env-a")).await.unwrap();

        assert!(destroyed.load(Ordering::SeqCst));
        assert!(store.get("a").await.is_err());
        assert_eq!(store.get("renamed").await.unwrap().namespace, "env-a");
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn update_missing_falls_back_to_add() {
        let store = Store::new();
        store.update("ghost", env("a", "env-a")).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().name, "a");
    }

    #[tokio::test]
    async fn names_matching_state_filters_and_sorts() {
        let store = Store::new();

        let mut a = env("a", "env-a");
        a.status_checks
            .insert("healthy".to_string(), Arc::new(StaticProbe::new(true)));
        store.add(a).await.unwrap();

        let mut b = env("b", "env-b");
        b.status_checks
            .insert("healthy".to_string(), Arc::new(StaticProbe::new(false)));
        store.add(b).await.unwrap();

        store.add(env("c", "env-c")).await.unwrap();

        let healthy = HashMap::from([("healthy".to_string(), true)]);
        assert_eq!(store.names_matching_state(&healthy).await, vec!["a"]);

        let unhealthy = HashMap::from([("healthy".to_string(), false)]);
        assert_eq!(
            store.names_matching_state(&unhealthy).await,
            vec!["b", "c"]
        );

        assert_eq!(
            store.names_matching_state(&HashMap::new()).await,
            vec!["a", "b", "c"]
        );
    }
}
