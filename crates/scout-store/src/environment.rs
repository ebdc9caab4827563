//! Environment records and their response documents.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::error;

use scout_probe::{MetaValue, Probe, ProbeError};

use crate::error::{StoreError, StoreResult};

/// Character class for url/check/metadata keys (label value rules).
static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[-A-Za-z0-9_]+$").expect("valid pattern"));

/// One discovered ephemeral environment.
///
/// `name`, `namespace`, and `created_at` are immutable for the
/// lifetime of a store entry; the maps may be replaced atomically on
/// update.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    pub namespace: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "url")]
    pub urls: BTreeMap<String, String>,
    #[serde(skip)]
    pub status_checks: HashMap<String, Arc<dyn Probe<bool>>>,
    #[serde(skip)]
    pub meta_probes: HashMap<String, Arc<dyn Probe<MetaValue>>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("created_at", &self.created_at)
            .field("urls", &self.urls)
            .field("status_checks", &self.status_checks.keys())
            .field("meta_probes", &self.meta_probes.keys())
            .finish()
    }
}

/// The document returned by the detail and all-environments endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentResponse {
    #[serde(flatten)]
    pub environment: Environment,
    pub status: BTreeMap<String, bool>,
    pub status_updated_at: BTreeMap<String, Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, MetaValue>>,
}

impl Environment {
    /// Check structural invariants. Returns every problem found.
    pub fn validate(&self) -> StoreResult<()> {
        let mut problems = Vec::new();

        if self.name.is_empty() {
            problems.push("name cannot be empty".to_string());
        }
        if self.namespace.is_empty() {
            problems.push("namespace cannot be empty".to_string());
        }
        for (key, value) in &self.urls {
            if !KEY_PATTERN.is_match(key) {
                problems.push(format!("url key {key:?} is invalid"));
            }
            if value.is_empty() {
                problems.push(format!("url {key:?} cannot be empty"));
            }
        }
        for key in self.status_checks.keys() {
            if !KEY_PATTERN.is_match(key) {
                problems.push(format!("status check key {key:?} is invalid"));
            }
        }
        for key in self.meta_probes.keys() {
            if !KEY_PATTERN.is_match(key) {
                problems.push(format!("metadata key {key:?} is invalid"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            problems.sort();
            Err(StoreError::InvalidEnvironment(problems.join("; ")))
        }
    }

    /// Whether any immutable field differs from `other`'s.
    pub fn immutable_fields_differ(&self, other: &Environment) -> bool {
        self.name != other.name
            || self.namespace != other.namespace
            || self.created_at != other.created_at
    }

    /// Whether the environment matches a status filter.
    ///
    /// Each `(check, required)` entry must hold: a required check must
    /// be present and true; a forbidden check must be absent or false.
    /// Probe errors count as false — the filter is a best-effort
    /// classifier, not a source of truth.
    pub async fn matches_status(&self, filter: &HashMap<String, bool>) -> bool {
        for (check, required) in filter {
            match self.status_checks.get(check) {
                None => {
                    if *required {
                        return false;
                    }
                }
                Some(probe) => {
                    let value = probe.value().await.unwrap_or(false);
                    if value != *required {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Resolve probes into a response document.
    ///
    /// With `include_meta`, every metadata probe is resolved. `status`
    /// of `None` resolves every status check (the detail endpoint);
    /// `Some(filter)` resolves only checks whose filter entry is true
    /// (the all-environments endpoint). Probe errors abort resolution.
    pub async fn resolve(
        &self,
        include_meta: bool,
        status: Option<&HashMap<String, bool>>,
    ) -> Result<EnvironmentResponse, ProbeError> {
        let mut response = EnvironmentResponse {
            environment: self.clone(),
            status: BTreeMap::new(),
            status_updated_at: BTreeMap::new(),
            meta: None,
        };

        if include_meta {
            let mut meta = BTreeMap::new();
            for (name, probe) in &self.meta_probes {
                let value = probe.value().await.map_err(|err| {
                    error!(
                        name = %self.name,
                        metadata = %name,
                        error = %err,
                        "failed to resolve metadata value"
                    );
                    err
                })?;
                meta.insert(name.clone(), value);
            }
            response.meta = Some(meta);
        }

        for (name, probe) in &self.status_checks {
            if let Some(filter) = status {
                if !filter.get(name).copied().unwrap_or(false) {
                    continue;
                }
            }

            let value = probe.value().await.map_err(|err| {
                error!(
                    name = %self.name,
                    check = %name,
                    error = %err,
                    "failed to resolve status check"
                );
                err
            })?;
            response.status.insert(name.clone(), value);
            response
                .status_updated_at
                .insert(name.clone(), probe.last_update());
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scout_probe::StaticProbe;

    struct FailingProbe;

    #[async_trait]
    impl Probe<bool> for FailingProbe {
        async fn value(&self) -> Result<bool, ProbeError> {
            Err(ProbeError::ResultNotFound)
        }

        fn last_update(&self) -> Option<DateTime<Utc>> {
            None
        }
    }

    fn env(name: &str, namespace: &str) -> Environment {
        Environment {
            name: name.to_string(),
            namespace: namespace.to_string(),
            created_at: Utc::now(),
            urls: BTreeMap::new(),
            status_checks: HashMap::new(),
            meta_probes: HashMap::new(),
        }
    }

    fn with_check(mut env: Environment, check: &str, value: bool) -> Environment {
        env.status_checks
            .insert(check.to_string(), Arc::new(StaticProbe::new(value)));
        env
    }

    #[test]
    fn validate_accepts_wellformed() {
        let mut e = env("a", "env-a");
        e.urls
            .insert("api".to_string(), "https://api.example".to_string());
        assert!(e.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_name_and_namespace() {
        assert!(env("", "env-a").validate().is_err());
        assert!(env("a", "").validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_keys() {
        let mut e = env("a", "env-a");
        e.urls
            .insert("my endpoint".to_string(), "https://x".to_string());
        assert!(e.validate().is_err());

        let mut e = env("a", "env-a");
        e.urls.insert("api".to_string(), String::new());
        assert!(e.validate().is_err());
    }

    #[tokio::test]
    async fn matches_required_check() {
        let e = with_check(env("a", "env-a"), "healthy", true);
        let filter = HashMap::from([("healthy".to_string(), true)]);
        assert!(e.matches_status(&filter).await);

        let filter = HashMap::from([("healthy".to_string(), false)]);
        assert!(!e.matches_status(&filter).await);
    }

    #[tokio::test]
    async fn missing_check_counts_as_false() {
        let e = env("a", "env-a");
        let required = HashMap::from([("healthy".to_string(), true)]);
        assert!(!e.matches_status(&required).await);

        let forbidden = HashMap::from([("healthy".to_string(), false)]);
        assert!(e.matches_status(&forbidden).await);
    }

    #[tokio::test]
    async fn probe_error_counts_as_false() {
        let mut e = env("a", "env-a");
        e.status_checks
            .insert("healthy".to_string(), Arc::new(FailingProbe));

        let required = HashMap::from([("healthy".to_string(), true)]);
        assert!(!e.matches_status(&required).await);

        let forbidden = HashMap::from([("healthy".to_string(), false)]);
        assert!(e.matches_status(&forbidden).await);
    }

    #[tokio::test]
    async fn resolve_includes_all_checks_without_filter() {
        let e = with_check(
            with_check(env("a", "env-a"), "healthy", true),
            "active",
            false,
        );
        let response = e.resolve(false, None).await.unwrap();
        assert_eq!(response.status.get("healthy"), Some(&true));
        assert_eq!(response.status.get("active"), Some(&false));
        assert!(response.meta.is_none());
        // Static probes never report an update time.
        assert_eq!(response.status_updated_at.get("healthy"), Some(&None));
    }

    #[tokio::test]
    async fn resolve_with_filter_selects_positive_checks() {
        let e = with_check(
            with_check(env("a", "env-a"), "healthy", true),
            "active",
            true,
        );
        let filter = HashMap::from([
            ("healthy".to_string(), true),
            ("active".to_string(), false),
        ]);
        let response = e.resolve(false, Some(&filter)).await.unwrap();
        assert!(response.status.contains_key("healthy"));
        assert!(!response.status.contains_key("active"));
    }

    #[tokio::test]
    async fn resolve_with_empty_filter_resolves_nothing() {
        let e = with_check(env("a", "env-a"), "healthy", true);
        let response = e.resolve(false, Some(&HashMap::new())).await.unwrap();
        assert!(response.status.is_empty());
    }

    #[tokio::test]
    async fn resolve_propagates_probe_errors() {
        let mut e = env("a", "env-a");
        e.status_checks
            .insert("healthy".to_string(), Arc::new(FailingProbe));
        assert!(e.resolve(false, None).await.is_err());
    }

    #[tokio::test]
    async fn resolve_includes_meta_when_asked() {
        let mut e = env("a", "env-a");
        e.meta_probes.insert(
            "owner".to_string(),
            scout_probe::parse_meta_annotation("\"qa\""),
        );
        let response = e.resolve(true, None).await.unwrap();
        assert_eq!(
            response.meta.unwrap().get("owner"),
            Some(&MetaValue::String("qa".to_string()))
        );
    }

    #[test]
    fn response_serializes_flattened() {
        let e = env("a", "env-a");
        let response = EnvironmentResponse {
            environment: e,
            status: BTreeMap::from([("healthy".to_string(), true)]),
            status_updated_at: BTreeMap::from([("healthy".to_string(), None)]),
            meta: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["name"], "a");
        assert_eq!(json["namespace"], "env-a");
        assert_eq!(json["status"]["healthy"], true);
        assert!(json.get("meta").is_none());
        assert!(json.get("createdAt").is_some());
    }
}
