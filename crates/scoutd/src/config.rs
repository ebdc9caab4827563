//! Service configuration file.
//!
//! The file is decoded strictly: unknown keys are errors. Querier and
//! metadata names come from the map keys and must be valid label
//! values.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{bail, Context};
use regex::Regex;
use serde::Deserialize;

use scout_ignition::ProviderConfig;
use scout_probe::MetaType;
use scout_prom::{MatchOn, PromConfig, QueryConfig, QueryKind};

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[-A-Za-z0-9_]+$").expect("valid pattern"));

/// The full configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct FileConfig {
    /// Time-series backend. Without it, configured checks and
    /// metadata are ignored.
    pub prometheus: Option<PromConfig>,
    /// Dynamic status checks, applied to every environment.
    pub status_checks: BTreeMap<String, QueryConfig>,
    /// Dynamic metadata fields, applied to every environment.
    pub metadata: BTreeMap<String, MetadataConfig>,
    /// Ignition provider. Defaults to the Prometheus provider.
    pub ignition: Option<ProviderConfig>,
}

/// A metadata field: a declared result type plus a query config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MetadataConfig {
    #[serde(rename = "type")]
    pub meta_type: MetaType,
    pub kind: QueryKind,
    pub query: String,
    #[serde(default)]
    pub match_on: Option<MatchOn>,
    #[serde(default)]
    pub match_label: Option<String>,
    #[serde(default)]
    pub extract_label: Option<String>,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl MetadataConfig {
    /// The embedded query config, named after the metadata key.
    pub fn query_config(&self, name: &str) -> QueryConfig {
        QueryConfig {
            name: name.to_string(),
            kind: self.kind,
            query: self.query.clone(),
            match_on: self.match_on,
            match_label: self.match_label.clone(),
            extract_label: self.extract_label.clone(),
            interval: self.interval,
            timeout: self.timeout,
        }
    }
}

impl FileConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, check) in &self.status_checks {
            if !NAME_PATTERN.is_match(name) {
                bail!("statusChecks.{name}: key must match {}", NAME_PATTERN.as_str());
            }
            let mut check = check.clone();
            check.name = name.clone();
            check
                .validate()
                .with_context(|| format!("statusChecks.{name}"))?;
        }

        for (name, metadata) in &self.metadata {
            if !NAME_PATTERN.is_match(name) {
                bail!("metadata.{name}: key must match {}", NAME_PATTERN.as_str());
            }
            metadata
                .query_config(name)
                .validate()
                .with_context(|| format!("metadata.{name}"))?;
        }

        Ok(())
    }
}

/// Read and validate a configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to open config file {}", path.display()))?;
    let cfg: FileConfig =
        serde_yaml::from_str(&contents).context("failed to parse config file")?;
    cfg.validate().context("invalid config file")?;
    Ok(cfg)
}
