//! Ignition provider configuration.

use serde::Deserialize;

/// The configured provider variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Prometheus,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Prometheus => "prometheus",
        }
    }
}

/// Provider selection plus provider-specific settings.
///
/// Omitting the config section selects the Prometheus provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub prometheus: Option<PrometheusProviderConfig>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::Prometheus,
            prometheus: None,
        }
    }
}

/// Settings of the built-in Prometheus provider. It has none; the
/// section exists so configs can spell the provider out explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusProviderConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_explicit_prometheus() {
        let cfg: ProviderConfig = serde_yaml::from_str("type: prometheus\nprometheus: {}\n").unwrap();
        assert_eq!(cfg.provider_type, ProviderType::Prometheus);
        assert!(cfg.prometheus.is_some());
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(serde_yaml::from_str::<ProviderConfig>("type: webhook\n").is_err());
    }

    #[test]
    fn default_is_prometheus() {
        assert_eq!(
            ProviderConfig::default().provider_type,
            ProviderType::Prometheus
        );
    }
}
