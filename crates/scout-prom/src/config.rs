//! Querier configuration and validation.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::QueryError;
use crate::template::QueryTemplate;

/// Which querier shape a config describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Single,
    Bulk,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Single => f.write_str("single"),
            QueryKind::Bulk => f.write_str("bulk"),
        }
    }
}

/// Which environment attribute a bulk query result row is matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOn {
    Name,
    Namespace,
}

/// Configuration of one querier.
///
/// `name` is filled in from the config map key, not the YAML body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryConfig {
    #[serde(skip)]
    pub name: String,
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

impl QueryConfig {
    /// Validate the config, including kind-specific template rules.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.name.is_empty() {
            return Err(QueryError::InvalidConfig("name must be set".into()));
        }
        if self.query.is_empty() {
            return Err(QueryError::InvalidConfig("query must be set".into()));
        }
        if self.interval.is_zero() {
            return Err(QueryError::InvalidConfig(
                "interval must be greater than 0".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(QueryError::InvalidConfig(
                "timeout must be greater than 0".into(),
            ));
        }
        if self.timeout >= self.interval {
            return Err(QueryError::InvalidConfig(
                "timeout must be less than interval".into(),
            ));
        }

        let template = QueryTemplate::parse(&self.query)?;
        match self.kind {
            QueryKind::Single => {}
            QueryKind::Bulk => {
                if template.has_variables() {
                    return Err(QueryError::InvalidConfig(
                        "bulk queries must not use template variables".into(),
                    ));
                }
                if self.match_on.is_none() {
                    return Err(QueryError::InvalidConfig(
                        "matchOn must be set for bulk queries".into(),
                    ));
                }
                if self.match_label.as_deref().unwrap_or("").is_empty() {
                    return Err(QueryError::InvalidConfig(
                        "matchLabel must be set for bulk queries".into(),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(kind: QueryKind) -> QueryConfig {
        QueryConfig {
            name: "healthy".to_string(),
            kind,
            query: "vector(1)".to_string(),
            match_on: None,
            match_label: None,
            extract_label: None,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn valid_single() {
        let mut cfg = base(QueryKind::Single);
        cfg.query = r#"sum(up{namespace="{{namespace}}"})"#.to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn valid_bulk() {
        let mut cfg = base(QueryKind::Bulk);
        cfg.query = "sum(up) by (namespace)".to_string();
        cfg.match_on = Some(MatchOn::Namespace);
        cfg.match_label = Some("namespace".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_name_rejected() {
        let mut cfg = base(QueryKind::Single);
        cfg.name = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_query_rejected() {
        let mut cfg = base(QueryKind::Single);
        cfg.query = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let mut cfg = base(QueryKind::Single);
        cfg.interval = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn timeout_gte_interval_rejected() {
        let mut cfg = base(QueryKind::Single);
        cfg.timeout = cfg.interval;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn single_unknown_template_variable_rejected() {
        let mut cfg = base(QueryKind::Single);
        cfg.query = r#"sum(up{x="{{unknown}}"})"#.to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bulk_with_variables_rejected() {
        let mut cfg = base(QueryKind::Bulk);
        cfg.query = r#"up{env="{{name}}"}"#.to_string();
        cfg.match_on = Some(MatchOn::Name);
        cfg.match_label = Some("env".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bulk_missing_match_label_rejected() {
        let mut cfg = base(QueryKind::Bulk);
        cfg.match_on = Some(MatchOn::Namespace);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bulk_missing_match_on_rejected() {
        let mut cfg = base(QueryKind::Bulk);
        cfg.match_label = Some("namespace".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_decodes_from_yaml_keys() {
        let yaml = r#"
kind: single
query: vector(1)
interval: 30s
timeout: 2s
"#;
        let cfg: QueryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.kind, QueryKind::Single);
        assert_eq!(cfg.interval, Duration::from_secs(30));
        assert_eq!(cfg.timeout, Duration::from_secs(2));
    }
}
