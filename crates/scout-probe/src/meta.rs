//! Dynamically-typed metadata values.
//!
//! Metadata probes surface one of four value shapes to API clients.
//! Annotation-sourced metadata is parsed as JSON where possible and
//! falls back to the literal string otherwise.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::probe::{Probe, StaticProbe};
use crate::ProbeError;

/// A metadata value as exposed on the detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Number(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Number(value)
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::String(value)
    }
}

impl From<DateTime<Utc>> for MetaValue {
    fn from(value: DateTime<Utc>) -> Self {
        MetaValue::Timestamp(value)
    }
}

/// The declared result type of a configured metadata query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaType {
    String,
    Bool,
    Number,
    Timestamp,
}

/// Adapts a typed probe into a metadata probe.
pub(crate) struct MetaProbe<T> {
    inner: Arc<dyn Probe<T>>,
}

impl<T> MetaProbe<T> {
    pub(crate) fn wrap(inner: Arc<dyn Probe<T>>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl<T> Probe<MetaValue> for MetaProbe<T>
where
    T: Send + Sync + 'static,
    MetaValue: From<T>,
{
    async fn value(&self) -> Result<MetaValue, ProbeError> {
        Ok(self.inner.value().await?.into())
    }

    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.inner.last_update()
    }

    async fn destroy(&self) {
        self.inner.destroy().await;
    }
}

/// Parse a metadata annotation into a static probe.
///
/// JSON booleans, numbers, and strings become their typed value;
/// anything else (objects, arrays, invalid JSON) is kept as the
/// literal annotation string.
pub fn parse_meta_annotation(raw: &str) -> Arc<dyn Probe<MetaValue>> {
    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Bool(b)) => MetaValue::Bool(b),
        Ok(serde_json::Value::Number(n)) => match n.as_f64() {
            Some(f) => MetaValue::Number(f),
            None => MetaValue::String(raw.to_string()),
        },
        Ok(serde_json::Value::String(s)) => MetaValue::String(s),
        Ok(other) => {
            debug!(value = raw, kind = ?other, "metadata annotation JSON type is unsupported, keeping literal");
            MetaValue::String(raw.to_string())
        }
        Err(_) => MetaValue::String(raw.to_string()),
    };
    Arc::new(StaticProbe::new(value))
}
