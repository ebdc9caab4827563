//! Prometheus HTTP API client.
//!
//! Speaks `/api/v1/query` and `/api/v1/status/buildinfo`. Construction
//! verifies connectivity via buildinfo so a misconfigured address fails
//! startup instead of the first probe.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::QueryError;

/// Connection settings for the Prometheus backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PromConfig {
    /// Base address of the Prometheus server.
    pub address: String,
    /// Additional headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// HTTP client options.
    #[serde(default)]
    pub client_config: ClientConfig,
}

/// HTTP client options for the Prometheus connection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default, with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// Basic-auth credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BasicAuth {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// One labeled sample from a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: HashMap<String, String>,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    /// A zero-valued sample with no labels, stamped at `at`.
    pub fn zero(at: DateTime<Utc>) -> Self {
        Self {
            labels: HashMap::new(),
            value: 0.0,
            timestamp: at,
        }
    }
}

/// The query surface queriers run against, injectable in tests.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Run an instant query, optionally limiting the result size.
    async fn query(
        &self,
        promql: &str,
        timeout: Duration,
        limit: Option<usize>,
    ) -> Result<Vec<Sample>, QueryError>;
}

/// Prometheus HTTP API client.
pub struct Client {
    http: reqwest::Client,
    base: Url,
    basic_auth: Option<BasicAuth>,
}

impl Client {
    /// Build a client and verify connectivity against buildinfo.
    pub async fn connect(cfg: &PromConfig) -> Result<Self, QueryError> {
        let client = Self::new(cfg)?;
        let info = client.buildinfo().await?;
        debug!(version = %info.version, "connected to Prometheus");
        Ok(client)
    }

    /// Build a client without the connectivity check.
    pub fn new(cfg: &PromConfig) -> Result<Self, QueryError> {
        let base = Url::parse(&cfg.address)
            .map_err(|e| QueryError::InvalidConfig(format!("invalid address: {e}")))?;

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &cfg.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| QueryError::InvalidConfig(format!("invalid header {key:?}: {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| QueryError::InvalidConfig(format!("invalid header {key:?}: {e}")))?;
            headers.insert(name, value);
        }
        if let Some(token) = &cfg.client_config.bearer_token {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| QueryError::InvalidConfig(format!("invalid bearer token: {e}")))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(cfg.client_config.insecure_skip_verify);
        if let Some(timeout) = cfg.client_config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = cfg.client_config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy) = &cfg.client_config.proxy_url {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy)
                    .map_err(|e| QueryError::InvalidConfig(format!("invalid proxy: {e}")))?,
            );
        }

        Ok(Self {
            http: builder.build()?,
            base,
            basic_auth: cfg.client_config.basic_auth.clone(),
        })
    }

    async fn buildinfo(&self) -> Result<BuildInfo, QueryError> {
        let url = self
            .base
            .join("api/v1/status/buildinfo")
            .map_err(|e| QueryError::InvalidConfig(format!("invalid address: {e}")))?;
        let response = self.request(self.http.get(url)).send().await?;
        let body: ApiResponse<BuildInfo> = response
            .json()
            .await
            .map_err(|e| QueryError::Unparseable(e.to_string()))?;
        body.data
            .ok_or_else(|| QueryError::Upstream("buildinfo returned no data".into()))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.basic_auth {
            Some(auth) => builder.basic_auth(&auth.username, Some(&auth.password)),
            None => builder,
        }
    }

    async fn run_query(
        &self,
        promql: &str,
        timeout: Duration,
        limit: Option<usize>,
    ) -> Result<Vec<Sample>, QueryError> {
        let url = self
            .base
            .join("api/v1/query")
            .map_err(|e| QueryError::InvalidConfig(format!("invalid address: {e}")))?;

        let mut form = vec![
            ("query".to_string(), promql.to_string()),
            ("timeout".to_string(), format!("{}s", timeout.as_secs_f64())),
        ];
        if let Some(limit) = limit {
            form.push(("limit".to_string(), limit.to_string()));
        }

        let response = self.request(self.http.post(url).form(&form)).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body: ApiResponse<QueryData> = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                QueryError::Unparseable(e.to_string())
            } else {
                QueryError::Upstream(format!("status {status}"))
            }
        })?;
        if body.status != "success" {
            return Err(QueryError::Upstream(
                body.error.unwrap_or_else(|| format!("status {status}")),
            ));
        }
        if !body.warnings.is_empty() {
            warn!(warnings = ?body.warnings, query = promql, "query succeeded with warnings");
        }

        let data = body
            .data
            .ok_or_else(|| QueryError::Unparseable("response has no data".into()))?;
        parse_result(data)
    }
}

#[async_trait]
impl QueryBackend for Client {
    async fn query(
        &self,
        promql: &str,
        timeout: Duration,
        limit: Option<usize>,
    ) -> Result<Vec<Sample>, QueryError> {
        match tokio::time::timeout(timeout, self.run_query(promql, timeout, limit)).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout(timeout)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BuildInfo {
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    metric: HashMap<String, String>,
    value: (f64, String),
}

fn parse_result(data: QueryData) -> Result<Vec<Sample>, QueryError> {
    match data.result_type.as_str() {
        "vector" => {
            let rows: Vec<VectorSample> = serde_json::from_value(data.result)
                .map_err(|e| QueryError::Unparseable(e.to_string()))?;
            rows.into_iter()
                .map(|row| {
                    Ok(Sample {
                        labels: row.metric,
                        value: parse_sample_value(&row.value.1)?,
                        timestamp: epoch_to_datetime(row.value.0),
                    })
                })
                .collect()
        }
        "scalar" => {
            let value: (f64, String) = serde_json::from_value(data.result)
                .map_err(|e| QueryError::Unparseable(e.to_string()))?;
            Ok(vec![Sample {
                labels: HashMap::new(),
                value: parse_sample_value(&value.1)?,
                timestamp: epoch_to_datetime(value.0),
            }])
        }
        other => Err(QueryError::Unparseable(format!(
            "unexpected result type {other:?}"
        ))),
    }
}

fn parse_sample_value(raw: &str) -> Result<f64, QueryError> {
    raw.parse::<f64>()
        .map_err(|_| QueryError::Unparseable(format!("bad sample value {raw:?}")))
}

fn epoch_to_datetime(epoch_seconds: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis((epoch_seconds * 1000.0) as i64).unwrap_or_default()
}
