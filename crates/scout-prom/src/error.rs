//! Error types for Prometheus querying.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by queriers and probes.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("result not found")]
    ResultNotFound,

    #[error("too many results: got {0}, expected 1")]
    TooManyResults(usize),

    #[error("result not parseable: {0}")]
    Unparseable(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("prometheus request failed: {0}")]
    Upstream(String),

    #[error("probe destroyed")]
    Destroyed,

    #[error("invalid query config: {0}")]
    InvalidConfig(String),

    #[error("invalid query template: {0}")]
    Template(#[from] TemplateError),
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        QueryError::Upstream(err.to_string())
    }
}

/// Errors produced while parsing a query template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown variable {{{{{0}}}}}, expected name or namespace")]
    UnknownVariable(String),

    #[error("unclosed variable at byte {0}")]
    Unclosed(usize),
}
