//! HTTP route handlers.
//!
//! Handlers work on snapshot copies returned by the store; probe
//! resolution happens on demand per request.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info};

use scout_ignition::TriggerRequest;
use scout_store::EnvironmentResponse;

use crate::filter::parse_status_filter;
use crate::ApiState;

/// Raw query parameters, order-preserving; repeated keys are kept.
type Params = Vec<(String, String)>;

fn param_values<'a>(params: &'a Params, key: &'a str) -> impl Iterator<Item = &'a str> {
    params
        .iter()
        .filter(move |(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

// ── Health ─────────────────────────────────────────────────────

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Environments ───────────────────────────────────────────────

#[derive(serde::Serialize)]
struct NameListResponse {
    environments: Vec<String>,
}

/// GET /v1/environment
///
/// `namespace=` narrows to the environment backing that namespace;
/// `status=` filters by status checks. With both, the namespace lookup
/// runs first and the status filter applies to its single result.
pub async fn list_environments(
    State(state): State<ApiState>,
    Query(params): Query<Params>,
) -> impl IntoResponse {
    let namespace = param_values(&params, "namespace").next().unwrap_or("");
    let status_filter = parse_status_filter(param_values(&params, "status"));

    info!(
        namespace = %namespace,
        status = ?status_filter,
        "listing environments"
    );

    let environments = if !namespace.is_empty() {
        match state.store.get_by_namespace(namespace).await {
            Ok(env) => {
                if status_filter.is_empty() || env.matches_status(&status_filter).await {
                    vec![env.name]
                } else {
                    Vec::new()
                }
            }
            Err(_) => Vec::new(),
        }
    } else if !status_filter.is_empty() {
        state.store.names_matching_state(&status_filter).await
    } else {
        state.store.list_names().await
    };

    Json(NameListResponse { environments })
}

/// GET /v1/environment/{name}
///
/// Resolves every status check and every metadata probe.
pub async fn get_environment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    let env = match state.store.get(&name).await {
        Ok(env) => env,
        Err(_) => return not_found(),
    };

    match env.resolve(true, None).await {
        Ok(resolved) => Json(resolved).into_response(),
        Err(err) => {
            error!(%name, error = %err, "failed to resolve probes for environment");
            internal_error()
        }
    }
}

#[derive(serde::Serialize)]
struct AllEnvironmentsResponse {
    environments: Vec<EnvironmentResponse>,
}

/// GET /v1/environment/all
///
/// Resolves only status checks named positively in `withStatus=`;
/// metadata is omitted.
pub async fn get_all_environments(
    State(state): State<ApiState>,
    Query(params): Query<Params>,
) -> Response {
    let include_status = parse_status_filter(param_values(&params, "withStatus"));

    let envs = state.store.get_all().await;
    let mut environments = Vec::with_capacity(envs.len());
    for env in envs {
        match env.resolve(false, Some(&include_status)).await {
            Ok(resolved) => environments.push(resolved),
            Err(err) => {
                error!(name = %env.name, error = %err, "failed to resolve probes for environment");
                return internal_error();
            }
        }
    }

    Json(AllEnvironmentsResponse { environments }).into_response()
}

// ── Ignition ───────────────────────────────────────────────────

/// POST /v1/environment/{name}/ignition
pub async fn trigger_ignition(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    let env = match state.store.get(&name).await {
        Ok(env) => env,
        Err(_) => return not_found(),
    };

    info!(%name, namespace = %env.namespace, "triggering ignition for environment");
    let request = TriggerRequest {
        environment: env.name,
        namespace: env.namespace,
    };
    match state.ignition.trigger(request).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => {
            error!(%name, error = %err, "failed to trigger ignition");
            internal_error()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "environment not found").into_response()
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
}
