//! # credrail-api — Axum API Services for Credrail
//!
//! The orchestration layer between the demo front-end and the external
//! credential platform. It owns wallet sessions, proof exchanges, and the
//! durable workflow records; the platform owns everything cryptographic.
//!
//! ## API Surface
//!
//! | Route                               | Module                  | Domain |
//! |-------------------------------------|-------------------------|--------|
//! | `POST /v1/sessions`                 | [`routes::sessions`]    | Session lifecycle |
//! | `GET  /v1/sessions/{id}`            | [`routes::sessions`]    | Session status |
//! | `POST /v1/sessions/{id}/connection` | [`routes::sessions`]    | Connection callback |
//! | `POST /v1/proofs/request`           | [`routes::proofs`]      | Proof request |
//! | `GET  /v1/proofs/{id}`              | [`routes::proofs`]      | Proof polling |
//! | `POST /v1/enrollment/{phase}/complete` | [`routes::enrollment`] | Phase orchestration |
//! | `GET  /v1/enrollment/records/{subject}` | [`routes::enrollment`] | Workflow records |
//! | `DELETE /v1/admin/demo-data`        | [`routes::admin`]       | Demo maintenance |
//! | `/health/*`, `/metrics`, `/openapi.json` | here / [`openapi`] | Operations |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Health probes and `/metrics` are mounted outside the auth middleware so
//! they remain accessible without credentials.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod orchestration;
pub mod routes;
pub mod state;

use std::collections::HashMap;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;

pub use error::AppError;
pub use state::AppState;

/// Check if metrics are enabled via the `CREDRAIL_METRICS_ENABLED` env var.
/// Defaults to `true` when absent or set to anything other than `"false"`.
fn metrics_enabled() -> bool {
    std::env::var("CREDRAIL_METRICS_ENABLED")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true)
}

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.auth_token.clone(),
    };
    if auth_config.token.is_none() {
        tracing::warn!("CREDRAIL_AUTH_TOKEN not set — API authentication disabled");
    }
    let metrics = ApiMetrics::new();
    let metrics_on = metrics_enabled();

    let api = Router::new()
        .merge(routes::sessions::router())
        .merge(routes::proofs::router())
        .merge(routes::enrollment::router())
        .merge(routes::admin::router())
        .merge(openapi::router());

    // Body size limit: 512 KiB. The orchestration payloads are small JSON
    // envelopes; anything larger is not a legitimate request.
    let mut api = api
        .layer(DefaultBodyLimit::max(512 * 1024))
        .layer(from_fn(auth::auth_middleware));

    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .with_state(state.clone());

    // Unauthenticated health probes and metrics scrape endpoint.
    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    if metrics_on {
        unauthenticated = unauthenticated
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// Hydrate the in-memory workflow store from the database, when configured.
pub async fn hydrate_workflows(state: &AppState) -> Result<usize, sqlx::Error> {
    let Some(pool) = &state.db_pool else {
        return Ok(0);
    };
    let records = db::workflows::load_all(pool).await?;
    let count = records.len();
    for record in records {
        state.workflows.hydrate(record);
    }
    tracing::info!(count, "hydrated workflow records from database");
    Ok(count)
}

/// GET /metrics — Prometheus metrics scrape endpoint.
///
/// Updates domain gauges from current `AppState` on each scrape (pull
/// model), then gathers and encodes all metrics.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    set_counts(metrics.sessions_total(), state.sessions.counts_by_status());
    set_counts(metrics.proofs_total(), state.proofs.counts_by_status());

    metrics
        .workflow_records_total()
        .set(state.workflows.len() as f64);

    let mut by_status: HashMap<String, usize> = HashMap::new();
    for record in state.workflows.list() {
        *by_status.entry(record.status.to_string()).or_default() += 1;
    }
    set_counts(metrics.workflows_by_status(), by_status);

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

fn set_counts(gauge: &prometheus::GaugeVec, counts: HashMap<String, usize>) {
    gauge.reset();
    for (label, count) in &counts {
        gauge.with_label_values(&[label]).set(*count as f64);
    }
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — verifies the application is ready to serve traffic.
///
/// Checks:
/// - In-memory stores are accessible.
/// - Database connection is healthy (when configured).
///
/// Returns 200 "ready" or 503 with a diagnostic message.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let _ = state.sessions.len();
    let _ = state.proofs.len();
    let _ = state.workflows.len();

    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
