//! # Admin Routes
//!
//! Demo maintenance surface, distinct from any production retention path:
//! - DELETE /v1/admin/demo-data — delete every workflow record, session,
//!   and proof exchange, in memory and in the database when configured.

use axum::extract::State;
use axum::routing::delete;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db;
use crate::error::AppError;
use crate::routes::{ok, SuccessBody};
use crate::state::AppState;

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/admin/demo-data", delete(reset_demo_data))
}

/// Result of a demo-data reset.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    /// Workflow records removed from the in-memory store.
    pub workflow_records_deleted: usize,
    /// Sessions removed.
    pub sessions_deleted: usize,
    /// Proof exchanges removed.
    pub proofs_deleted: usize,
    /// Rows removed from the database, when persistence is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_rows_deleted: Option<u64>,
}

/// DELETE /v1/admin/demo-data — Reset all demo state.
#[utoipa::path(
    delete,
    path = "/v1/admin/demo-data",
    responses(
        (status = 200, description = "Demo data removed"),
        (status = 500, description = "Database reset failed"),
    ),
    tag = "admin"
)]
pub(crate) async fn reset_demo_data(
    State(state): State<AppState>,
) -> Result<Json<SuccessBody<ResetResponse>>, AppError> {
    let database_rows_deleted = match &state.db_pool {
        Some(pool) => Some(
            db::workflows::delete_all(pool)
                .await
                .map_err(|e| AppError::Internal(format!("database reset failed: {e}")))?,
        ),
        None => None,
    };

    let workflow_records_deleted = state.workflows.clear();
    let sessions_deleted = state.sessions.clear();
    let proofs_deleted = state.proofs.clear();

    tracing::warn!(
        workflow_records_deleted,
        sessions_deleted,
        proofs_deleted,
        "demo data reset"
    );

    Ok(ok(ResetResponse {
        workflow_records_deleted,
        sessions_deleted,
        proofs_deleted,
        database_rows_deleted,
    }))
}
