//! # Database Persistence Layer
//!
//! Optional Postgres persistence for Credrail-owned state via SQLx.
//!
//! ## Architecture
//!
//! When `DATABASE_URL` is set, workflow records are written through on
//! every mutation and hydrated back into the in-memory store on startup.
//! When absent, the API operates in in-memory-only mode (development and
//! demo). The in-memory store stays the source of truth for reads either
//! way, which gives read-your-writes within and across requests.
//!
//! ## What is persisted
//!
//! - Workflow records (the durable, per-subject enrollment journey)
//!
//! ## What is NOT persisted
//!
//! Sessions and proof exchanges are ephemeral and session-scoped. The
//! proof exchange lives on the credential platform; ours is only a poll
//! cursor.

pub mod workflows;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 Workflow records will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
