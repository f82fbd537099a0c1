//! `serve` — run the orchestration API service.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Args;

use credrail_api::{app, hydrate_workflows, AppState};
use credrail_client::PlatformClient;
use credrail_core::PlatformConfig;

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the API service on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Interval in seconds between expired-session sweeps.
    #[arg(long, default_value_t = 60)]
    pub purge_interval_secs: u64,
}

/// Run the API service until interrupted.
pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let config = PlatformConfig::from_env()?;
    let platform = PlatformClient::new(config.clone())?;
    let db_pool = credrail_api::db::init_pool().await?;
    let auth_token = std::env::var("CREDRAIL_AUTH_TOKEN").ok();

    let state = AppState::new(config, platform, db_pool, auth_token);
    let hydrated = hydrate_workflows(&state).await?;
    if hydrated > 0 {
        tracing::info!(hydrated, "workflow records restored from database");
    }

    // Background sweep dropping expired sessions.
    let sweeper = state.sessions.clone();
    let interval = Duration::from_secs(args.purge_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let purged = sweeper.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "expired sessions dropped");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    tracing::info!(listen = %args.listen, "credrail API listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
