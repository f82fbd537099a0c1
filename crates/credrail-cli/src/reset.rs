//! `reset-demo` — delete all demo workflow records.

use clap::Args;

/// Arguments for the `reset-demo` subcommand.
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Confirm the deletion. Without this flag nothing is removed.
    #[arg(long)]
    pub yes: bool,
}

/// Delete every workflow record from the configured database.
pub async fn run(args: ResetArgs) -> anyhow::Result<()> {
    if !args.yes {
        anyhow::bail!("refusing to delete demo data without --yes");
    }

    let Some(pool) = credrail_api::db::init_pool().await? else {
        println!("DATABASE_URL not set — no persisted records to delete.");
        return Ok(());
    };

    let deleted = credrail_api::db::workflows::delete_all(&pool).await?;
    println!("Deleted {deleted} workflow record(s).");
    Ok(())
}
