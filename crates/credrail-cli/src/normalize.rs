//! `normalize` — flatten a proof-detail JSON file into its attribute map.
//!
//! Debugging aid for inspecting what the attribute normalizer extracts
//! from a captured platform payload.

use std::path::PathBuf;

use clap::Args;

/// Arguments for the `normalize` subcommand.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Path to a JSON file holding a proof-detail payload (an array of
    /// credential bags, or a single bag object).
    pub file: PathBuf,
}

/// Normalize the payload and print the flat attribute map.
pub fn run(args: NormalizeArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.file)?;
    let detail: serde_json::Value = serde_json::from_str(&raw)?;
    let attributes = credrail_core::normalize(&detail);

    if attributes.is_empty() {
        println!("No attributes extracted.");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&attributes)?);
    Ok(())
}
