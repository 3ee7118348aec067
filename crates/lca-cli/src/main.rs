//! `lca` - run LCA calculation jobs from the command line
//!
//! JSON goes to stdout, logs to stderr (`RUST_LOG`, default `info`).

mod cli;
mod commands;

use anyhow::{Context, Result};
use commands::CalculateArgs;
use lca_model::ReferenceTables;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = cli::command().get_matches();

    match matches.subcommand() {
        Some(("calculate", args)) => {
            let report = commands::calculate(CalculateArgs::from_matches(args)?).await?;
            let json = serde_json::to_string_pretty(&report).context("serializing report")?;
            println!("{json}");
            if !report.succeeded() {
                std::process::exit(1);
            }
        }
        Some(("factors", args)) => {
            let tables = ReferenceTables::shared_defaults();
            let out = commands::factors(&tables, args.get_flag("json"))?;
            println!("{}", out.trim_end());
        }
        _ => unreachable!("clap requires a subcommand"),
    }
    Ok(())
}
