//! plangate CLI - inspect subscription entitlements from the command line.
//!
//! Usage:
//!   plangate plans --config plans.toml
//!   plangate trial > state.json
//!   plangate evaluate --state state.json --now 2025-05-01T00:00:00Z
//!   plangate check --state state.json --resource invoice
//!   plangate upgrade --state state.json --plan monthly --account acct-1 --payment-ref pay_1
//!
//! Results are printed to stdout as JSON. Logs go to stderr.

mod cli;
mod commands;
mod observability;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::Context;
use observability::{LogFormat, init_observability};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_observability(LogFormat::from_env());

    let ctx = Context::load(cli.config.as_deref(), cli.now)?;
    let output = match &cli.command {
        Commands::Plans => commands::plans(&ctx)?,
        Commands::Trial => commands::trial(&ctx)?,
        Commands::Evaluate(args) => {
            commands::evaluate_state(&ctx, &commands::read_state(&ctx, &args.state)?)?
        }
        Commands::Upgrade(args) => {
            commands::upgrade(&ctx, &commands::read_state(&ctx, &args.state.state)?, args)?
        }
        Commands::Check(args) => {
            commands::check_gate(&ctx, &commands::read_state(&ctx, &args.state.state)?, args)?
        }
        Commands::Record(args) => {
            commands::record(commands::read_state(&ctx, &args.state.state)?, args)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
