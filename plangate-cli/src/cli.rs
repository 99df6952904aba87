//! CLI argument definitions using clap.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "plangate")]
#[command(version)]
#[command(about = "Evaluate subscription entitlements, upgrades and quotas", long_about = None)]
pub struct Cli {
    /// Plan catalog TOML file (default: the builtin catalog)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Evaluate at this RFC 3339 instant instead of the current time
    #[arg(long, global = true)]
    pub now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the plans in the catalog
    Plans,

    /// Print the state of a new account starting its trial
    Trial,

    /// Evaluate a stored subscription state
    Evaluate(StateArgs),

    /// Apply a payment the operator has verified and print the upgraded state
    Upgrade(UpgradeArgs),

    /// Check a quota or feature gate
    Check(CheckArgs),

    /// Count one created record and print the updated state
    Record(RecordArgs),
}

#[derive(Args, Debug)]
pub struct StateArgs {
    /// Subscription state JSON file
    #[arg(short, long)]
    pub state: PathBuf,
}

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    #[command(flatten)]
    pub state: StateArgs,

    /// Plan the payment was for
    #[arg(short, long)]
    pub plan: String,

    /// Account that paid
    #[arg(short, long)]
    pub account: String,

    /// Payment gateway reference, taken as already verified by the operator
    #[arg(long)]
    pub payment_ref: String,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct GateTarget {
    /// Resource type to check the quota of (e.g. invoice)
    #[arg(short, long)]
    pub resource: Option<String>,

    /// Feature to check (e.g. team_management)
    #[arg(short, long)]
    pub feature: Option<String>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub state: StateArgs,

    #[command(flatten)]
    pub target: GateTarget,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    #[command(flatten)]
    pub state: StateArgs,

    /// Resource type of the created record
    #[arg(short, long)]
    pub resource: String,
}
