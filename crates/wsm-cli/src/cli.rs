use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "wsm",
    about = "Workspace service schema migration",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Migrate a store dump to the current schema (dry run unless --commit)
    Migrate(MigrateArgs),
    /// Check a store dump against the post-migration invariants
    Verify(VerifyArgs),
    /// Print the effective migration configuration as TOML
    Config(RunArgs),
}

/// Settings shared by every command that builds a migration config.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// TOML file with migration settings
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Write the changes instead of simulating them
    #[arg(long)]
    pub commit: bool,
    /// Legacy cleanup preset: baseline (0.0.4) or full (0.0.5)
    #[arg(long)]
    pub rules: Option<String>,
    /// Report NO_WORKSPACE id fixes in the change log
    #[arg(long)]
    pub show_no_workspace_changes: bool,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// JSON dump of the store
    #[arg(long)]
    pub store: PathBuf,
    #[command(flatten)]
    pub run: RunArgs,
    #[arg(long, requires = "password")]
    pub user: Option<String>,
    #[arg(long, requires = "user")]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// JSON dump of the store
    #[arg(long)]
    pub store: PathBuf,
}
