//! CLI struct definitions for the modgate command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "modgate",
    version = env!("CARGO_PKG_VERSION"),
    about = "Validation harness for Terraform modules: required files, outputs, resources, bootstrap script directives, terraform validate and checkov scans.",
    disable_version_flag = true
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ModuleArgs {
    /// Module root (defaults to current working directory).
    #[clap(short, long)]
    pub dir: Option<PathBuf>,
    /// Config file (defaults to `<dir>/modgate.toml` when present).
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Credential profile handed to terraform and checkov.
    #[clap(long)]
    pub profile: Option<String>,
    /// Output format.
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// Show captured tool output for passing checks too.
    #[clap(long, short = 'v')]
    pub verbose: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RunCli {
    #[clap(flatten)]
    pub module: ModuleArgs,
    /// Only run checks whose name contains this substring.
    #[clap(long)]
    pub filter: Option<String>,
    /// Report checks whose name contains this substring as skipped. Repeatable.
    #[clap(long)]
    pub skip: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ScanCli {
    #[clap(flatten)]
    pub module: ModuleArgs,
    /// Scan one directory instead of the configured targets.
    #[clap(long)]
    pub target: Option<PathBuf>,
    /// Report file for `--target` (no report is written when omitted).
    #[clap(long, requires = "target")]
    pub output: Option<PathBuf>,
    /// Scanner framework (defaults to the configured one).
    #[clap(long)]
    pub framework: Option<String>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Run every check: structure, terraform validate, checkov scans
    Run(RunCli),
    /// Run the structural checks only (no external tools)
    Structure(RunCli),
    /// Initialize tool state if needed, then run terraform validate
    Validate(RunCli),
    /// Run checkov over the configured targets or one directory
    Scan(ScanCli),
    /// List check names
    List {
        #[clap(flatten)]
        module: ModuleArgs,
    },
    /// Print version
    Version,
}
