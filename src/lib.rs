//! modgate: a validation harness for Terraform modules.
//!
//! The harness certifies that a module is structurally complete, accepted by
//! `terraform validate`, and scanned by `checkov`, without provisioning
//! anything.
//!
//! # Checks
//!
//! - `module_structure::*`: required files exist
//! - `module_outputs::*`: `outputs.tf` declares every required output
//! - `main_tf_resources::*`: `main.tf` carries the security group, IAM role,
//!   instance and their required properties
//! - `user_data_script::*`: the bootstrap script registers a docker-executor
//!   runner and updates packages
//! - `terraform_validate`: runs after a one-time `terraform init`
//! - `checkov_scan::*`: soft-fail scans with JSON reports under `scan_results/`
//!
//! Structural checks are token presence checks over raw text. Every check
//! passes or fails on its own; only a failed `terraform init` aborts a run.
//!
//! # Examples
//!
//! ```bash
//! # Everything, against the module in the current directory
//! modgate run
//!
//! # Only the main.tf checks, as JSON
//! modgate run --filter main_tf --format json
//!
//! # Scan one directory into a chosen report
//! modgate scan --target tests/unit --output scan_results/unit.json
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: process runner, bootstrapper, structural assertions, config, suite
//! - [`plugins`]: terraform and checkov integrations

mod cli;
pub mod core;
pub mod plugins;

use crate::cli::{Cli, Command, ModuleArgs, OutputFormat, RunCli, ScanCli};
use crate::core::config::{self, HarnessConfig, ScanTarget};
use crate::core::error::HarnessError;
use crate::core::output;
use crate::core::suite::{self, CheckGroup, RunContext, Selection, SuiteReport};
use clap::Parser;
use std::path::{Path, PathBuf};

/// How a completed session ended. Fatal errors are reported as `Err` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Passed,
    ChecksFailed,
}

fn resolve(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn load_module(cwd: &Path, args: &ModuleArgs) -> Result<(PathBuf, HarnessConfig), HarnessError> {
    let module_root = args
        .dir
        .as_deref()
        .map(|d| resolve(cwd, d))
        .unwrap_or_else(|| cwd.to_path_buf());
    if !module_root.is_dir() {
        return Err(HarnessError::PathError(format!(
            "module root {} is not a directory",
            module_root.display()
        )));
    }
    let explicit = args.config.as_deref().map(|c| resolve(cwd, c));
    let mut config = config::load_config(&module_root, explicit.as_deref())?;
    if let Some(profile) = &args.profile {
        config.environment.profile = profile.clone();
    }
    Ok((module_root, config))
}

fn emit(cmd: &str, args: &ModuleArgs, report: &SuiteReport) -> Result<SessionOutcome, HarnessError> {
    match args.format {
        OutputFormat::Json => {
            let envelope = output::report_envelope(cmd, report)?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        OutputFormat::Text => {
            for line in output::render_text(cmd, report, args.verbose) {
                println!("{line}");
            }
        }
    }
    Ok(if report.all_passed() {
        SessionOutcome::Passed
    } else {
        SessionOutcome::ChecksFailed
    })
}

fn run_group(
    cmd: &str,
    cwd: &Path,
    group: CheckGroup,
    run_cli: &RunCli,
) -> Result<SessionOutcome, HarnessError> {
    let (module_root, config) = load_module(cwd, &run_cli.module)?;
    let ctx = RunContext::new(&module_root, config);
    let checks = suite::plan_checks(ctx.config(), group)?;
    let selection = Selection {
        filter: run_cli.filter.clone(),
        skip: run_cli.skip.clone(),
    };
    let report = suite::run_checks(&ctx, &checks, &selection)?;
    emit(cmd, &run_cli.module, &report)
}

fn run_scan_command(cwd: &Path, scan_cli: &ScanCli) -> Result<SessionOutcome, HarnessError> {
    let (module_root, mut config) = load_module(cwd, &scan_cli.module)?;
    if let Some(target) = &scan_cli.target {
        let dir = resolve(cwd, target);
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "target".to_string());
        // An absolute report path survives the join onto `report_dir`.
        let report = scan_cli
            .output
            .as_deref()
            .map(|o| resolve(cwd, o).to_string_lossy().into_owned());
        config.scan.targets = vec![ScanTarget { name, dir, report }];
    }
    if let Some(framework) = &scan_cli.framework {
        config.scan.framework = framework.clone();
    }
    let ctx = RunContext::new(&module_root, config);
    let checks = suite::plan_checks(ctx.config(), CheckGroup::Scan)?;
    let report = suite::run_checks(&ctx, &checks, &Selection::default())?;
    emit("scan", &scan_cli.module, &report)
}

pub fn run() -> Result<SessionOutcome, HarnessError> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(SessionOutcome::Passed)
        }
        Command::Run(run_cli) => run_group("run", &cwd, CheckGroup::All, &run_cli),
        Command::Structure(run_cli) => {
            run_group("structure", &cwd, CheckGroup::Structure, &run_cli)
        }
        Command::Validate(run_cli) => run_group("validate", &cwd, CheckGroup::Validate, &run_cli),
        Command::Scan(scan_cli) => run_scan_command(&cwd, &scan_cli),
        Command::List { module } => {
            let (_, config) = load_module(&cwd, &module)?;
            for check in suite::plan_checks(&config, CheckGroup::All)? {
                println!("{}", check.name);
            }
            Ok(SessionOutcome::Passed)
        }
    }
}
