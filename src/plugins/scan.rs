//! Static security scan via `checkov`.
//!
//! The scanner always runs in soft-fail mode: findings never change its exit
//! code, so the harness only fails on tool-level errors. Findings land in a
//! JSON report for humans and CI; the harness does not read it back.

use crate::core::error::HarnessError;
use crate::core::process::{self, Invocation, ProcessOutcome};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_FRAMEWORK: &str = "terraform";

/// Exit codes that mean the scanner ran. Anything else is a tool failure.
pub const ACCEPTED_EXIT_CODES: &[i32] = &[0, 1];

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub target_dir: PathBuf,
    pub report_path: Option<PathBuf>,
    pub framework: String,
}

impl ScanRequest {
    pub fn new(target_dir: &Path) -> Self {
        ScanRequest {
            target_dir: target_dir.to_path_buf(),
            report_path: None,
            framework: DEFAULT_FRAMEWORK.to_string(),
        }
    }

    pub fn with_report(mut self, report_path: &Path) -> Self {
        self.report_path = Some(report_path.to_path_buf());
        self
    }

    pub fn with_framework(mut self, framework: &str) -> Self {
        self.framework = framework.to_string();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub exit_code: i32,
    /// Scanner stdout; the human-readable findings summary.
    pub summary: String,
    pub report_path: Option<PathBuf>,
}

pub fn scan_args(request: &ScanRequest) -> Vec<String> {
    let mut args = vec![
        "-d".to_string(),
        request.target_dir.to_string_lossy().into_owned(),
        "--framework".to_string(),
        request.framework.clone(),
    ];
    if let Some(report) = &request.report_path {
        args.extend([
            "--output".to_string(),
            "json".to_string(),
            "--output-file".to_string(),
            report.to_string_lossy().into_owned(),
        ]);
    }
    args.push("--soft-fail".to_string());
    args
}

/// Accept the scanner's exit code and check the report postcondition.
pub fn interpret_scan(
    request: &ScanRequest,
    outcome: ProcessOutcome,
) -> Result<ScanOutcome, HarnessError> {
    if !ACCEPTED_EXIT_CODES.contains(&outcome.exit_code) {
        return Err(HarnessError::ScanTool {
            exit_code: outcome.exit_code,
            detail: outcome.stderr.trim().to_string(),
        });
    }
    if let Some(report) = &request.report_path
        && !report.exists()
    {
        return Err(HarnessError::ScanTool {
            exit_code: outcome.exit_code,
            detail: format!("report was not created at {}", report.display()),
        });
    }
    Ok(ScanOutcome {
        exit_code: outcome.exit_code,
        summary: outcome.stdout,
        report_path: request.report_path.clone(),
    })
}

/// Run the scanner from `cwd` over `request.target_dir`.
///
/// The report's parent directory is created if needed. Concurrent scans that
/// share a report path overwrite each other.
pub fn run_scan(
    scanner: &str,
    cwd: &Path,
    request: &ScanRequest,
    envs: &[(String, String)],
) -> Result<ScanOutcome, HarnessError> {
    if let Some(parent) = request.report_path.as_deref().and_then(Path::parent)
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let invocation = Invocation::new(scanner)
        .args(scan_args(request))
        .current_dir(cwd)
        .envs(envs);
    let outcome = process::run(&invocation)?;
    debug!(
        target_dir = %request.target_dir.display(),
        exit_code = outcome.exit_code,
        "scan finished"
    );

    interpret_scan(request, outcome).inspect_err(|e| {
        warn!(error = %e, "scan tool failure");
    })
}
