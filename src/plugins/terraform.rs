//! `terraform validate` against the module's validation fixture.

use crate::core::error::HarnessError;
use crate::core::process::{self, Invocation, ProcessOutcome};
use std::path::Path;
use tracing::warn;

pub const SUCCESS_PHRASE: &str = "Success! The configuration is valid.";

pub fn validate_invocation(
    program: &str,
    dir: &Path,
    envs: &[(String, String)],
) -> Invocation {
    Invocation::new(program)
        .args(["validate", "-no-color"])
        .current_dir(dir)
        .envs(envs)
}

/// Both conditions are required: exit code 0 and the success phrase on stdout.
pub fn interpret_validate(outcome: &ProcessOutcome) -> Result<(), HarnessError> {
    if outcome.exit_code == 0 && outcome.stdout.contains(SUCCESS_PHRASE) {
        return Ok(());
    }
    let stderr = if outcome.stderr.trim().is_empty() && outcome.exit_code == 0 {
        format!("success phrase missing from output: {}", outcome.stdout.trim())
    } else {
        outcome.stderr.trim().to_string()
    };
    Err(HarnessError::Validation {
        exit_code: outcome.exit_code,
        stderr,
    })
}

/// Run `terraform validate -no-color` in `dir`. The caller is responsible for
/// bootstrapping `dir` first.
pub fn validate(
    program: &str,
    dir: &Path,
    envs: &[(String, String)],
) -> Result<ProcessOutcome, HarnessError> {
    let outcome = process::run(&validate_invocation(program, dir, envs))?;
    if let Err(e) = interpret_validate(&outcome) {
        warn!(exit_code = outcome.exit_code, "terraform validate rejected the configuration");
        return Err(e);
    }
    Ok(outcome)
}
