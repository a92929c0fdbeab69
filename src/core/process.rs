//! Structured subprocess execution.
//!
//! Every external tool the harness drives goes through [`run`]. Commands are
//! argument lists, never shell strings. Output is fully buffered and stdin is
//! detached, so a tool that prompts gets EOF instead of the caller's terminal.
//! A non-zero exit is data for the caller to interpret, not an error.

use crate::core::error::HarnessError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// One external command to execute.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Applied to the child only. The harness process environment is never touched.
    pub envs: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn envs(mut self, envs: &[(String, String)]) -> Self {
        self.envs.extend(envs.iter().cloned());
        self
    }

    /// Human-readable command line, for diagnostics only.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `invocation` to completion and capture its streams.
///
/// Fails only when the process cannot be started (missing binary, invalid
/// working directory).
pub fn run(invocation: &Invocation) -> Result<ProcessOutcome, HarnessError> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &invocation.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &invocation.envs {
        cmd.env(k, v);
    }

    debug!(
        command = %invocation.display(),
        cwd = ?invocation.cwd,
        "spawning external command"
    );

    let output = cmd.output().map_err(|e| HarnessError::Invocation {
        program: invocation.program.clone(),
        cwd: invocation.cwd.clone().unwrap_or_else(|| PathBuf::from(".")),
        source: e,
    })?;

    let outcome = ProcessOutcome {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(
        command = %invocation.display(),
        exit_code = outcome.exit_code,
        "external command finished"
    );
    Ok(outcome)
}
