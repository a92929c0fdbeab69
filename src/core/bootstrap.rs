//! One-time tool-state initialization.
//!
//! `terraform init` must have populated `.terraform/` in the validation
//! directory before `terraform validate` means anything. The [`Bootstrapper`]
//! runs it at most once per run context: the marker check and the init call
//! happen under one lock, and a successful init is remembered even if the tool
//! did not leave a marker behind.

use crate::core::error::HarnessError;
use crate::core::process::{self, Invocation};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Directory whose presence means the tool state is initialized.
pub const MARKER_DIR: &str = ".terraform";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    NotStarted,
    /// Marker was already on disk; nothing was run.
    AlreadyInitialized,
    /// Init ran in this context.
    Initialized,
}

impl BootstrapState {
    pub fn is_ready(self) -> bool {
        !matches!(self, BootstrapState::NotStarted)
    }
}

#[derive(Debug)]
pub struct Bootstrapper {
    program: String,
    target_dir: PathBuf,
    envs: Vec<(String, String)>,
    state: Mutex<BootstrapState>,
}

impl Bootstrapper {
    pub fn new(program: &str, target_dir: &Path, envs: Vec<(String, String)>) -> Self {
        Bootstrapper {
            program: program.to_string(),
            target_dir: target_dir.to_path_buf(),
            envs,
            state: Mutex::new(BootstrapState::NotStarted),
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn marker_path(&self) -> PathBuf {
        self.target_dir.join(MARKER_DIR)
    }

    pub fn state(&self) -> BootstrapState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// `terraform init` plus `-input=false -no-color`. Stdin is detached, so
    /// a variable prompt would otherwise fail with a confusing EOF error, and
    /// color codes would end up in the captured stderr.
    fn init_invocation(&self) -> Invocation {
        Invocation::new(&self.program)
            .args(["init", "-input=false", "-no-color"])
            .current_dir(&self.target_dir)
            .envs(&self.envs)
    }

    /// Make sure the tool state is initialized, running init if needed.
    ///
    /// A non-zero init exit is [`HarnessError::EnvironmentInit`], which callers
    /// must treat as fatal for the whole session.
    pub fn ensure(&self) -> Result<BootstrapState, HarnessError> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.is_ready() {
            return Ok(*state);
        }

        if self.marker_path().is_dir() {
            debug!(marker = %self.marker_path().display(), "tool state already initialized");
            *state = BootstrapState::AlreadyInitialized;
            return Ok(*state);
        }

        info!(dir = %self.target_dir.display(), "initializing tool state");
        let outcome = process::run(&self.init_invocation())?;
        if !outcome.success() {
            warn!(exit_code = outcome.exit_code, "tool initialization failed");
            return Err(HarnessError::EnvironmentInit {
                dir: self.target_dir.clone(),
                exit_code: outcome.exit_code,
                stderr: outcome.stderr.trim().to_string(),
            });
        }

        *state = BootstrapState::Initialized;
        Ok(*state)
    }
}
