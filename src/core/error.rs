use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Config error: {0}")]
    ConfigError(#[from] toml::de::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),
    /// Tool-state initialization exited non-zero. Nothing downstream can run.
    #[error("Environment initialization failed in {} (exit code {exit_code}): {stderr}", dir.display())]
    EnvironmentInit {
        dir: PathBuf,
        exit_code: i32,
        stderr: String,
    },
    #[error("Failed to start '{program}' in {}", cwd.display())]
    Invocation {
        program: String,
        cwd: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Terraform validation failed (exit code {exit_code}): {stderr}")]
    Validation { exit_code: i32, stderr: String },
    #[error("{expectation} ({artifact}: expected `{token}`)")]
    StructuralAssertion {
        expectation: String,
        artifact: String,
        token: String,
    },
    #[error("Scan tool failure (exit code {exit_code}): {detail}")]
    ScanTool { exit_code: i32, detail: String },
    #[error("Path error: {0}")]
    PathError(String),
}

impl HarnessError {
    /// Errors that abort a check run instead of failing the check that hit them.
    ///
    /// The check runner and `main` both decide on this; everything else a
    /// check raises is recorded on that check.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarnessError::EnvironmentInit { .. } | HarnessError::ConfigError(_)
        )
    }
}
