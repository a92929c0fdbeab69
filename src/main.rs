use anyhow::Context;
use modgate::SessionOutcome;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// `MODGATE_TRACE=1` turns on debug events for the harness itself.
const TRACE_ENV: &str = "MODGATE_TRACE";

fn init_tracing() {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if std::env::var(TRACE_ENV).ok().as_deref() == Some("1")
        && let Ok(directive) = "modgate=debug".parse()
    {
        filter = filter.add_directive(directive);
    }
    // Logs go to stderr; stdout carries the check report.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    match modgate::run().context("modgate session aborted") {
        Ok(SessionOutcome::Passed) => ExitCode::SUCCESS,
        Ok(SessionOutcome::ChecksFailed) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
