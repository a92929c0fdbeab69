//! The named checks and the session that runs them.
//!
//! A session owns a [`RunContext`]: the module root, the loaded config, and
//! the bootstrapper for the validation directory. Checks run sequentially and
//! independently. A failing check never stops the next one. A non-zero init
//! exit aborts the session before any check runs; an init that cannot even be
//! started only fails the validation check.

use crate::core::bootstrap::{BootstrapState, Bootstrapper};
use crate::core::config::{HarnessConfig, ScanTarget};
use crate::core::error::HarnessError;
use crate::core::structure::{self, ArtifactKind, Requirement};
use crate::plugins::{scan, terraform};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skip,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    /// Captured tool output, when there is any worth showing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.to_string(),
            status: CheckStatus::Pass,
            message: message.into(),
            diagnostic: None,
        }
    }

    fn fail(name: &str, err: &HarnessError) -> Self {
        let message = match err {
            HarnessError::Invocation { source, .. } => format!("{err}: {source}"),
            _ => err.to_string(),
        };
        CheckResult {
            name: name.to_string(),
            status: CheckStatus::Fail,
            message,
            diagnostic: None,
        }
    }

    fn skip(name: &str) -> Self {
        CheckResult {
            name: name.to_string(),
            status: CheckStatus::Skip,
            message: "skipped".to_string(),
            diagnostic: None,
        }
    }

    fn with_diagnostic(mut self, text: &str) -> Self {
        if !text.trim().is_empty() {
            self.diagnostic = Some(text.trim_end().to_string());
        }
        self
    }
}

#[derive(Debug, Clone)]
pub enum CheckKind {
    RequiredFile(String),
    Output(Requirement),
    Resource(Requirement),
    ScriptDirective(Requirement),
    TerraformValidate,
    Scan(ScanTarget),
}

#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub kind: CheckKind,
}

impl Check {
    /// Only the validation path depends on initialized tool state.
    pub fn needs_bootstrap(&self) -> bool {
        matches!(self.kind, CheckKind::TerraformValidate)
    }
}

/// Which group of checks a command plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckGroup {
    All,
    Structure,
    Validate,
    Scan,
}

impl CheckGroup {
    fn includes_structure(self) -> bool {
        matches!(self, CheckGroup::All | CheckGroup::Structure)
    }

    fn includes_validate(self) -> bool {
        matches!(self, CheckGroup::All | CheckGroup::Validate)
    }

    fn includes_scan(self) -> bool {
        matches!(self, CheckGroup::All | CheckGroup::Scan)
    }
}

pub fn plan_checks(config: &HarnessConfig, group: CheckGroup) -> Result<Vec<Check>, HarnessError> {
    let mut checks = Vec::new();

    if group.includes_structure() {
        for file in &config.module.required_files {
            checks.push(Check {
                name: format!("module_structure::{file}"),
                kind: CheckKind::RequiredFile(file.clone()),
            });
        }
        for req in structure::output_requirements(structure::REQUIRED_OUTPUTS)? {
            checks.push(Check {
                name: format!("module_outputs::{}", req.id),
                kind: CheckKind::Output(req),
            });
        }
        for req in structure::module_resource_requirements() {
            checks.push(Check {
                name: format!("main_tf_resources::{}", req.id),
                kind: CheckKind::Resource(req),
            });
        }
        for req in structure::bootstrap_script_requirements() {
            checks.push(Check {
                name: format!("user_data_script::{}", req.id),
                kind: CheckKind::ScriptDirective(req),
            });
        }
    }

    if group.includes_validate() {
        checks.push(Check {
            name: "terraform_validate".to_string(),
            kind: CheckKind::TerraformValidate,
        });
    }

    if group.includes_scan() {
        for target in &config.scan.targets {
            checks.push(Check {
                name: format!("checkov_scan::{}", target.name),
                kind: CheckKind::Scan(target.clone()),
            });
        }
    }

    Ok(checks)
}

/// Test selection: substring filter plus explicit skips.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub filter: Option<String>,
    pub skip: Vec<String>,
}

impl Selection {
    /// Checks not matching `filter` are dropped from the run entirely.
    pub fn keeps(&self, name: &str) -> bool {
        self.filter.as_deref().is_none_or(|f| name.contains(f))
    }

    /// Checks matching a skip pattern are reported as skipped.
    pub fn skips(&self, name: &str) -> bool {
        self.skip.iter().any(|s| name.contains(s.as_str()))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Summary {
    pub pass: u32,
    pub fail: u32,
    pub skip: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub module_root: PathBuf,
    /// `None` when no selected check needed initialized tool state.
    pub bootstrap: Option<String>,
    pub results: Vec<CheckResult>,
    pub summary: Summary,
}

impl SuiteReport {
    pub fn all_passed(&self) -> bool {
        self.summary.fail == 0
    }

    pub fn failures(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.status == CheckStatus::Fail)
            .map(|r| format!("{}: {}", r.name, r.message))
            .collect()
    }
}

/// Explicit per-run state. Nothing here touches the process environment.
#[derive(Debug)]
pub struct RunContext {
    module_root: PathBuf,
    config: HarnessConfig,
    bootstrapper: Bootstrapper,
}

impl RunContext {
    pub fn new(module_root: &Path, config: HarnessConfig) -> Self {
        let validation_dir = module_root.join(&config.module.validation_dir);
        let bootstrapper =
            Bootstrapper::new(&config.tools.terraform, &validation_dir, config.tool_env());
        RunContext {
            module_root: module_root.to_path_buf(),
            config,
            bootstrapper,
        }
    }

    pub fn module_root(&self) -> &Path {
        &self.module_root
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn validation_dir(&self) -> &Path {
        self.bootstrapper.target_dir()
    }

    pub fn ensure_bootstrapped(&self) -> Result<BootstrapState, HarnessError> {
        self.bootstrapper.ensure()
    }

    pub fn report_path(&self, target: &ScanTarget) -> Option<PathBuf> {
        target.report.as_ref().map(|report| {
            self.module_root
                .join(&self.config.scan.report_dir)
                .join(report)
        })
    }
}

/// Artifact text, read lazily and at most once per session.
struct Artifacts<'a> {
    root: &'a Path,
    cache: HashMap<&'static str, Result<String, String>>,
}

impl<'a> Artifacts<'a> {
    fn new(root: &'a Path) -> Self {
        Artifacts {
            root,
            cache: HashMap::new(),
        }
    }

    fn get(&mut self, kind: ArtifactKind) -> Result<&str, HarnessError> {
        let root = self.root;
        let entry = self
            .cache
            .entry(kind.relative_path())
            .or_insert_with(|| kind.read(root).map_err(|e| e.to_string()));
        match entry {
            Ok(text) => Ok(text.as_str()),
            Err(msg) => Err(HarnessError::PathError(msg.clone())),
        }
    }
}

fn assert_in(
    artifacts: &mut Artifacts<'_>,
    kind: ArtifactKind,
    req: &Requirement,
) -> Result<(), HarnessError> {
    let content = artifacts.get(kind)?;
    structure::assert_requirement(kind.relative_path(), content, req)
}

fn execute(ctx: &RunContext, check: &Check, artifacts: &mut Artifacts<'_>) -> CheckResult {
    let name = check.name.as_str();
    match &check.kind {
        CheckKind::RequiredFile(file) => {
            match structure::assert_file_exists(ctx.module_root(), file) {
                Ok(()) => CheckResult::pass(name, format!("{file} present")),
                Err(e) => CheckResult::fail(name, &e),
            }
        }
        CheckKind::Output(req) => match assert_in(artifacts, ArtifactKind::Outputs, req) {
            Ok(()) => CheckResult::pass(name, format!("output \"{}\" declared", req.id)),
            Err(e) => CheckResult::fail(name, &e),
        },
        CheckKind::Resource(req) => {
            match assert_in(artifacts, ArtifactKind::ModuleDefinition, req) {
                Ok(()) => CheckResult::pass(name, format!("found `{}`", req.rule.describe())),
                Err(e) => CheckResult::fail(name, &e),
            }
        }
        CheckKind::ScriptDirective(req) => {
            match assert_in(artifacts, ArtifactKind::BootstrapScript, req) {
                Ok(()) => CheckResult::pass(name, format!("found `{}`", req.rule.describe())),
                Err(e) => CheckResult::fail(name, &e),
            }
        }
        CheckKind::TerraformValidate => {
            let config = ctx.config();
            match terraform::validate(
                &config.tools.terraform,
                ctx.validation_dir(),
                &config.tool_env(),
            ) {
                Ok(outcome) => CheckResult::pass(name, terraform::SUCCESS_PHRASE)
                    .with_diagnostic(&outcome.stdout),
                Err(e) => CheckResult::fail(name, &e),
            }
        }
        CheckKind::Scan(target) => {
            let config = ctx.config();
            let mut request = scan::ScanRequest::new(&ctx.module_root().join(&target.dir))
                .with_framework(&config.scan.framework);
            if let Some(report) = ctx.report_path(target) {
                request = request.with_report(&report);
            }
            match scan::run_scan(
                &config.tools.scanner,
                ctx.module_root(),
                &request,
                &config.tool_env(),
            ) {
                Ok(scanned) => {
                    let message = match &scanned.report_path {
                        Some(p) => format!(
                            "scanner exit code {}; report saved to {}",
                            scanned.exit_code,
                            p.display()
                        ),
                        None => format!("scanner exit code {}", scanned.exit_code),
                    };
                    CheckResult::pass(name, message).with_diagnostic(&scanned.summary)
                }
                Err(e) => CheckResult::fail(name, &e),
            }
        }
    }
}

/// Run `checks` under `selection`.
///
/// Returns `Err` only for session-fatal errors (see [`HarnessError::is_fatal`]);
/// every other failure is recorded on its own check. A bootstrap that cannot
/// start fails the checks that need it and nothing else.
pub fn run_checks(
    ctx: &RunContext,
    checks: &[Check],
    selection: &Selection,
) -> Result<SuiteReport, HarnessError> {
    let selected: Vec<&Check> = checks.iter().filter(|c| selection.keeps(&c.name)).collect();

    let mut bootstrap_failure = None;
    let bootstrap = if selected
        .iter()
        .any(|c| c.needs_bootstrap() && !selection.skips(&c.name))
    {
        let label = match ctx.ensure_bootstrapped() {
            Ok(BootstrapState::AlreadyInitialized) => "already-initialized",
            Ok(BootstrapState::Initialized) => "initialized",
            Ok(BootstrapState::NotStarted) => "not-started",
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "tool state unavailable");
                bootstrap_failure = Some(e);
                "failed"
            }
        };
        info!(state = label, "bootstrap finished");
        Some(label.to_string())
    } else {
        None
    };

    let mut artifacts = Artifacts::new(ctx.module_root());
    let mut summary = Summary::default();
    let mut results = Vec::with_capacity(selected.len());
    for check in selected {
        let result = if selection.skips(&check.name) {
            CheckResult::skip(&check.name)
        } else if check.needs_bootstrap()
            && let Some(err) = &bootstrap_failure
        {
            CheckResult::fail(&check.name, err)
        } else {
            debug!(check = %check.name, "running check");
            execute(ctx, check, &mut artifacts)
        };
        match result.status {
            CheckStatus::Pass => summary.pass += 1,
            CheckStatus::Fail => summary.fail += 1,
            CheckStatus::Skip => summary.skip += 1,
        }
        results.push(result);
    }

    Ok(SuiteReport {
        module_root: ctx.module_root().to_path_buf(),
        bootstrap,
        results,
        summary,
    })
}
