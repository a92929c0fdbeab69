#![cfg(unix)]

use modgate::core::bootstrap::{BootstrapState, MARKER_DIR};
use modgate::core::config::HarnessConfig;
use modgate::core::error::HarnessError;
use modgate::core::suite::{
    self, CheckGroup, CheckStatus, RunContext, Selection, SuiteReport,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

const MAIN_TF: &str = r#"resource "aws_security_group" "runner" {
  name   = "${var.instance_name}-sg"
  vpc_id = var.vpc_id

  egress {
    from_port   = 0
    to_port     = 0
    protocol    = "-1"
    cidr_blocks = ["0.0.0.0/0"]
  }
}

resource "aws_iam_role" "runner" {
  name = "${var.instance_name}-role"
  assume_role_policy = jsonencode({
    Version = "2012-10-17"
    Statement = [{
      Action    = "sts:AssumeRole"
      Effect    = "Allow"
      Principal = { Service = "ec2.amazonaws.com" }
    }]
  })
}

resource "aws_iam_instance_profile" "runner" {
  role = aws_iam_role.runner.name
}

resource "aws_instance" "runner" {
  ami                    = var.ami_id
  subnet_id              = var.subnet_id
  vpc_security_group_ids = [aws_security_group.runner.id]
  iam_instance_profile   = aws_iam_instance_profile.runner.name
  user_data              = templatefile("${path.module}/templates/user_data.sh", {})
}
"#;

const OUTPUTS_TF: &str = r#"output "instance_id" {
  value = aws_instance.runner.id
}

output "security_group_id" {
  value = aws_security_group.runner.id
}

output "instance_private_ip" {
  value = aws_instance.runner.private_ip
}

output "instance_public_ip" {
  value = aws_instance.runner.public_ip
}
"#;

const USER_DATA: &str = r#"#!/bin/bash
set -euo pipefail
apt-get update -y
apt-get install -y docker.io
systemctl enable --now docker
gitlab-runner register \
  --non-interactive \
  --url "${gitlab_url}" \
  --executor "docker" \
  --docker-image "alpine:latest"
"#;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, content).expect("write file");
}

fn write_tool(path: &Path, body: &str) -> PathBuf {
    write(path, &format!("#!/bin/sh\n{body}\n"));
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod tool");
    path.to_path_buf()
}

/// A complete module plus stub `terraform` and `checkov` binaries.
struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    tools: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path().join("module");
        let tools = tmp.path().join("tools");
        write(&root.join("main.tf"), MAIN_TF);
        write(&root.join("outputs.tf"), OUTPUTS_TF);
        write(
            &root.join("versions.tf"),
            "terraform {\n  required_version = \">= 1.3\"\n}\n",
        );
        write(&root.join("templates/user_data.sh"), USER_DATA);
        write(&root.join("tests/unit/main.tf"), "module \"runner\" {\n  source = \"../..\"\n}\n");
        let fixture = Fixture {
            _tmp: tmp,
            root,
            tools,
        };
        fixture.terraform(
            r#"echo "$@" >> "$(dirname "$0")/terraform.calls"
case "$1" in
  init) mkdir -p .terraform ;;
  validate) echo "Success! The configuration is valid." ;;
esac"#,
        );
        fixture.checkov(
            r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--output-file" ]; then out="$2"; fi
  shift
done
if [ -n "$out" ]; then echo '{"results": {"failed_checks": []}}' > "$out"; fi
echo "Passed checks: 12, Failed checks: 2"
exit 1"#,
        );
        fixture
    }

    fn terraform(&self, body: &str) {
        write_tool(&self.tools.join("terraform"), body);
    }

    fn checkov(&self, body: &str) {
        write_tool(&self.tools.join("checkov"), body);
    }

    fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.tools.terraform = self.tools.join("terraform").to_string_lossy().into_owned();
        config.tools.scanner = self.tools.join("checkov").to_string_lossy().into_owned();
        config
    }

    fn context(&self) -> RunContext {
        RunContext::new(&self.root, self.config())
    }

    fn terraform_calls(&self) -> Vec<String> {
        fs::read_to_string(self.tools.join("terraform.calls"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn run_all(ctx: &RunContext) -> Result<SuiteReport, HarnessError> {
    let checks = suite::plan_checks(ctx.config(), CheckGroup::All).expect("plan");
    suite::run_checks(ctx, &checks, &Selection::default())
}

fn status_of(report: &SuiteReport, name: &str) -> CheckStatus {
    report
        .results
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("check {name} missing from report"))
        .status
}

#[test]
fn complete_module_passes_every_check() {
    let fx = Fixture::new();
    let report = run_all(&fx.context()).expect("session");
    assert!(report.all_passed(), "failures: {:?}", report.failures());
    assert_eq!(report.summary.pass, 24);
    assert_eq!(report.bootstrap.as_deref(), Some("initialized"));
    assert!(fx.root.join("tests/unit").join(MARKER_DIR).is_dir());
    assert!(
        fx.root
            .join("scan_results/checkov_scan_results.json")
            .is_file()
    );
    assert!(
        fx.root
            .join("scan_results/checkov_test_scan_results.json")
            .is_file()
    );
}

#[test]
fn bootstrap_runs_init_once_per_context() {
    let fx = Fixture::new();
    let ctx = fx.context();
    run_all(&ctx).expect("first session");
    run_all(&ctx).expect("second session");
    assert_eq!(ctx.ensure_bootstrapped().expect("ensure"), BootstrapState::Initialized);

    let inits = fx
        .terraform_calls()
        .iter()
        .filter(|c| c.starts_with("init"))
        .count();
    assert_eq!(inits, 1);

    // A fresh context sees the marker and skips init entirely.
    let report = run_all(&fx.context()).expect("third session");
    assert_eq!(report.bootstrap.as_deref(), Some("already-initialized"));
    let inits = fx
        .terraform_calls()
        .iter()
        .filter(|c| c.starts_with("init"))
        .count();
    assert_eq!(inits, 1);
}

#[test]
fn missing_iam_role_fails_only_that_resource_check() {
    let fx = Fixture::new();
    write(
        &fx.root.join("main.tf"),
        &MAIN_TF.replace("resource \"aws_iam_role\"", "resource \"aws_iam_user\""),
    );
    let report = run_all(&fx.context()).expect("session");

    let resources: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.name.starts_with("main_tf_resources::"))
        .collect();
    assert_eq!(resources.len(), 9);
    let failed: Vec<_> = resources
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "main_tf_resources::iam_role");
    assert!(failed[0].message.contains("IAM role resource not defined"));
    assert_eq!(report.summary.fail, 1);
    assert_eq!(status_of(&report, "terraform_validate"), CheckStatus::Pass);
}

#[test]
fn failed_bootstrap_aborts_before_any_check() {
    let fx = Fixture::new();
    fx.terraform("echo 'Error: Failed to query available provider packages' >&2\nexit 1");
    let err = run_all(&fx.context()).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, HarnessError::EnvironmentInit { exit_code: 1, .. }));
    assert!(err.to_string().contains("Failed to query available provider packages"));
    assert!(!fx.root.join("scan_results").exists());
}

#[test]
fn unstartable_terraform_fails_only_validation() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.tools.terraform = fx.tools.join("no-such-terraform").to_string_lossy().into_owned();
    let report = run_all(&RunContext::new(&fx.root, config)).expect("session");

    assert_eq!(report.bootstrap.as_deref(), Some("failed"));
    let validate = report
        .results
        .iter()
        .find(|r| r.name == "terraform_validate")
        .expect("validate check");
    assert_eq!(validate.status, CheckStatus::Fail);
    assert!(validate.message.contains("Failed to start"));
    assert!(validate.message.contains("tests/unit"));
    let structural = report
        .results
        .iter()
        .filter(|r| !r.name.starts_with("terraform_") && !r.name.starts_with("checkov_"))
        .filter(|r| r.status == CheckStatus::Pass)
        .count();
    assert_eq!(structural, 21);
    assert_eq!(report.summary.pass, 23);
    assert_eq!(report.summary.fail, 1);
}

#[test]
fn missing_validation_dir_fails_only_validation() {
    let fx = Fixture::new();
    fs::remove_dir_all(fx.root.join("tests")).expect("remove tests dir");
    let ctx = fx.context();
    let checks = suite::plan_checks(ctx.config(), CheckGroup::Structure)
        .expect("plan")
        .into_iter()
        .chain(suite::plan_checks(ctx.config(), CheckGroup::Validate).expect("plan"))
        .collect::<Vec<_>>();
    let report = suite::run_checks(&ctx, &checks, &Selection::default()).expect("session");

    assert_eq!(report.summary.pass, 21);
    assert_eq!(report.summary.fail, 1);
    assert_eq!(status_of(&report, "terraform_validate"), CheckStatus::Fail);
    assert!(fx.terraform_calls().is_empty());
}

#[test]
fn structure_group_never_touches_terraform() {
    let fx = Fixture::new();
    fx.terraform("exit 1");
    let ctx = fx.context();
    let checks = suite::plan_checks(ctx.config(), CheckGroup::Structure).expect("plan");
    let report = suite::run_checks(&ctx, &checks, &Selection::default()).expect("session");
    assert!(report.all_passed());
    assert_eq!(report.summary.pass, 21);
    assert!(report.bootstrap.is_none());
}

#[test]
fn skipping_validation_skips_bootstrap_too() {
    let fx = Fixture::new();
    fx.terraform("exit 1");
    let ctx = fx.context();
    let checks = suite::plan_checks(ctx.config(), CheckGroup::All).expect("plan");
    let selection = Selection {
        filter: None,
        skip: vec!["terraform_validate".to_string()],
    };
    let report = suite::run_checks(&ctx, &checks, &selection).expect("session");
    assert_eq!(status_of(&report, "terraform_validate"), CheckStatus::Skip);
    assert_eq!(report.summary.skip, 1);
    assert!(report.bootstrap.is_none());
    assert!(report.all_passed());
}

#[test]
fn missing_outputs_file_fails_layout_and_output_checks_only() {
    let fx = Fixture::new();
    fs::remove_file(fx.root.join("outputs.tf")).expect("remove outputs.tf");
    let ctx = fx.context();
    let checks = suite::plan_checks(ctx.config(), CheckGroup::Structure).expect("plan");
    let report = suite::run_checks(&ctx, &checks, &Selection::default()).expect("session");

    let failed: Vec<&str> = report
        .results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(
        failed,
        vec![
            "module_structure::outputs.tf",
            "module_outputs::instance_id",
            "module_outputs::security_group_id",
            "module_outputs::instance_private_ip",
            "module_outputs::instance_public_ip",
        ]
    );
    let layout = report
        .results
        .iter()
        .find(|r| r.name == "module_structure::outputs.tf")
        .expect("layout check");
    assert!(layout.message.contains("Required file outputs.tf not found"));
}

#[test]
fn failed_validation_is_one_check_failure_with_stderr() {
    let fx = Fixture::new();
    fx.terraform(
        r#"case "$1" in
  init) mkdir -p .terraform ;;
  validate) echo "Error: Unsupported argument" >&2; exit 1 ;;
esac"#,
    );
    let report = run_all(&fx.context()).expect("session");
    assert_eq!(report.summary.fail, 1);
    let validate = report
        .results
        .iter()
        .find(|r| r.name == "terraform_validate")
        .expect("validate check");
    assert_eq!(validate.status, CheckStatus::Fail);
    assert!(validate.message.contains("Unsupported argument"));
    assert_eq!(status_of(&report, "checkov_scan::module"), CheckStatus::Pass);
}

#[test]
fn scanner_crash_fails_scan_checks_but_not_the_session() {
    let fx = Fixture::new();
    fx.checkov("echo 'Traceback (most recent call last)' >&2\nexit 2");
    let report = run_all(&fx.context()).expect("session");
    assert_eq!(status_of(&report, "checkov_scan::module"), CheckStatus::Fail);
    assert_eq!(status_of(&report, "checkov_scan::test_config"), CheckStatus::Fail);
    assert_eq!(report.summary.fail, 2);
    assert_eq!(report.summary.pass, 22);
}

#[test]
fn missing_scanner_binary_fails_only_scan_checks() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.tools.scanner = fx.tools.join("no-such-checkov").to_string_lossy().into_owned();
    let report = run_all(&RunContext::new(&fx.root, config)).expect("session");
    let scan = report
        .results
        .iter()
        .find(|r| r.name == "checkov_scan::module")
        .expect("scan check");
    assert_eq!(scan.status, CheckStatus::Fail);
    assert!(scan.message.contains("Failed to start"));
    assert_eq!(report.summary.fail, 2);
}

#[test]
fn profile_reaches_every_tool_invocation() {
    let fx = Fixture::new();
    fx.terraform(
        r#"echo "$1 $AWS_PROFILE" >> "$(dirname "$0")/terraform.calls"
case "$1" in
  init) mkdir -p .terraform ;;
  validate) echo "Success! The configuration is valid." ;;
esac"#,
    );
    let mut config = fx.config();
    config.environment.profile = "runner-ci".to_string();
    let ctx = RunContext::new(&fx.root, config);
    let checks = suite::plan_checks(ctx.config(), CheckGroup::Validate).expect("plan");
    suite::run_checks(&ctx, &checks, &Selection::default()).expect("session");
    assert_eq!(
        fx.terraform_calls(),
        vec!["init runner-ci".to_string(), "validate runner-ci".to_string()]
    );
}
