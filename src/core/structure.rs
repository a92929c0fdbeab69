//! Structural assertions over raw configuration text.
//!
//! These checks certify that required tokens are present. They do not parse
//! HCL or shell; a requirement holds when its token (or pattern) occurs
//! anywhere in the artifact. Each requirement is evaluated on its own so one
//! missing declaration never hides another.

use crate::core::error::HarnessError;
use regex::Regex;
use std::fs;
use std::path::Path;

pub const REQUIRED_FILES: &[&str] = &[
    "main.tf",
    "outputs.tf",
    "versions.tf",
    "templates/user_data.sh",
];

pub const REQUIRED_OUTPUTS: &[&str] = &[
    "instance_id",
    "security_group_id",
    "instance_private_ip",
    "instance_public_ip",
];

/// The module files the harness reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    ModuleDefinition,
    Outputs,
    BootstrapScript,
}

impl ArtifactKind {
    pub fn relative_path(self) -> &'static str {
        match self {
            ArtifactKind::ModuleDefinition => "main.tf",
            ArtifactKind::Outputs => "outputs.tf",
            ArtifactKind::BootstrapScript => "templates/user_data.sh",
        }
    }

    pub fn read(self, module_root: &Path) -> Result<String, HarnessError> {
        let path = module_root.join(self.relative_path());
        fs::read_to_string(&path).map_err(|e| {
            HarnessError::PathError(format!("cannot read {}: {}", path.display(), e))
        })
    }
}

#[derive(Debug, Clone)]
pub enum Rule {
    Contains(String),
    /// Holds when any one of the alternatives is present.
    AnyOf(Vec<String>),
    Matches(Regex),
}

impl Rule {
    pub fn holds(&self, content: &str) -> bool {
        match self {
            Rule::Contains(token) => content.contains(token.as_str()),
            Rule::AnyOf(tokens) => tokens.iter().any(|t| content.contains(t.as_str())),
            Rule::Matches(re) => re.is_match(content),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Rule::Contains(token) => token.clone(),
            Rule::AnyOf(tokens) => tokens.join("` or `"),
            Rule::Matches(re) => re.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Requirement {
    /// Stable short name, used in check names.
    pub id: String,
    /// Failure message, e.g. "IAM role resource not defined".
    pub expectation: String,
    pub rule: Rule,
}

impl Requirement {
    fn contains(id: &str, token: &str, expectation: &str) -> Self {
        Requirement {
            id: id.to_string(),
            expectation: expectation.to_string(),
            rule: Rule::Contains(token.to_string()),
        }
    }
}

pub fn module_resource_requirements() -> Vec<Requirement> {
    vec![
        Requirement::contains(
            "security_group",
            "resource \"aws_security_group\"",
            "Security group resource not defined",
        ),
        Requirement::contains(
            "iam_role",
            "resource \"aws_iam_role\"",
            "IAM role resource not defined",
        ),
        Requirement::contains(
            "instance",
            "resource \"aws_instance\"",
            "EC2 instance resource not defined",
        ),
        Requirement::contains(
            "egress_block",
            "egress {",
            "Egress rule not defined in security group",
        ),
        Requirement::contains(
            "open_egress",
            "0.0.0.0/0",
            "Egress rule allowing all outbound traffic not found",
        ),
        Requirement::contains(
            "assume_role_policy",
            "assume_role_policy",
            "IAM role assume_role_policy not defined",
        ),
        Requirement::contains(
            "ec2_principal",
            "ec2.amazonaws.com",
            "EC2 service principal not found in IAM role",
        ),
        Requirement::contains(
            "user_data",
            "user_data",
            "user_data not defined in EC2 instance",
        ),
        Requirement::contains(
            "instance_profile",
            "iam_instance_profile",
            "iam_instance_profile not defined in EC2 instance",
        ),
    ]
}

pub fn bootstrap_script_requirements() -> Vec<Requirement> {
    vec![
        Requirement::contains(
            "runner_register",
            "gitlab-runner register",
            "GitLab runner registration command not found",
        ),
        Requirement::contains(
            "docker_executor",
            "--executor \"docker\"",
            "Docker executor configuration not found",
        ),
        Requirement {
            id: "package_update".to_string(),
            expectation: "Package update command not found".to_string(),
            rule: Rule::AnyOf(vec!["apt-get update".to_string(), "yum update".to_string()]),
        },
        Requirement::contains("docker", "docker", "Docker installation not found"),
    ]
}

/// One requirement per output name: `output "<name>"`, any whitespace between.
pub fn output_requirements(names: &[&str]) -> Result<Vec<Requirement>, HarnessError> {
    names
        .iter()
        .map(|name| {
            let pattern = format!(r#"\boutput\s+"{}""#, regex::escape(name));
            let re = Regex::new(&pattern)?;
            Ok(Requirement {
                id: name.to_string(),
                expectation: format!("Required output {name} not defined"),
                rule: Rule::Matches(re),
            })
        })
        .collect()
}

/// Assert one requirement against an artifact's text.
pub fn assert_requirement(
    artifact: &str,
    content: &str,
    requirement: &Requirement,
) -> Result<(), HarnessError> {
    if requirement.rule.holds(content) {
        Ok(())
    } else {
        Err(HarnessError::StructuralAssertion {
            expectation: requirement.expectation.clone(),
            artifact: artifact.to_string(),
            token: requirement.rule.describe(),
        })
    }
}

/// Evaluate every requirement independently.
pub fn assert_all<'a>(
    artifact: &str,
    content: &str,
    requirements: &'a [Requirement],
) -> Vec<(&'a Requirement, Result<(), HarnessError>)> {
    requirements
        .iter()
        .map(|req| (req, assert_requirement(artifact, content, req)))
        .collect()
}

pub fn assert_file_exists(module_root: &Path, relative: &str) -> Result<(), HarnessError> {
    if module_root.join(relative).exists() {
        Ok(())
    } else {
        Err(HarnessError::StructuralAssertion {
            expectation: format!("Required file {relative} not found"),
            artifact: module_root.display().to_string(),
            token: relative.to_string(),
        })
    }
}

/// Relative paths from `required` that do not exist under `module_root`.
pub fn missing_files<'a>(module_root: &Path, required: &'a [String]) -> Vec<&'a str> {
    required
        .iter()
        .map(String::as_str)
        .filter(|rel| assert_file_exists(module_root, rel).is_err())
        .collect()
}
