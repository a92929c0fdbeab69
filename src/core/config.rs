//! Harness configuration (`modgate.toml`).
//!
//! Every field is optional; the defaults describe the layout of the GitLab
//! runner module the harness was written for.

use crate::core::error::HarnessError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "modgate.toml";
/// Overrides `[environment] profile` when set.
pub const PROFILE_ENV: &str = "MODGATE_PROFILE";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Variable the infrastructure tool reads its credential profile from.
    pub profile_var: String,
    pub profile: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            profile_var: "AWS_PROFILE".to_string(),
            profile: "devops-toryordonline".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    pub terraform: String,
    pub scanner: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            terraform: "terraform".to_string(),
            scanner: "checkov".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModuleConfig {
    /// Directory `terraform init`/`validate` run in, relative to the module root.
    pub validation_dir: PathBuf,
    pub required_files: Vec<String>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        ModuleConfig {
            validation_dir: PathBuf::from("tests/unit"),
            required_files: crate::core::structure::REQUIRED_FILES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ScanTarget {
    pub name: String,
    /// Directory to scan, relative to the module root.
    pub dir: PathBuf,
    /// Report file name inside `report_dir`. No report is written when absent.
    #[serde(default)]
    pub report: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    pub framework: String,
    pub report_dir: PathBuf,
    #[serde(rename = "target")]
    pub targets: Vec<ScanTarget>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            framework: crate::plugins::scan::DEFAULT_FRAMEWORK.to_string(),
            report_dir: PathBuf::from("scan_results"),
            targets: vec![
                ScanTarget {
                    name: "module".to_string(),
                    dir: PathBuf::from("."),
                    report: Some("checkov_scan_results.json".to_string()),
                },
                ScanTarget {
                    name: "test_config".to_string(),
                    dir: PathBuf::from("tests/unit"),
                    report: Some("checkov_test_scan_results.json".to_string()),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    pub environment: EnvironmentConfig,
    pub tools: ToolsConfig,
    pub module: ModuleConfig,
    pub scan: ScanConfig,
}

impl HarnessConfig {
    /// Env overrides handed to every external command.
    pub fn tool_env(&self) -> Vec<(String, String)> {
        if self.environment.profile_var.is_empty() {
            return Vec::new();
        }
        vec![(
            self.environment.profile_var.clone(),
            self.environment.profile.clone(),
        )]
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(profile) = std::env::var(PROFILE_ENV)
            && !profile.trim().is_empty()
        {
            self.environment.profile = profile;
        }
    }
}

pub fn parse_config(content: &str) -> Result<HarnessConfig, HarnessError> {
    let config: HarnessConfig = toml::from_str(content)?;
    Ok(config)
}

/// Load `modgate.toml` from `explicit` or the module root.
///
/// A missing default config file is not an error; a missing explicit one is.
pub fn load_config(
    module_root: &Path,
    explicit: Option<&Path>,
) -> Result<HarnessConfig, HarnessError> {
    let mut config = match explicit {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|e| {
                HarnessError::PathError(format!("cannot read config {}: {}", path.display(), e))
            })?;
            parse_config(&content)?
        }
        None => {
            let path = module_root.join(CONFIG_FILE);
            if path.exists() {
                parse_config(&fs::read_to_string(&path)?)?
            } else {
                HarnessConfig::default()
            }
        }
    };
    config.apply_env_overrides();
    Ok(config)
}
