//! ccgov.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::LifecycleStage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub tests: TestsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub allow_self_approval: bool,
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub operation: LifecycleStage,
    pub required_approvals: u32,
    #[serde(default = "default_expiration_hours")]
    pub expiration_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestsConfig {
    /// Test type consulted by the commit gate.
    #[serde(default = "default_gate_test_type")]
    pub gate_test_type: String,
    #[serde(default)]
    pub configurations: Vec<TestConfigEntry>,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            gate_test_type: default_gate_test_type(),
            configurations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfigEntry {
    pub test_type: String,
    pub command: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub required_to_pass: bool,
}

/// Upper bound on `expiration_hours`: one year.
pub const MAX_EXPIRATION_HOURS: u64 = 365 * 24;

fn default_expiration_hours() -> u64 {
    24
}

fn default_gate_test_type() -> String {
    "unit".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl GovernanceConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GovernanceConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations that would make a gate impossible to satisfy.
    pub fn validate(&self) -> anyhow::Result<()> {
        for policy in &self.approval.policies {
            anyhow::ensure!(
                policy.required_approvals >= 1,
                "policy for {} must require at least one approval",
                policy.operation
            );
            anyhow::ensure!(
                policy.expiration_hours <= MAX_EXPIRATION_HOURS,
                "policy for {} expires after {}h, more than {MAX_EXPIRATION_HOURS}h",
                policy.operation,
                policy.expiration_hours
            );
        }
        let mut seen = Vec::new();
        for policy in &self.approval.policies {
            anyhow::ensure!(
                !seen.contains(&policy.operation),
                "duplicate approval policy for {}",
                policy.operation
            );
            seen.push(policy.operation);
        }
        for entry in &self.tests.configurations {
            anyhow::ensure!(!entry.test_type.is_empty(), "test configuration without test_type");
        }
        Ok(())
    }

    /// Scaffold a starter ccgov.toml: commit needs two approvals and a
    /// passing unit suite.
    pub fn scaffold(store_path: &Path) -> Self {
        GovernanceConfig {
            store: StoreConfig {
                path: store_path.to_path_buf(),
            },
            approval: ApprovalConfig {
                allow_self_approval: false,
                policies: vec![PolicyConfig {
                    operation: LifecycleStage::Commit,
                    required_approvals: 2,
                    expiration_hours: default_expiration_hours(),
                }],
            },
            tests: TestsConfig {
                gate_test_type: default_gate_test_type(),
                configurations: vec![TestConfigEntry {
                    test_type: "unit".to_string(),
                    command: Some("go test ./...".to_string()),
                    timeout_secs: default_timeout_secs(),
                    required_to_pass: true,
                }],
            },
        }
    }
}
