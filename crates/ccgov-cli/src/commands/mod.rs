pub mod approvals;
pub mod init;
pub mod logs;
pub mod policy;
pub mod rollback;
pub mod suites;
pub mod versions;

use std::path::Path;

use anyhow::Context as _;
use ccgov_core::{GovernanceConfig, SharedClock, SystemClock};
use ccgov_pipeline::{
    ApprovalWorkflow, DeploymentLog, RollbackEngine, TestGate, VersionCatalog, VersionRegistry,
};
use ccgov_state::StateStore;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Components wired against the store named in ccgov.toml.
///
/// The CLI works on the store only; install, approve and commit go through
/// a deployment service holding a real admin client.
pub struct Context {
    pub config: GovernanceConfig,
    pub registry: VersionRegistry,
    pub catalog: VersionCatalog,
    pub approvals: ApprovalWorkflow,
    pub tests: TestGate,
    pub rollbacks: RollbackEngine,
    pub log: DeploymentLog,
}

impl Context {
    pub fn open(config_path: &Path) -> anyhow::Result<Self> {
        let config = GovernanceConfig::from_file(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        let store_path = match config_path.parent() {
            Some(dir) if config.store.path.is_relative() => dir.join(&config.store.path),
            _ => config.store.path.clone(),
        };
        let store = StateStore::open(&store_path)
            .with_context(|| format!("opening store {}", store_path.display()))?;
        tracing::debug!(store = %store_path.display(), "store opened");
        Ok(Self::with_store(config, store, SystemClock::shared()))
    }

    pub fn with_store(config: GovernanceConfig, store: StateStore, clock: SharedClock) -> Self {
        Self {
            registry: VersionRegistry::new(store.clone(), clock.clone()),
            catalog: VersionCatalog::new(store.clone(), clock.clone()),
            approvals: ApprovalWorkflow::new(store.clone(), clock.clone())
                .with_self_approval(config.approval.allow_self_approval),
            tests: TestGate::new(store.clone(), clock.clone())
                .with_gate_test_type(&config.tests.gate_test_type),
            rollbacks: RollbackEngine::new(store.clone(), clock.clone()),
            log: DeploymentLog::new(store, clock),
            config,
        }
    }
}

/// Print `value` as pretty JSON, or run `text` for the human format.
pub fn emit<T: Serialize>(format: Format, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Text => text(value),
    }
    Ok(())
}

/// Render a millisecond timestamp as seconds since the epoch.
pub fn secs(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccgov_core::{LifecycleStage, ManualClock};

    #[test]
    fn context_carries_config_settings() {
        let mut config = GovernanceConfig::scaffold(Path::new("ccgov.redb"));
        config.tests.gate_test_type = "integration".to_string();
        let store = StateStore::open_in_memory().unwrap();
        let ctx = Context::with_store(config, store, ManualClock::new(0));

        assert_eq!(ctx.tests.gate_test_type(), "integration");
        ccgov_pipeline::apply_config(&ctx.config, &ctx.approvals, &ctx.tests).unwrap();
        let policy = ctx.approvals.policy(LifecycleStage::Commit).unwrap().unwrap();
        assert_eq!(policy.required_approvals, 2);
    }

    #[test]
    fn open_resolves_store_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = GovernanceConfig::scaffold(Path::new("state.redb"));
        let config_path = dir.path().join("ccgov.toml");
        std::fs::write(&config_path, config.to_toml_string().unwrap()).unwrap();

        let ctx = Context::open(&config_path).unwrap();
        assert!(dir.path().join("state.redb").exists());
        assert!(ctx.approvals.policies().unwrap().is_empty());
    }
}
