//! Load approval policies and test configurations from `ccgov.toml` into the store.

use ccgov_core::GovernanceConfig;
use tracing::info;

use crate::approval::ApprovalWorkflow;
use crate::error::{PipelineError, PipelineResult};
use crate::testgate::TestGate;

/// What [`apply_config`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedConfig {
    pub policies: usize,
    pub test_configurations: usize,
}

/// Write every policy and test configuration of `config` to the store,
/// replacing existing entries with the same operation or test type.
pub fn apply_config(
    config: &GovernanceConfig,
    approvals: &ApprovalWorkflow,
    tests: &TestGate,
) -> PipelineResult<AppliedConfig> {
    for policy in &config.approval.policies {
        let expiration_secs = policy.expiration_hours.checked_mul(3600).ok_or_else(|| {
            PipelineError::Validation(format!(
                "expiration_hours {} for {} is out of range",
                policy.expiration_hours, policy.operation
            ))
        })?;
        approvals.set_policy(policy.operation, policy.required_approvals, expiration_secs)?;
    }
    for entry in &config.tests.configurations {
        tests.set_configuration(
            &entry.test_type,
            entry.command.as_deref(),
            entry.timeout_secs,
            entry.required_to_pass,
        )?;
    }
    let applied = AppliedConfig {
        policies: config.approval.policies.len(),
        test_configurations: config.tests.configurations.len(),
    };
    info!(
        policies = applied.policies,
        test_configurations = applied.test_configurations,
        "governance config applied"
    );
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccgov_core::{LifecycleStage, ManualClock};
    use ccgov_state::StateStore;
    use std::path::Path;

    #[test]
    fn scaffold_seeds_commit_policy_and_unit_gate() {
        let store = StateStore::open_in_memory().unwrap();
        let clock = ManualClock::new(0);
        let approvals = ApprovalWorkflow::new(store.clone(), clock.clone());
        let tests = TestGate::new(store, clock);

        let config = GovernanceConfig::scaffold(Path::new("ccgov.redb"));
        let applied = apply_config(&config, &approvals, &tests).unwrap();
        assert_eq!(applied.policies, 1);
        assert_eq!(applied.test_configurations, 1);

        let policy = approvals.policy(LifecycleStage::Commit).unwrap().unwrap();
        assert_eq!(policy.required_approvals, 2);
        assert_eq!(policy.expiration_secs, 24 * 3600);
        assert!(tests.is_mandatory("unit").unwrap());

        // Applying twice replaces rather than duplicates.
        apply_config(&config, &approvals, &tests).unwrap();
        assert_eq!(approvals.policies().unwrap().len(), 1);
    }

    #[test]
    fn oversized_expiration_is_refused() {
        let store = StateStore::open_in_memory().unwrap();
        let clock = ManualClock::new(0);
        let approvals = ApprovalWorkflow::new(store.clone(), clock.clone());
        let tests = TestGate::new(store, clock);

        let mut config = GovernanceConfig::scaffold(Path::new("ccgov.redb"));
        config.approval.policies[0].expiration_hours = u64::MAX / 100;
        let err = apply_config(&config, &approvals, &tests).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        config.approval.policies[0].expiration_hours = 9_000;
        let err = apply_config(&config, &approvals, &tests).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(approvals.policies().unwrap().is_empty());
    }
}
