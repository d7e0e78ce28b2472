//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ccgov_core::ManualClock;
use ccgov_pipeline::{
    AdminClient, AdminError, ChaincodeDefinition, CommittedChaincode, DeployRequest,
    DeploymentOrchestrator, InstalledChaincode, VersionSpec,
};
use ccgov_state::StateStore;

/// Admin double that records every call and fails on request.
#[derive(Default)]
pub struct ScriptedAdmin {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, AdminError>>,
    committed: Mutex<Vec<ChaincodeDefinition>>,
}

impl ScriptedAdmin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next call to `op` fail with `err`.
    pub fn fail_next(&self, op: &'static str, err: AdminError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == op).count()
    }

    fn record(&self, op: &'static str) -> Result<(), AdminError> {
        self.calls.lock().unwrap().push(op.to_string());
        match self.failures.lock().unwrap().remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AdminClient for ScriptedAdmin {
    async fn install_chaincode(
        &self,
        _package_path: &str,
        label: &str,
    ) -> Result<String, AdminError> {
        self.record("install")?;
        Ok(format!("{label}:6f1c2a"))
    }

    async fn approve_chaincode(&self, _definition: &ChaincodeDefinition) -> Result<(), AdminError> {
        self.record("approve")
    }

    async fn commit_chaincode(&self, definition: &ChaincodeDefinition) -> Result<(), AdminError> {
        self.record("commit")?;
        self.committed.lock().unwrap().push(definition.clone());
        Ok(())
    }

    async fn list_installed(&self, _peer: &str) -> Result<Vec<InstalledChaincode>, AdminError> {
        self.record("list_installed")?;
        Ok(vec![InstalledChaincode {
            package_id: "teatrace_1.0.0:6f1c2a".into(),
            label: "teatrace_1.0.0".into(),
        }])
    }

    async fn list_committed(&self, _channel: &str) -> Result<Vec<CommittedChaincode>, AdminError> {
        self.record("list_committed")?;
        Ok(self
            .committed
            .lock()
            .unwrap()
            .iter()
            .map(|d| CommittedChaincode {
                name: d.name.clone(),
                version: d.version.clone(),
                sequence: d.sequence,
                init_required: d.init_required,
            })
            .collect())
    }

    async fn get_committed_info(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<ChaincodeDefinition, AdminError> {
        self.record("get_committed_info")?;
        self.committed
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|d| d.channel == channel && d.name == name)
            .cloned()
            .ok_or_else(|| AdminError::Rejected(format!("{name} is not committed on {channel}")))
    }
}

pub struct Harness {
    pub orchestrator: DeploymentOrchestrator,
    pub admin: Arc<ScriptedAdmin>,
    pub clock: Arc<ManualClock>,
    pub store: StateStore,
}

pub fn harness() -> Harness {
    let store = StateStore::open_in_memory().unwrap();
    let clock = ManualClock::new(1_700_000_000_000);
    let admin = ScriptedAdmin::new();
    let orchestrator = DeploymentOrchestrator::new(store.clone(), clock.clone(), admin.clone());
    Harness {
        orchestrator,
        admin,
        clock,
        store,
    }
}

pub fn request(version: &str, sequence: u64, actor: &str) -> DeployRequest {
    let mut spec = VersionSpec::new("teatrace", "trace", version, sequence);
    spec.package_path = Some(format!("/var/ccgov/packages/teatrace_{version}.tar.gz"));
    spec.label = Some(format!("teatrace_{version}"));
    spec.collections = vec!["batchPrivateDetails".into()];
    DeployRequest::new(spec, actor)
}
