//! DeploymentOrchestrator — sequences install, approve, and commit.
//!
//! Every stage follows the same shape: validate the request, resolve the
//! version row, consult the gates, call the admin interface once, then record
//! the outcome on the version and in the deployment log. A gate that blocks
//! returns before any external call. External failures are recorded on the
//! version's stage and surfaced unchanged; nothing is retried here.

use std::sync::Arc;

use ccgov_core::{GovernanceConfig, LifecycleStage, SharedClock};
use ccgov_state::{
    ActorId, ApprovalStatus, ChaincodeVersion, DeploymentLogEntry, LogStatus, StageStatus,
    StateStore,
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::admin::{
    AdminClient, AdminError, ChaincodeDefinition, CommittedChaincode, InstalledChaincode,
};
use crate::approval::ApprovalWorkflow;
use crate::catalog::VersionCatalog;
use crate::deploy_log::{DeploymentLog, LogDraft};
use crate::error::{PipelineError, PipelineResult, require_non_empty};
use crate::registry::{VersionRegistry, VersionSpec};
use crate::rollback::RollbackEngine;
use crate::testgate::TestGate;

/// One lifecycle request: which definition, and who asked.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub spec: VersionSpec,
    pub actor: ActorId,
}

impl DeployRequest {
    pub fn new(spec: VersionSpec, actor: &str) -> Self {
        Self {
            spec,
            actor: actor.to_string(),
        }
    }

    fn summary(&self) -> Value {
        json!({
            "name": self.spec.name,
            "channel": self.spec.channel,
            "version": self.spec.version,
            "sequence": self.spec.sequence,
            "package_path": self.spec.package_path,
            "label": self.spec.label,
            "init_required": self.spec.init_required,
            "collections": self.spec.collections,
        })
    }
}

type StageResult = PipelineResult<(ChaincodeVersion, Value)>;

pub struct DeploymentOrchestrator {
    admin: Arc<dyn AdminClient>,
    registry: VersionRegistry,
    approvals: ApprovalWorkflow,
    tests: TestGate,
    rollbacks: RollbackEngine,
    catalog: VersionCatalog,
    log: DeploymentLog,
    clock: SharedClock,
}

impl DeploymentOrchestrator {
    pub fn new(store: StateStore, clock: SharedClock, admin: Arc<dyn AdminClient>) -> Self {
        Self {
            admin,
            registry: VersionRegistry::new(store.clone(), clock.clone()),
            approvals: ApprovalWorkflow::new(store.clone(), clock.clone()),
            tests: TestGate::new(store.clone(), clock.clone()),
            rollbacks: RollbackEngine::new(store.clone(), clock.clone()),
            catalog: VersionCatalog::new(store.clone(), clock.clone()),
            log: DeploymentLog::new(store, clock.clone()),
            clock,
        }
    }

    /// Build an orchestrator honouring the self-approval and gate settings
    /// of `config`. Policies themselves live in the store.
    pub fn from_config(
        store: StateStore,
        clock: SharedClock,
        admin: Arc<dyn AdminClient>,
        config: &GovernanceConfig,
    ) -> Self {
        let mut orchestrator = Self::new(store, clock, admin);
        orchestrator.approvals = orchestrator
            .approvals
            .with_self_approval(config.approval.allow_self_approval);
        orchestrator.tests = orchestrator
            .tests
            .with_gate_test_type(&config.tests.gate_test_type);
        orchestrator
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    pub fn approvals(&self) -> &ApprovalWorkflow {
        &self.approvals
    }

    pub fn tests(&self) -> &TestGate {
        &self.tests
    }

    pub fn rollbacks(&self) -> &RollbackEngine {
        &self.rollbacks
    }

    pub fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    pub fn log(&self) -> &DeploymentLog {
        &self.log
    }

    // ── Lifecycle stages ───────────────────────────────────────────

    /// Install the package on the peer and record the assigned package id.
    pub async fn install(&self, req: &DeployRequest) -> PipelineResult<ChaincodeVersion> {
        let mut draft = self.draft(LifecycleStage::Install, req);
        let result = self.run_install(req, &mut draft).await;
        self.finish(draft, result)
    }

    /// Approve the definition for the actor's organization.
    pub async fn approve(&self, req: &DeployRequest) -> PipelineResult<ChaincodeVersion> {
        let mut draft = self.draft(LifecycleStage::Approve, req);
        let result = self.run_approve(req, &mut draft).await;
        self.finish(draft, result)
    }

    /// Commit the definition to the channel once every gate holds.
    pub async fn commit(&self, req: &DeployRequest) -> PipelineResult<ChaincodeVersion> {
        let mut draft = self.draft(LifecycleStage::Commit, req);
        let result = self.run_commit(req, &mut draft).await;
        self.finish(draft, result)
    }

    async fn run_install(&self, req: &DeployRequest, draft: &mut LogDraft) -> StageResult {
        let stage = LifecycleStage::Install;
        let (package_path, label) = match (&req.spec.package_path, &req.spec.label) {
            (Some(path), Some(label)) => (path.as_str(), label.as_str()),
            _ => {
                return Err(PipelineError::Validation(
                    "install requires package_path and label".to_string(),
                ));
            }
        };
        require_non_empty("package_path", package_path)?;
        require_non_empty("label", label)?;

        let version = self.resolve(req, draft)?;
        self.approval_gate(&version, stage, &req.actor)?;

        info!(version_id = %version.id, package_path, label, "dispatching install");
        match self.admin.install_chaincode(package_path, label).await {
            Ok(package_id) => {
                self.registry.set_package_id(version.id, &package_id)?;
                let version = self.succeed(&version, stage, &req.actor)?;
                Ok((version, json!({ "package_id": package_id })))
            }
            Err(err) => Err(self.fail(&version, stage, &req.actor, err)),
        }
    }

    async fn run_approve(&self, req: &DeployRequest, draft: &mut LogDraft) -> StageResult {
        let stage = LifecycleStage::Approve;
        let version = self.resolve(req, draft)?;
        self.approval_gate(&version, stage, &req.actor)?;

        let definition = ChaincodeDefinition::from_version(&version);
        info!(version_id = %version.id, sequence = version.sequence, "dispatching approve");
        match self.admin.approve_chaincode(&definition).await {
            Ok(()) => {
                let version = self.succeed(&version, stage, &req.actor)?;
                Ok((version, json!({ "approved": true, "sequence": definition.sequence })))
            }
            Err(err) => Err(self.fail(&version, stage, &req.actor, err)),
        }
    }

    async fn run_commit(&self, req: &DeployRequest, draft: &mut LogDraft) -> StageResult {
        let stage = LifecycleStage::Commit;
        let version = self.resolve(req, draft)?;

        if let Some(active) = self
            .registry
            .get_active_version(&version.name, &version.channel)?
        {
            if version.sequence <= active.sequence {
                return Err(PipelineError::Validation(format!(
                    "sequence {} must exceed active sequence {} ({})",
                    version.sequence, active.sequence, active.version
                )));
            }
        }

        let gate_type = self.tests.gate_test_type();
        if self.tests.is_mandatory(gate_type)? {
            self.tests.gate_verdict(version.id, gate_type)?.into_result()?;
        }
        self.approval_gate(&version, stage, &req.actor)?;

        let definition = ChaincodeDefinition::from_version(&version);
        info!(version_id = %version.id, sequence = version.sequence, "dispatching commit");
        match self.admin.commit_chaincode(&definition).await {
            Ok(()) => {
                let version = self.succeed(&version, stage, &req.actor)?;
                Ok((version, json!({ "committed": true, "sequence": definition.sequence })))
            }
            Err(err) => Err(self.fail(&version, stage, &req.actor, err)),
        }
    }

    // ── Read-through queries ───────────────────────────────────────

    pub async fn list_installed(&self, peer: &str) -> PipelineResult<Vec<InstalledChaincode>> {
        debug!(peer, "listing installed chaincode");
        self.admin.list_installed(peer).await.map_err(|err| {
            warn!(peer, error = %err, "list installed failed");
            PipelineError::from(err)
        })
    }

    pub async fn list_committed(&self, channel: &str) -> PipelineResult<Vec<CommittedChaincode>> {
        debug!(channel, "listing committed chaincode");
        self.admin.list_committed(channel).await.map_err(|err| {
            warn!(channel, error = %err, "list committed failed");
            PipelineError::from(err)
        })
    }

    pub async fn get_committed_info(
        &self,
        channel: &str,
        name: &str,
    ) -> PipelineResult<ChaincodeDefinition> {
        debug!(channel, name, "querying committed definition");
        self.admin.get_committed_info(channel, name).await.map_err(|err| {
            warn!(channel, name, error = %err, "committed info query failed");
            PipelineError::from(err)
        })
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn draft(&self, operation: LifecycleStage, req: &DeployRequest) -> LogDraft {
        LogDraft {
            operation,
            name: req.spec.name.clone(),
            channel: req.spec.channel.clone(),
            version: req.spec.version.clone(),
            sequence: req.spec.sequence,
            version_id: None,
            actor: req.actor.clone(),
            request: req.summary(),
            started_at: self.clock.now_ms(),
        }
    }

    fn resolve(&self, req: &DeployRequest, draft: &mut LogDraft) -> PipelineResult<ChaincodeVersion> {
        require_non_empty("actor", &req.actor)?;
        let mut spec = req.spec.clone();
        if spec.actor.is_none() {
            spec.actor = Some(req.actor.clone());
        }
        let version = self.registry.find_or_create_version(&spec)?;
        draft.version_id = Some(version.id);
        Ok(version)
    }

    /// Fail with `ApprovalRequired` when a policy gates `stage` and the
    /// version has not been approved for it.
    fn approval_gate(
        &self,
        version: &ChaincodeVersion,
        stage: LifecycleStage,
        actor: &str,
    ) -> PipelineResult<()> {
        if self.approvals.policy(stage)?.is_none()
            || self.approvals.check_approval(version.id, stage)?
        {
            return Ok(());
        }
        // A rejection stands until someone opens a new request explicitly.
        let request = match self.approvals.latest_request(version.id, stage)? {
            Some(latest) if latest.status == ApprovalStatus::Rejected => latest,
            _ => self
                .approvals
                .ensure_pending_request(version.id, stage, actor)?,
        };
        info!(
            version_id = %version.id,
            stage = %stage,
            request_id = %request.id,
            status = %request.status,
            "blocked pending approval"
        );
        Err(PipelineError::ApprovalRequired {
            request_id: request.id,
            status: request.status,
        })
    }

    fn succeed(
        &self,
        version: &ChaincodeVersion,
        stage: LifecycleStage,
        actor: &str,
    ) -> PipelineResult<ChaincodeVersion> {
        let updated = self.registry.update_stage_status(
            version.id,
            stage,
            StageStatus::Succeeded,
            None,
            Some(actor),
        )?;
        info!(version_id = %version.id, stage = %stage, actor, "stage succeeded");
        Ok(updated)
    }

    /// Record an external failure on the version and turn it into the error
    /// returned to the caller.
    fn fail(
        &self,
        version: &ChaincodeVersion,
        stage: LifecycleStage,
        actor: &str,
        err: AdminError,
    ) -> PipelineError {
        let message = err.to_string();
        warn!(version_id = %version.id, stage = %stage, error = %message, "external operation failed");
        if let Err(record_err) = self.registry.update_stage_status(
            version.id,
            stage,
            StageStatus::Failed,
            Some(&message),
            Some(actor),
        ) {
            warn!(version_id = %version.id, error = %record_err, "could not record stage failure");
        }
        PipelineError::ExternalOperationFailed(err)
    }

    /// Write the log entry for a finished stage and hand back its result.
    fn finish(&self, draft: LogDraft, result: StageResult) -> PipelineResult<ChaincodeVersion> {
        match result {
            Ok((version, response)) => {
                self.log.append(draft, LogStatus::Succeeded, response, None)?;
                Ok(version)
            }
            Err(err) => {
                let (status, response) = match &err {
                    PipelineError::ApprovalRequired { request_id, status } => (
                        LogStatus::Blocked,
                        json!({ "approval_request_id": request_id, "approval_status": status }),
                    ),
                    PipelineError::TestsNotPassed {
                        suite_id,
                        failed_cases,
                        status,
                    } => (
                        LogStatus::Blocked,
                        json!({
                            "test_suite_id": suite_id,
                            "failed_cases": failed_cases,
                            "suite_status": status,
                        }),
                    ),
                    _ => (LogStatus::Failed, Value::Null),
                };
                if let Err(log_err) = self.log.append(draft, status, response, Some(err.to_string())) {
                    warn!(error = %log_err, "could not write deployment log entry");
                }
                Err(err)
            }
        }
    }

    /// Entries written for one version, newest first.
    pub fn deployment_log(&self, version: &ChaincodeVersion) -> PipelineResult<Vec<DeploymentLogEntry>> {
        self.log.list_for_version(version.id)
    }
}
