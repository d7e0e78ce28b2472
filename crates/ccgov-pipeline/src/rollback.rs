//! RollbackEngine: moves a chaincode back to an older committed version.
//!
//! A rollback is recorded as metadata: the operation row, two history rows,
//! and the activation flags on the two versions involved. Re-asserting the
//! older definition on the channel is a separate commit the operator issues.
//!
//! Operation lifecycle:
//!
//! ```text
//! pending ──> in_progress ──> completed
//!    │              └───────> failed
//!    └──> cancelled
//! ```

use ccgov_core::{LifecycleStage, SharedClock};
use ccgov_state::tables::{ROLLBACK_HISTORY, ROLLBACK_OPERATIONS};
use ccgov_state::{
    Activation, ChaincodeVersion, OperationId, RollbackHistory, RollbackOperation, RollbackStatus,
    StateStore, TableRead, VersionId, WriteTxn,
};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::approval;
use crate::error::{PipelineError, PipelineResult, require_non_empty};
use crate::registry;

const OPERATION_COUNTER: &str = "rollback_operations";

/// Whether the operation lifecycle permits moving from `from` to `to`.
pub fn can_transition(from: RollbackStatus, to: RollbackStatus) -> bool {
    use RollbackStatus::*;
    matches!(
        (from, to),
        (Pending, InProgress) | (Pending, Cancelled) | (InProgress, Completed) | (InProgress, Failed)
    )
}

/// Parameters for [`RollbackEngine::create_rollback`].
#[derive(Debug, Clone)]
pub struct RollbackRequest {
    pub name: String,
    pub channel: String,
    pub reason: String,
    /// Explicit target. When absent the previous committed version is used.
    pub to_version_id: Option<VersionId>,
    pub requested_by: String,
}

#[derive(Debug, Clone)]
pub struct RollbackEngine {
    store: StateStore,
    clock: SharedClock,
}

impl RollbackEngine {
    pub fn new(store: StateStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Validate and record a rollback in `pending` state.
    ///
    /// Target resolution, the sequence check, the safety check, and the
    /// insert happen in one write transaction, so of two concurrent callers
    /// for the same chaincode the second sees the first's pending operation.
    pub fn create_rollback(&self, req: &RollbackRequest) -> PipelineResult<OperationId> {
        require_non_empty("name", &req.name)?;
        require_non_empty("channel", &req.channel)?;
        require_non_empty("reason", &req.reason)?;
        require_non_empty("requested_by", &req.requested_by)?;
        let now = self.clock.now_ms();

        let op = self.store.write(|txn| {
            let current = registry::active(txn, &req.name, &req.channel)?.ok_or_else(|| {
                PipelineError::NotFound(format!(
                    "no committed version of {} on channel {}",
                    req.name, req.channel
                ))
            })?;
            let target = resolve_target(txn, req, &current)?;

            if target.sequence >= current.sequence {
                return Err(PipelineError::Validation(format!(
                    "cannot roll back to equal or newer sequence ({} -> {})",
                    current.sequence, target.sequence
                )));
            }
            if let Some(blocker) = safety_blocker(txn, &req.name, &req.channel, now)? {
                return Err(PipelineError::RollbackUnsafe(blocker));
            }

            let op = RollbackOperation {
                id: Uuid::new_v4(),
                name: req.name.clone(),
                channel: req.channel.clone(),
                from_version_id: current.id,
                to_version_id: target.id,
                from_version: current.version.clone(),
                to_version: target.version.clone(),
                from_sequence: current.sequence,
                to_sequence: target.sequence,
                status: RollbackStatus::Pending,
                reason: req.reason.clone(),
                requested_by: req.requested_by.clone(),
                requested_at: now,
                executed_by: None,
                started_at: None,
                completed_at: None,
                duration_ms: None,
                error: None,
                ordinal: txn.next_ordinal(OPERATION_COUNTER)?,
            };
            txn.put(ROLLBACK_OPERATIONS, &op.id.to_string(), &op)?;
            Ok(op)
        })?;

        info!(
            operation_id = %op.id,
            name = %op.name,
            channel = %op.channel,
            from_sequence = op.from_sequence,
            to_sequence = op.to_sequence,
            "rollback created"
        );
        Ok(op.id)
    }

    /// Whether a new rollback of `name` on `channel` may be created now.
    pub fn is_rollback_safe(&self, name: &str, channel: &str) -> PipelineResult<bool> {
        let now = self.clock.now_ms();
        let blocker = self
            .store
            .write(|txn| safety_blocker(txn, name, channel, now))?;
        Ok(blocker.is_none())
    }

    /// Run a pending rollback to completion.
    ///
    /// The start, the revalidation, the history rows, the activation flags,
    /// and the final status are written in one transaction. A revalidation
    /// failure is persisted as `failed` before the error is returned.
    pub fn execute_rollback(
        &self,
        operation_id: OperationId,
        executor: &str,
    ) -> PipelineResult<RollbackOperation> {
        require_non_empty("executor", executor)?;

        let now = self.clock.now_ms();
        let (op, failure) = self.store.write(|txn| {
            let mut op = load_operation(txn, operation_id)?;
            transition(&mut op, RollbackStatus::InProgress)?;
            op.executed_by = Some(executor.to_string());
            op.started_at = Some(now);

            let failure = match revalidate(txn, &op) {
                Ok((from, to)) => {
                    apply(txn, &op, from, to, now)?;
                    transition(&mut op, RollbackStatus::Completed)?;
                    None
                }
                Err(err) => {
                    transition(&mut op, RollbackStatus::Failed)?;
                    op.error = Some(err.to_string());
                    Some(err)
                }
            };
            stamp_completion(&mut op, now);
            txn.put(ROLLBACK_OPERATIONS, &op.id.to_string(), &op)?;
            Ok::<_, PipelineError>((op, failure))
        })?;

        if let Some(err) = failure {
            warn!(operation_id = %operation_id, error = %err, "rollback failed");
            return Err(err);
        }
        info!(
            operation_id = %operation_id,
            executor,
            duration_ms = op.duration_ms.unwrap_or(0),
            to_version = %op.to_version,
            "rollback completed"
        );
        Ok(op)
    }

    /// Mark an `in_progress` operation `failed` without touching versions.
    ///
    /// Releases the chaincode for new rollbacks when an executor stopped
    /// after starting an operation.
    pub fn fail_rollback(
        &self,
        operation_id: OperationId,
        actor: &str,
        reason: &str,
    ) -> PipelineResult<RollbackOperation> {
        require_non_empty("actor", actor)?;
        require_non_empty("reason", reason)?;
        let now = self.clock.now_ms();
        let op = self.store.write(|txn| {
            let mut op = load_operation(txn, operation_id)?;
            if op.status != RollbackStatus::InProgress {
                return Err(PipelineError::Validation(format!(
                    "rollback {} is {}, not in_progress",
                    op.id, op.status
                )));
            }
            transition(&mut op, RollbackStatus::Failed)?;
            op.error = Some(format!("marked failed by {actor}: {reason}"));
            stamp_completion(&mut op, now);
            txn.put(ROLLBACK_OPERATIONS, &op.id.to_string(), &op)?;
            Ok::<_, PipelineError>(op)
        })?;
        warn!(operation_id = %operation_id, actor, reason, "rollback marked failed");
        Ok(op)
    }

    /// Cancel a rollback that has not started.
    pub fn cancel_rollback(
        &self,
        operation_id: OperationId,
        actor: &str,
    ) -> PipelineResult<RollbackOperation> {
        let now = self.clock.now_ms();
        let op = self.store.write(|txn| {
            let mut op = load_operation(txn, operation_id)?;
            transition(&mut op, RollbackStatus::Cancelled)?;
            op.completed_at = Some(now);
            txn.put(ROLLBACK_OPERATIONS, &op.id.to_string(), &op)?;
            Ok::<_, PipelineError>(op)
        })?;
        info!(operation_id = %operation_id, actor, "rollback cancelled");
        Ok(op)
    }

    pub fn operation(&self, operation_id: OperationId) -> PipelineResult<RollbackOperation> {
        self.store.read(|txn| load_operation(txn, operation_id))
    }

    /// Operations on one chaincode, newest first.
    pub fn list_operations(
        &self,
        name: &str,
        channel: &str,
    ) -> PipelineResult<Vec<RollbackOperation>> {
        let mut ops: Vec<RollbackOperation> = self.store.list(ROLLBACK_OPERATIONS)?;
        ops.retain(|op| op.name == name && op.channel == channel);
        ops.sort_by(|a, b| b.ordinal.cmp(&a.ordinal));
        Ok(ops)
    }

    /// History rows of one operation in insertion order.
    pub fn history(&self, operation_id: OperationId) -> PipelineResult<Vec<RollbackHistory>> {
        Ok(self
            .store
            .read(|txn| txn.scan_prefix(ROLLBACK_HISTORY, &format!("{operation_id}:")))?)
    }
}

fn resolve_target(
    txn: &WriteTxn,
    req: &RollbackRequest,
    current: &ChaincodeVersion,
) -> PipelineResult<ChaincodeVersion> {
    let Some(id) = req.to_version_id else {
        return registry::previous_committed(txn, &req.name, &req.channel, current.sequence)?
            .ok_or_else(|| {
                PipelineError::NotFound(format!(
                    "no committed version of {} before sequence {}",
                    req.name, current.sequence
                ))
            });
    };
    let target = registry::load(txn, id)?;
    check_target(&target, &req.name, &req.channel)?;
    Ok(target)
}

fn check_target(target: &ChaincodeVersion, name: &str, channel: &str) -> PipelineResult<()> {
    if !target.belongs_to(name, channel) {
        return Err(PipelineError::Validation(format!(
            "version {} belongs to {} on {}, not {name} on {channel}",
            target.id, target.name, target.channel
        )));
    }
    if !target.is_committed() {
        return Err(PipelineError::Validation(format!(
            "version {} was never committed",
            target.id
        )));
    }
    if target.is_retired() {
        return Err(PipelineError::Validation(format!(
            "version {} is retired",
            target.id
        )));
    }
    Ok(())
}

/// Describe what blocks a new rollback, if anything.
fn safety_blocker(
    txn: &WriteTxn,
    name: &str,
    channel: &str,
    now: u64,
) -> PipelineResult<Option<String>> {
    let ops: Vec<RollbackOperation> = txn.scan(ROLLBACK_OPERATIONS)?;
    if let Some(open) = ops
        .iter()
        .find(|op| op.name == name && op.channel == channel && op.status.is_open())
    {
        return Ok(Some(format!(
            "rollback {} on {name} is {}",
            open.id, open.status
        )));
    }

    let version_ids: Vec<VersionId> = registry::versions_of(txn, name, channel)?
        .iter()
        .map(|v| v.id)
        .collect();
    let pending =
        approval::pending_requests(txn, &version_ids, LifecycleStage::Commit, now)?;
    if let Some(request) = pending.first() {
        return Ok(Some(format!(
            "commit approval request {} on {name} is pending",
            request.id
        )));
    }
    Ok(None)
}

/// Re-resolve both ends of an operation before applying it.
fn revalidate(
    txn: &WriteTxn,
    op: &RollbackOperation,
) -> PipelineResult<(ChaincodeVersion, ChaincodeVersion)> {
    let from = registry::load(txn, op.from_version_id)?;
    let to = registry::load(txn, op.to_version_id)?;
    check_target(&to, &op.name, &op.channel)?;
    if from.activation == Activation::RolledBack {
        return Err(PipelineError::Validation(format!(
            "version {} was already rolled back",
            from.id
        )));
    }
    match registry::active(txn, &op.name, &op.channel)? {
        Some(active) if active.id == from.id => Ok((from, to)),
        Some(active) => Err(PipelineError::Validation(format!(
            "version {} (sequence {}) is no longer active; {} (sequence {}) is",
            from.version, from.sequence, active.version, active.sequence
        ))),
        None => Err(PipelineError::Validation(format!(
            "no active version of {} on {}",
            op.name, op.channel
        ))),
    }
}

fn apply(
    txn: &WriteTxn,
    op: &RollbackOperation,
    from: ChaincodeVersion,
    to: ChaincodeVersion,
    now: u64,
) -> PipelineResult<()> {
    let details = json!({
        "from_sequence": op.from_sequence,
        "to_sequence": op.to_sequence,
        "rollback_type": "version",
    });
    let rows = [
        (from.id, "committed", Activation::RolledBack),
        (to.id, "committed", Activation::Active),
    ];
    for (ordinal, (version_id, previous, next)) in rows.into_iter().enumerate() {
        let row = RollbackHistory {
            id: Uuid::new_v4(),
            operation_id: op.id,
            version_id,
            ordinal: ordinal as u32 + 1,
            stage: LifecycleStage::Commit,
            previous_status: previous.to_string(),
            new_status: next.to_string(),
            details: details.clone(),
            created_at: now,
        };
        txn.put(ROLLBACK_HISTORY, &row.table_key(), &row)?;
    }

    registry::set_activation(txn, from, Activation::RolledBack, now)?;
    registry::set_activation(txn, to, Activation::Active, now)?;
    Ok(())
}

fn transition(op: &mut RollbackOperation, to: RollbackStatus) -> PipelineResult<()> {
    if !can_transition(op.status, to) {
        return Err(PipelineError::Validation(format!(
            "rollback {} cannot move from {} to {to}",
            op.id, op.status
        )));
    }
    info!(operation_id = %op.id, from = %op.status, %to, "rollback status changed");
    op.status = to;
    Ok(())
}

fn stamp_completion(op: &mut RollbackOperation, now: u64) {
    op.completed_at = Some(now);
    op.duration_ms = op.started_at.map(|start| now.saturating_sub(start));
}

fn load_operation<R: TableRead>(txn: &R, id: OperationId) -> PipelineResult<RollbackOperation> {
    txn.get(ROLLBACK_OPERATIONS, &id.to_string())?
        .ok_or_else(|| PipelineError::not_found("rollback operation", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalWorkflow;
    use crate::registry::{VersionRegistry, VersionSpec};
    use ccgov_core::ManualClock;
    use ccgov_state::StageStatus;
    use std::sync::Arc;

    struct Fixture {
        engine: RollbackEngine,
        registry: VersionRegistry,
        approvals: ApprovalWorkflow,
        clock: Arc<ManualClock>,
        versions: Vec<VersionId>,
    }

    /// Three committed versions, sequences 1..=3; sequence 3 is active.
    fn fixture() -> Fixture {
        let store = StateStore::open_in_memory().unwrap();
        let clock = ManualClock::new(50_000);
        let registry = VersionRegistry::new(store.clone(), clock.clone());
        let mut versions = Vec::new();
        for seq in 1..=3u64 {
            let id = registry
                .create_version(&VersionSpec::new("teatrace", "trace", &format!("1.{seq}.0"), seq))
                .unwrap();
            registry
                .update_stage_status(id, LifecycleStage::Commit, StageStatus::Succeeded, None, Some("ops"))
                .unwrap();
            versions.push(id);
        }
        Fixture {
            engine: RollbackEngine::new(store.clone(), clock.clone()),
            approvals: ApprovalWorkflow::new(store, clock.clone()),
            registry,
            clock,
            versions,
        }
    }

    fn request(to: Option<VersionId>) -> RollbackRequest {
        RollbackRequest {
            name: "teatrace".into(),
            channel: "trace".into(),
            reason: "hash mismatch in 1.3.0".into(),
            to_version_id: to,
            requested_by: "ops".into(),
        }
    }

    #[test]
    fn transitions() {
        use RollbackStatus::*;
        assert!(can_transition(Pending, InProgress));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(InProgress, Completed));
        assert!(can_transition(InProgress, Failed));
        assert!(!can_transition(InProgress, Cancelled));
        assert!(!can_transition(Completed, InProgress));
        assert!(!can_transition(Cancelled, Pending));
    }

    #[test]
    fn defaults_to_previous_committed() {
        let f = fixture();
        let op_id = f.engine.create_rollback(&request(None)).unwrap();
        let op = f.engine.operation(op_id).unwrap();
        assert_eq!(op.status, RollbackStatus::Pending);
        assert_eq!((op.from_sequence, op.to_sequence), (3, 2));
        assert_eq!(op.to_version_id, f.versions[1]);
    }

    #[test]
    fn equal_or_newer_target_is_invalid() {
        let f = fixture();
        let err = f
            .engine
            .create_rollback(&request(Some(f.versions[2])))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(err.to_string().contains("equal or newer"));
    }

    #[test]
    fn blank_reason_is_invalid() {
        let f = fixture();
        let mut req = request(None);
        req.reason = " ".into();
        let err = f.engine.create_rollback(&req).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn open_operation_blocks_another() {
        let f = fixture();
        let op_id = f.engine.create_rollback(&request(None)).unwrap();
        assert!(!f.engine.is_rollback_safe("teatrace", "trace").unwrap());

        let err = f
            .engine
            .create_rollback(&request(Some(f.versions[0])))
            .unwrap_err();
        assert!(matches!(err, PipelineError::RollbackUnsafe(_)));

        f.engine.cancel_rollback(op_id, "ops").unwrap();
        assert!(f.engine.is_rollback_safe("teatrace", "trace").unwrap());
    }

    #[test]
    fn pending_commit_request_blocks_until_expired() {
        let f = fixture();
        f.approvals.set_policy(LifecycleStage::Commit, 1, 60).unwrap();
        f.approvals
            .create_request(f.versions[2], LifecycleStage::Commit, "alice", None)
            .unwrap();

        let err = f.engine.create_rollback(&request(None)).unwrap_err();
        assert!(matches!(err, PipelineError::RollbackUnsafe(_)));

        f.clock.advance_ms(61_000);
        f.engine.create_rollback(&request(None)).unwrap();
    }

    #[test]
    fn execute_records_history_and_flips_activation() {
        let f = fixture();
        let op_id = f.engine.create_rollback(&request(None)).unwrap();
        f.clock.advance_ms(250);

        let op = f.engine.execute_rollback(op_id, "ops-lead").unwrap();
        assert_eq!(op.status, RollbackStatus::Completed);
        assert_eq!(op.executed_by.as_deref(), Some("ops-lead"));
        assert_eq!(op.duration_ms, Some(0));

        let history = f.engine.history(op_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version_id, f.versions[2]);
        assert_eq!(history[0].new_status, "rolled_back");
        assert_eq!(history[1].version_id, f.versions[1]);
        assert_eq!(history[1].new_status, "active");
        assert_eq!(history[0].details["rollback_type"], "version");

        assert_eq!(
            f.registry.get_version(f.versions[2]).unwrap().activation,
            Activation::RolledBack
        );
        let active = f.registry.get_active_version("teatrace", "trace").unwrap().unwrap();
        assert_eq!(active.id, f.versions[1]);
    }

    #[test]
    fn execute_twice_is_refused() {
        let f = fixture();
        let op_id = f.engine.create_rollback(&request(None)).unwrap();
        f.engine.execute_rollback(op_id, "ops").unwrap();
        let err = f.engine.execute_rollback(op_id, "ops").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn target_retired_before_execute_fails_operation() {
        let f = fixture();
        let op_id = f.engine.create_rollback(&request(None)).unwrap();
        f.registry.retire_version(f.versions[1], "ops").unwrap();

        let err = f.engine.execute_rollback(op_id, "ops").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let op = f.engine.operation(op_id).unwrap();
        assert_eq!(op.status, RollbackStatus::Failed);
        assert!(op.error.unwrap().contains("retired"));
        assert!(f.engine.history(op_id).unwrap().is_empty());
    }

    #[test]
    fn newer_commit_before_execute_fails_operation() {
        let f = fixture();
        let op_id = f.engine.create_rollback(&request(None)).unwrap();

        let newer = f
            .registry
            .create_version(&VersionSpec::new("teatrace", "trace", "1.4.0", 4))
            .unwrap();
        f.registry
            .update_stage_status(newer, LifecycleStage::Commit, StageStatus::Succeeded, None, Some("ops"))
            .unwrap();

        let err = f.engine.execute_rollback(op_id, "ops").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(f.engine.operation(op_id).unwrap().status, RollbackStatus::Failed);
        assert!(f.engine.history(op_id).unwrap().is_empty());

        let active: Vec<_> = f
            .registry
            .get_version_history("teatrace", "trace")
            .unwrap()
            .into_iter()
            .filter(|v| v.activation == Activation::Active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, newer);
        assert_eq!(
            f.registry.get_version(f.versions[2]).unwrap().activation,
            Activation::Superseded
        );
    }

    #[test]
    fn stalled_operation_can_be_failed_and_unblocks() {
        let f = fixture();
        let op_id = f.engine.create_rollback(&request(None)).unwrap();

        let err = f.engine.fail_rollback(op_id, "ops", "executor died").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let mut op = f.engine.operation(op_id).unwrap();
        op.status = RollbackStatus::InProgress;
        op.started_at = Some(50_000);
        f.engine
            .store
            .put(ROLLBACK_OPERATIONS, &op_id.to_string(), &op)
            .unwrap();
        assert!(!f.engine.is_rollback_safe("teatrace", "trace").unwrap());

        f.clock.advance_ms(5_000);
        let op = f.engine.fail_rollback(op_id, "ops", "executor died").unwrap();
        assert_eq!(op.status, RollbackStatus::Failed);
        assert_eq!(op.duration_ms, Some(5_000));
        assert!(op.error.unwrap().contains("executor died"));
        assert!(f.engine.is_rollback_safe("teatrace", "trace").unwrap());
        f.engine.create_rollback(&request(None)).unwrap();
    }

    #[test]
    fn cancel_only_from_pending() {
        let f = fixture();
        let op_id = f.engine.create_rollback(&request(None)).unwrap();
        f.engine.execute_rollback(op_id, "ops").unwrap();
        let err = f.engine.cancel_rollback(op_id, "ops").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn explicit_target_must_match_chaincode() {
        let f = fixture();
        let other = f
            .registry
            .create_version(&VersionSpec::new("other", "trace", "0.1.0", 1))
            .unwrap();
        let err = f.engine.create_rollback(&request(Some(other))).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn nothing_committed_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let engine = RollbackEngine::new(store, ManualClock::new(0));
        let err = engine.create_rollback(&request(None)).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
