//! ApprovalWorkflow — quorum voting that gates lifecycle operations.
//!
//! Each [`ApprovalRequest`] moves through a small state machine:
//!
//! ```text
//! pending --vote(reject)-------------------> rejected
//! pending --vote(approve), count >= quorum -> approved
//! pending --now >= expires_at--------------> expired
//! ```
//!
//! Expiry is lazy: it is applied and persisted the next time the request is
//! voted on or read, so a stored `pending` may be stale until then. A vote
//! and the quorum recomputation it triggers share one write transaction, so
//! concurrent voters are serialized and the request is decided exactly once.

use ccgov_core::{LifecycleStage, SharedClock};
use ccgov_state::tables::{APPROVAL_POLICIES, APPROVAL_REQUESTS, APPROVAL_VOTES};
use ccgov_state::{
    ApprovalPolicy, ApprovalRequest, ApprovalStatus, ApprovalVote, RequestId, StateStore,
    TableRead, VersionId, VoteDecision, WriteTxn,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult, require_non_empty};
use crate::registry;

/// Quorum used when a request is created for an operation without a policy.
pub const DEFAULT_REQUIRED_APPROVALS: u32 = 1;

/// Lifetime used when a request is created for an operation without a policy.
pub const DEFAULT_EXPIRATION_SECS: u64 = 24 * 60 * 60;

/// Longest request lifetime a policy may set: one year.
pub const MAX_EXPIRATION_SECS: u64 = 365 * 24 * 60 * 60;

const REQUEST_COUNTER: &str = "approval_requests";

/// Result of a successful vote.
#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub request: ApprovalRequest,
    pub approvals: u32,
    pub rejections: u32,
    /// Quorum the votes were counted against.
    pub required: u32,
    /// True only for the vote that moved the request out of `pending`.
    pub decided: bool,
}

/// Selection for [`ApprovalWorkflow::list_requests`].
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<ApprovalStatus>,
    pub operation: Option<LifecycleStage>,
    pub requested_by: Option<String>,
    pub version_id: Option<VersionId>,
}

#[derive(Debug, Clone)]
pub struct ApprovalWorkflow {
    store: StateStore,
    clock: SharedClock,
    allow_self_approval: bool,
}

impl ApprovalWorkflow {
    pub fn new(store: StateStore, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            allow_self_approval: false,
        }
    }

    /// Let a requester vote on their own request.
    pub fn with_self_approval(mut self, allow: bool) -> Self {
        self.allow_self_approval = allow;
        self
    }

    // ── Policies ───────────────────────────────────────────────────

    /// Create or replace the policy for `operation`.
    pub fn set_policy(
        &self,
        operation: LifecycleStage,
        required_approvals: u32,
        expiration_secs: u64,
    ) -> PipelineResult<ApprovalPolicy> {
        if required_approvals < 1 {
            return Err(PipelineError::Validation(
                "required_approvals must be at least 1".to_string(),
            ));
        }
        if expiration_secs > MAX_EXPIRATION_SECS {
            return Err(PipelineError::Validation(format!(
                "expiration_secs must be at most {MAX_EXPIRATION_SECS}, got {expiration_secs}"
            )));
        }
        let policy = ApprovalPolicy {
            operation,
            required_approvals,
            expiration_secs,
            active: true,
            updated_at: self.clock.now_ms(),
        };
        self.store.put(APPROVAL_POLICIES, operation.as_str(), &policy)?;
        info!(operation = %operation, required_approvals, "approval policy set");
        Ok(policy)
    }

    /// Drop the policy for `operation`. Returns true if one existed.
    pub fn remove_policy(&self, operation: LifecycleStage) -> PipelineResult<bool> {
        let existed = self
            .store
            .write(|txn| txn.remove(APPROVAL_POLICIES, operation.as_str()))?;
        if existed {
            info!(operation = %operation, "approval policy removed");
        }
        Ok(existed)
    }

    /// The active policy for `operation`, if any.
    pub fn policy(&self, operation: LifecycleStage) -> PipelineResult<Option<ApprovalPolicy>> {
        self.store.read(|txn| active_policy(txn, operation))
    }

    pub fn policies(&self) -> PipelineResult<Vec<ApprovalPolicy>> {
        Ok(self.store.list(APPROVAL_POLICIES)?)
    }

    // ── Requests ───────────────────────────────────────────────────

    /// Open a gating request for `(version_id, operation)`.
    ///
    /// Fails with `Conflict` while another request for the same pair is still
    /// pending. A pending request that has run past its expiry is marked
    /// `expired` first and does not conflict.
    pub fn create_request(
        &self,
        version_id: VersionId,
        operation: LifecycleStage,
        requester: &str,
        reason: Option<&str>,
    ) -> PipelineResult<RequestId> {
        require_non_empty("requester", requester)?;
        let now = self.clock.now_ms();
        let request = self.store.write(|txn| {
            registry::load(txn, version_id)?;
            if let Some(existing) = pending_for(txn, version_id, operation, now)? {
                return Err(PipelineError::Conflict(format!(
                    "approval request {} is already pending for {operation} of version {version_id}",
                    existing.id
                )));
            }
            insert_request(txn, version_id, operation, requester, reason, now)
        })?;
        Ok(request.id)
    }

    /// Return the pending request for `(version_id, operation)`, opening one
    /// if none is pending.
    pub fn ensure_pending_request(
        &self,
        version_id: VersionId,
        operation: LifecycleStage,
        requester: &str,
    ) -> PipelineResult<ApprovalRequest> {
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            registry::load(txn, version_id)?;
            match pending_for(txn, version_id, operation, now)? {
                Some(existing) => Ok(existing),
                None => insert_request(txn, version_id, operation, requester, None, now),
            }
        })
    }

    /// Fetch a request, applying the lazy expiry check.
    pub fn request(&self, id: RequestId) -> PipelineResult<ApprovalRequest> {
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            let request = load_request(txn, id)?;
            expire_if_due(txn, request, now)
        })
    }

    /// Most recently created request for `(version_id, operation)`.
    pub fn latest_request(
        &self,
        version_id: VersionId,
        operation: LifecycleStage,
    ) -> PipelineResult<Option<ApprovalRequest>> {
        let now = self.clock.now_ms();
        self.store.write(|txn| match latest_for(txn, version_id, operation)? {
            Some(request) => Ok(Some(expire_if_due(txn, request, now)?)),
            None => Ok(None),
        })
    }

    /// Requests matching `filter`, newest first. Statuses are as stored.
    pub fn list_requests(&self, filter: &RequestFilter) -> PipelineResult<Vec<ApprovalRequest>> {
        let mut requests: Vec<ApprovalRequest> = self.store.list(APPROVAL_REQUESTS)?;
        requests.retain(|r| {
            filter.status.is_none_or(|s| r.status == s)
                && filter.operation.is_none_or(|op| r.operation == op)
                && filter.version_id.is_none_or(|v| r.version_id == v)
                && filter
                    .requested_by
                    .as_ref()
                    .is_none_or(|who| &r.requested_by == who)
        });
        requests.sort_by(|a, b| b.ordinal.cmp(&a.ordinal));
        Ok(requests)
    }

    pub fn votes(&self, request_id: RequestId) -> PipelineResult<Vec<ApprovalVote>> {
        Ok(self
            .store
            .read(|txn| txn.scan_prefix(APPROVAL_VOTES, &format!("{request_id}:")))?)
    }

    // ── Voting ─────────────────────────────────────────────────────

    /// Cast one approver's vote and recompute the request's status.
    pub fn vote(
        &self,
        request_id: RequestId,
        approver: &str,
        decision: VoteDecision,
        comment: Option<&str>,
    ) -> PipelineResult<VoteOutcome> {
        require_non_empty("approver", approver)?;
        let now = self.clock.now_ms();
        let allow_self = self.allow_self_approval;

        let result = self.store.write(|txn| {
            let request = load_request(txn, request_id)?;
            if request.status != ApprovalStatus::Pending {
                return Err(PipelineError::Validation(format!(
                    "approval request {request_id} is {}, not pending",
                    request.status
                )));
            }
            // Persist the expiry, then refuse the vote outside the transaction.
            let request = expire_if_due(txn, request, now)?;
            if request.status == ApprovalStatus::Expired {
                return Ok(None);
            }
            if !allow_self && request.requested_by == approver {
                return Err(PipelineError::Validation(format!(
                    "{approver} requested {request_id} and cannot approve it"
                )));
            }

            let vote = ApprovalVote {
                id: Uuid::new_v4(),
                request_id,
                approver: approver.to_string(),
                decision,
                comment: comment.map(str::to_string),
                voted_at: now,
            };
            if !txn.insert_new(APPROVAL_VOTES, &vote.table_key(), &vote)? {
                return Err(PipelineError::Conflict(format!(
                    "{approver} has already voted on approval request {request_id}"
                )));
            }
            info!(request_id = %request_id, approver, decision = %decision, "approval vote cast");

            recompute(txn, request, now).map(Some)
        })?;

        result.ok_or_else(|| {
            PipelineError::Validation(format!("approval request {request_id} has expired"))
        })
    }

    /// Whether `operation` may proceed for `version_id`.
    ///
    /// With no request on file the answer depends on the policy: gated
    /// operations are not approved, ungated ones are.
    pub fn check_approval(
        &self,
        version_id: VersionId,
        operation: LifecycleStage,
    ) -> PipelineResult<bool> {
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            let Some(request) = latest_for(txn, version_id, operation)? else {
                return Ok(active_policy(txn, operation)?.is_none());
            };
            let request = expire_if_due(txn, request, now)?;
            Ok(request.status == ApprovalStatus::Approved)
        })
    }
}

fn insert_request(
    txn: &WriteTxn,
    version_id: VersionId,
    operation: LifecycleStage,
    requester: &str,
    reason: Option<&str>,
    now: u64,
) -> PipelineResult<ApprovalRequest> {
    let (required, ttl_secs) = match active_policy(txn, operation)? {
        Some(policy) => (policy.required_approvals, policy.expiration_secs),
        None => (DEFAULT_REQUIRED_APPROVALS, DEFAULT_EXPIRATION_SECS),
    };
    let request = ApprovalRequest {
        id: Uuid::new_v4(),
        version_id,
        operation,
        status: ApprovalStatus::Pending,
        requested_by: requester.to_string(),
        requested_at: now,
        expires_at: Some(now.saturating_add(ttl_secs.saturating_mul(1000))),
        reason: reason.map(str::to_string),
        required_approvals: required,
        decided_at: None,
        ordinal: txn.next_ordinal(REQUEST_COUNTER)?,
    };
    txn.put(APPROVAL_REQUESTS, &request.id.to_string(), &request)?;
    info!(
        request_id = %request.id,
        version_id = %version_id,
        operation = %operation,
        required,
        requester,
        "approval request created"
    );
    Ok(request)
}

/// Count the votes on `request` and settle its status.
fn recompute(txn: &WriteTxn, mut request: ApprovalRequest, now: u64) -> PipelineResult<VoteOutcome> {
    let votes: Vec<ApprovalVote> =
        txn.scan_prefix(APPROVAL_VOTES, &format!("{}:", request.id))?;
    let approvals = votes
        .iter()
        .filter(|v| v.decision == VoteDecision::Approve)
        .count() as u32;
    let rejections = votes.len() as u32 - approvals;

    let required = active_policy(txn, request.operation)?
        .map(|p| p.required_approvals)
        .unwrap_or(request.required_approvals);

    let next = if rejections > 0 {
        ApprovalStatus::Rejected
    } else if approvals >= required {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    };

    let decided = next != ApprovalStatus::Pending;
    if decided {
        request.status = next;
        request.decided_at = Some(now);
        txn.put(APPROVAL_REQUESTS, &request.id.to_string(), &request)?;
        info!(
            request_id = %request.id,
            status = %next,
            approvals,
            rejections,
            "approval request decided"
        );
    } else {
        debug!(request_id = %request.id, approvals, required, "quorum not yet reached");
    }

    Ok(VoteOutcome {
        request,
        approvals,
        rejections,
        required,
        decided,
    })
}

/// Mark a pending request `expired` if its deadline has passed.
pub(crate) fn expire_if_due(
    txn: &WriteTxn,
    mut request: ApprovalRequest,
    now: u64,
) -> PipelineResult<ApprovalRequest> {
    if request.status == ApprovalStatus::Pending && request.is_expired_at(now) {
        request.status = ApprovalStatus::Expired;
        request.decided_at = Some(now);
        txn.put(APPROVAL_REQUESTS, &request.id.to_string(), &request)?;
        warn!(request_id = %request.id, "approval request expired");
    }
    Ok(request)
}

/// Every request still pending after lazy expiry for the given versions.
pub(crate) fn pending_requests(
    txn: &WriteTxn,
    version_ids: &[VersionId],
    operation: LifecycleStage,
    now: u64,
) -> PipelineResult<Vec<ApprovalRequest>> {
    let requests: Vec<ApprovalRequest> = txn.scan(APPROVAL_REQUESTS)?;
    let mut pending = Vec::new();
    for request in requests {
        if request.operation != operation
            || request.status != ApprovalStatus::Pending
            || !version_ids.contains(&request.version_id)
        {
            continue;
        }
        let request = expire_if_due(txn, request, now)?;
        if request.status == ApprovalStatus::Pending {
            pending.push(request);
        }
    }
    Ok(pending)
}

fn pending_for(
    txn: &WriteTxn,
    version_id: VersionId,
    operation: LifecycleStage,
    now: u64,
) -> PipelineResult<Option<ApprovalRequest>> {
    Ok(pending_requests(txn, &[version_id], operation, now)?
        .into_iter()
        .next())
}

fn latest_for<R: TableRead>(
    txn: &R,
    version_id: VersionId,
    operation: LifecycleStage,
) -> PipelineResult<Option<ApprovalRequest>> {
    let requests: Vec<ApprovalRequest> = txn.scan(APPROVAL_REQUESTS)?;
    Ok(requests
        .into_iter()
        .filter(|r| r.version_id == version_id && r.operation == operation)
        .max_by_key(|r| r.ordinal))
}

fn load_request<R: TableRead>(txn: &R, id: RequestId) -> PipelineResult<ApprovalRequest> {
    txn.get(APPROVAL_REQUESTS, &id.to_string())?
        .ok_or_else(|| PipelineError::not_found("approval request", id))
}

pub(crate) fn active_policy<R: TableRead>(
    txn: &R,
    operation: LifecycleStage,
) -> PipelineResult<Option<ApprovalPolicy>> {
    let policy: Option<ApprovalPolicy> = txn.get(APPROVAL_POLICIES, operation.as_str())?;
    Ok(policy.filter(|p| p.active))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{VersionRegistry, VersionSpec};
    use ccgov_core::ManualClock;
    use std::sync::Arc;

    struct Fixture {
        workflow: ApprovalWorkflow,
        clock: Arc<ManualClock>,
        version_id: VersionId,
    }

    fn fixture() -> Fixture {
        let store = StateStore::open_in_memory().unwrap();
        let clock = ManualClock::new(1_000_000);
        let registry = VersionRegistry::new(store.clone(), clock.clone());
        let version_id = registry
            .create_version(&VersionSpec::new("teatrace", "trace", "1.0.0", 1))
            .unwrap();
        Fixture {
            workflow: ApprovalWorkflow::new(store, clock.clone()),
            clock,
            version_id,
        }
    }

    #[test]
    fn one_pending_request_per_version_and_operation() {
        let f = fixture();
        f.workflow
            .create_request(f.version_id, LifecycleStage::Commit, "alice", Some("release"))
            .unwrap();

        let err = f
            .workflow
            .create_request(f.version_id, LifecycleStage::Commit, "bob", None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Conflict(_)));

        // A different operation on the same version is independent.
        f.workflow
            .create_request(f.version_id, LifecycleStage::Approve, "bob", None)
            .unwrap();
    }

    #[test]
    fn request_for_unknown_version_is_not_found() {
        let f = fixture();
        let err = f
            .workflow
            .create_request(Uuid::new_v4(), LifecycleStage::Commit, "alice", None)
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn quorum_approves() {
        let f = fixture();
        f.workflow.set_policy(LifecycleStage::Commit, 2, 3600).unwrap();
        let id = f
            .workflow
            .create_request(f.version_id, LifecycleStage::Commit, "alice", None)
            .unwrap();

        let first = f.workflow.vote(id, "bob", VoteDecision::Approve, None).unwrap();
        assert_eq!(first.request.status, ApprovalStatus::Pending);
        assert!(!first.decided);
        assert!(!f.workflow.check_approval(f.version_id, LifecycleStage::Commit).unwrap());

        let second = f
            .workflow
            .vote(id, "carol", VoteDecision::Approve, Some("lgtm"))
            .unwrap();
        assert_eq!(second.request.status, ApprovalStatus::Approved);
        assert!(second.decided);
        assert_eq!(second.approvals, 2);
        assert!(f.workflow.check_approval(f.version_id, LifecycleStage::Commit).unwrap());
    }

    #[test]
    fn expiration_window_is_bounded() {
        let f = fixture();
        let err = f
            .workflow
            .set_policy(LifecycleStage::Commit, 1, u64::MAX / 100)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(f.workflow.policy(LifecycleStage::Commit).unwrap().is_none());

        f.workflow
            .set_policy(LifecycleStage::Commit, 1, MAX_EXPIRATION_SECS)
            .unwrap();
        let id = f
            .workflow
            .create_request(f.version_id, LifecycleStage::Commit, "alice", None)
            .unwrap();
        let request = f.workflow.request(id).unwrap();
        assert_eq!(request.expires_at, Some(1_000_000 + MAX_EXPIRATION_SECS * 1000));
        assert_eq!(request.status, ApprovalStatus::Pending);
    }

    #[test]
    fn outcome_reports_quorum_in_force() {
        let f = fixture();
        f.workflow.set_policy(LifecycleStage::Commit, 3, 3600).unwrap();
        let id = f
            .workflow
            .create_request(f.version_id, LifecycleStage::Commit, "alice", None)
            .unwrap();
        f.workflow.set_policy(LifecycleStage::Commit, 2, 3600).unwrap();

        let first = f.workflow.vote(id, "bob", VoteDecision::Approve, None).unwrap();
        assert_eq!(first.request.required_approvals, 3);
        assert_eq!(first.required, 2);
        assert!(!first.decided);

        let second = f.workflow.vote(id, "carol", VoteDecision::Approve, None).unwrap();
        assert_eq!(second.required, 2);
        assert!(second.decided);
    }

    #[test]
    fn single_reject_is_terminal() {
        let f = fixture();
        f.workflow.set_policy(LifecycleStage::Commit, 2, 3600).unwrap();
        let id = f
            .workflow
            .create_request(f.version_id, LifecycleStage::Commit, "alice", None)
            .unwrap();

        f.workflow.vote(id, "bob", VoteDecision::Approve, None).unwrap();
        let outcome = f
            .workflow
            .vote(id, "carol", VoteDecision::Reject, Some("missing migration"))
            .unwrap();
        assert_eq!(outcome.request.status, ApprovalStatus::Rejected);

        let err = f.workflow.vote(id, "dave", VoteDecision::Approve, None).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(f.workflow.request(id).unwrap().status, ApprovalStatus::Rejected);
        assert!(!f.workflow.check_approval(f.version_id, LifecycleStage::Commit).unwrap());
    }

    #[test]
    fn duplicate_and_self_votes_are_refused() {
        let f = fixture();
        f.workflow.set_policy(LifecycleStage::Commit, 3, 3600).unwrap();
        let id = f
            .workflow
            .create_request(f.version_id, LifecycleStage::Commit, "alice", None)
            .unwrap();

        let err = f.workflow.vote(id, "alice", VoteDecision::Approve, None).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        f.workflow.vote(id, "bob", VoteDecision::Approve, None).unwrap();
        let err = f.workflow.vote(id, "bob", VoteDecision::Reject, None).unwrap_err();
        assert!(matches!(err, PipelineError::Conflict(_)));

        // The refused reject left no trace.
        assert_eq!(f.workflow.votes(id).unwrap().len(), 1);
        assert_eq!(f.workflow.request(id).unwrap().status, ApprovalStatus::Pending);
    }

    #[test]
    fn self_approval_when_allowed() {
        let f = fixture();
        let workflow = f.workflow.clone().with_self_approval(true);
        let id = workflow
            .create_request(f.version_id, LifecycleStage::Install, "alice", None)
            .unwrap();
        let outcome = workflow.vote(id, "alice", VoteDecision::Approve, None).unwrap();
        assert_eq!(outcome.request.status, ApprovalStatus::Approved);
    }

    #[test]
    fn expiry_is_lazy_and_persisted() {
        let f = fixture();
        f.workflow.set_policy(LifecycleStage::Commit, 1, 60).unwrap();
        let id = f
            .workflow
            .create_request(f.version_id, LifecycleStage::Commit, "alice", None)
            .unwrap();

        f.clock.advance_ms(60_000);
        let listed = f.workflow.list_requests(&RequestFilter::default()).unwrap();
        assert_eq!(listed[0].status, ApprovalStatus::Pending);

        let err = f.workflow.vote(id, "bob", VoteDecision::Approve, None).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        let stored: ApprovalRequest = f
            .workflow
            .store
            .get(APPROVAL_REQUESTS, &id.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ApprovalStatus::Expired);
        assert!(f.workflow.votes(id).unwrap().is_empty());

        // An expired request no longer blocks a fresh one.
        f.workflow
            .create_request(f.version_id, LifecycleStage::Commit, "alice", None)
            .unwrap();
    }

    #[test]
    fn ungated_operations_pass_without_request() {
        let f = fixture();
        assert!(f.workflow.check_approval(f.version_id, LifecycleStage::Commit).unwrap());

        f.workflow.set_policy(LifecycleStage::Commit, 1, 3600).unwrap();
        assert!(!f.workflow.check_approval(f.version_id, LifecycleStage::Commit).unwrap());

        assert!(f.workflow.remove_policy(LifecycleStage::Commit).unwrap());
        assert!(f.workflow.check_approval(f.version_id, LifecycleStage::Commit).unwrap());
    }

    #[test]
    fn request_without_policy_uses_defaults() {
        let f = fixture();
        let id = f
            .workflow
            .create_request(f.version_id, LifecycleStage::Approve, "alice", None)
            .unwrap();
        let request = f.workflow.request(id).unwrap();
        assert_eq!(request.required_approvals, DEFAULT_REQUIRED_APPROVALS);
        assert_eq!(
            request.expires_at,
            Some(1_000_000 + DEFAULT_EXPIRATION_SECS * 1000)
        );
    }

    #[test]
    fn ensure_pending_reuses_open_request() {
        let f = fixture();
        let a = f
            .workflow
            .ensure_pending_request(f.version_id, LifecycleStage::Commit, "alice")
            .unwrap();
        let b = f
            .workflow
            .ensure_pending_request(f.version_id, LifecycleStage::Commit, "bob")
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.requested_by, "alice");
    }

    #[test]
    fn zero_quorum_policy_is_invalid() {
        let f = fixture();
        let err = f.workflow.set_policy(LifecycleStage::Commit, 0, 3600).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(f.workflow.policies().unwrap().is_empty());
    }

    #[test]
    fn list_filters() {
        let f = fixture();
        f.workflow
            .create_request(f.version_id, LifecycleStage::Commit, "alice", None)
            .unwrap();
        f.workflow
            .create_request(f.version_id, LifecycleStage::Approve, "bob", None)
            .unwrap();

        let by_bob = f
            .workflow
            .list_requests(&RequestFilter {
                requested_by: Some("bob".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_bob.len(), 1);
        assert_eq!(by_bob[0].operation, LifecycleStage::Approve);

        let all = f.workflow.list_requests(&RequestFilter::default()).unwrap();
        assert_eq!(all[0].operation, LifecycleStage::Approve);
    }
}
