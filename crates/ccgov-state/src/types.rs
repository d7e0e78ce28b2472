//! Domain types for the governance state store.
//!
//! These types represent the persisted state of chaincode versions, approval
//! gating, test bookkeeping, rollbacks, version metadata, and the deployment
//! log. All types are serializable to/from JSON for storage in redb tables.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use ccgov_core::{ComparisonKind, LifecycleStage};

/// Unique identifier of a chaincode version row.
pub type VersionId = Uuid;

/// Unique identifier of an approval request.
pub type RequestId = Uuid;

/// Unique identifier of a test suite run.
pub type SuiteId = Uuid;

/// Unique identifier of a rollback operation.
pub type OperationId = Uuid;

/// Opaque identity of whoever performed an action. Never authenticated here.
pub type ActorId = String;

/// Implements `as_str` and `Display` for a fieldless enum.
macro_rules! labels {
    ($ty:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ── Chaincode versions ─────────────────────────────────────────────

/// Outcome of one lifecycle stage for a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Succeeded,
    Failed,
}

labels!(StageStatus {
    Pending => "pending",
    Succeeded => "succeeded",
    Failed => "failed",
});

/// Status, timestamp, actor, and error of one lifecycle stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: StageStatus,
    /// Unix ms of the last terminal transition.
    pub at: Option<u64>,
    pub by: Option<ActorId>,
    pub error: Option<String>,
}

impl Default for StageRecord {
    fn default() -> Self {
        Self {
            status: StageStatus::Pending,
            at: None,
            by: None,
            error: None,
        }
    }
}

/// Whether a committed version is the one currently in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Never committed, or committed and not yet activated.
    #[default]
    Inactive,
    Active,
    /// Replaced by a later commit.
    Superseded,
    /// Reverted by a completed rollback.
    RolledBack,
}

labels!(Activation {
    Inactive => "inactive",
    Active => "active",
    Superseded => "superseded",
    RolledBack => "rolled_back",
});

/// One deployable chaincode definition on one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaincodeVersion {
    pub id: VersionId,
    pub name: String,
    pub version: String,
    pub sequence: u64,
    pub channel: String,
    /// Package id reported by the peer after install.
    pub package_id: Option<String>,
    pub label: Option<String>,
    pub package_path: Option<String>,
    pub install: StageRecord,
    pub approve: StageRecord,
    pub commit: StageRecord,
    pub init_required: bool,
    pub endorsement_plugin: Option<String>,
    pub validation_plugin: Option<String>,
    /// Private data collection names.
    pub collections: Vec<String>,
    pub activation: Activation,
    pub created_by: Option<ActorId>,
    pub created_at: u64,
    pub updated_at: u64,
    /// Set when soft-retired. Retired rows are kept but never resolved.
    pub retired_at: Option<u64>,
}

impl ChaincodeVersion {
    /// Build the key for the unique `(channel, name, version, sequence)` index.
    pub fn unique_key(&self) -> String {
        version_key(&self.channel, &self.name, &self.version, self.sequence)
    }

    pub fn stage(&self, stage: LifecycleStage) -> &StageRecord {
        match stage {
            LifecycleStage::Install => &self.install,
            LifecycleStage::Approve => &self.approve,
            LifecycleStage::Commit => &self.commit,
        }
    }

    pub fn stage_mut(&mut self, stage: LifecycleStage) -> &mut StageRecord {
        match stage {
            LifecycleStage::Install => &mut self.install,
            LifecycleStage::Approve => &mut self.approve,
            LifecycleStage::Commit => &mut self.commit,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.commit.status == StageStatus::Succeeded
    }

    pub fn is_retired(&self) -> bool {
        self.retired_at.is_some()
    }

    pub fn belongs_to(&self, name: &str, channel: &str) -> bool {
        self.name == name && self.channel == channel
    }
}

/// Build the unique index key for a version.
pub fn version_key(channel: &str, name: &str, version: &str, sequence: u64) -> String {
    format!("{channel}/{name}/{version}#{sequence}")
}

// ── Approval ───────────────────────────────────────────────────────

/// Quorum configuration for one gated operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub operation: LifecycleStage,
    pub required_approvals: u32,
    /// Lifetime of a request created under this policy, in seconds.
    pub expiration_secs: u64,
    pub active: bool,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

labels!(ApprovalStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Expired => "expired",
});

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// A gating request for one `(version, operation)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub version_id: VersionId,
    pub operation: LifecycleStage,
    pub status: ApprovalStatus,
    pub requested_by: ActorId,
    pub requested_at: u64,
    pub expires_at: Option<u64>,
    pub reason: Option<String>,
    /// Quorum captured from the policy when the request was created.
    pub required_approvals: u32,
    pub decided_at: Option<u64>,
    /// Insertion order across all requests.
    pub ordinal: u64,
}

impl ApprovalRequest {
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDecision {
    Approve,
    Reject,
}

labels!(VoteDecision {
    Approve => "approve",
    Reject => "reject",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalVote {
    pub id: Uuid,
    pub request_id: RequestId,
    pub approver: ActorId,
    pub decision: VoteDecision,
    pub comment: Option<String>,
    pub voted_at: u64,
}

impl ApprovalVote {
    /// Build the composite key for the votes table.
    pub fn table_key(&self) -> String {
        vote_key(self.request_id, &self.approver)
    }
}

pub fn vote_key(request_id: RequestId, approver: &str) -> String {
    format!("{request_id}:{approver}")
}

// ── Tests ──────────────────────────────────────────────────────────

/// How a test type is run and whether it gates commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfiguration {
    pub test_type: String,
    pub command: Option<String>,
    pub timeout_secs: u64,
    pub required_to_pass: bool,
    pub active: bool,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

labels!(SuiteStatus {
    Pending => "pending",
    Running => "running",
    Passed => "passed",
    Failed => "failed",
    Skipped => "skipped",
});

/// One run of one test type against one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub id: SuiteId,
    pub version_id: VersionId,
    pub name: String,
    pub test_type: String,
    pub status: SuiteStatus,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub created_by: Option<ActorId>,
    pub created_at: u64,
    pub ordinal: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

labels!(CaseStatus {
    Pending => "pending",
    Running => "running",
    Passed => "passed",
    Failed => "failed",
    Skipped => "skipped",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: Uuid,
    pub suite_id: SuiteId,
    pub name: String,
    pub status: CaseStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl TestCase {
    /// Build the composite key for the cases table.
    pub fn table_key(&self) -> String {
        case_key(self.suite_id, &self.name)
    }
}

pub fn case_key(suite_id: SuiteId, name: &str) -> String {
    format!("{suite_id}:{name}")
}

// ── Rollback ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

labels!(RollbackStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl RollbackStatus {
    /// Pending and in-progress operations block new rollbacks.
    pub fn is_open(&self) -> bool {
        matches!(self, RollbackStatus::Pending | RollbackStatus::InProgress)
    }
}

/// A request to move a chaincode back to an older committed version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackOperation {
    pub id: OperationId,
    pub name: String,
    pub channel: String,
    pub from_version_id: VersionId,
    pub to_version_id: VersionId,
    pub from_version: String,
    pub to_version: String,
    pub from_sequence: u64,
    pub to_sequence: u64,
    pub status: RollbackStatus,
    pub reason: String,
    pub requested_by: ActorId,
    pub requested_at: u64,
    pub executed_by: Option<ActorId>,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub ordinal: u64,
}

/// One per-version transition recorded while executing a rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackHistory {
    pub id: Uuid,
    pub operation_id: OperationId,
    pub version_id: VersionId,
    /// Position within the operation's history.
    pub ordinal: u32,
    pub stage: LifecycleStage,
    pub previous_status: String,
    pub new_status: String,
    pub details: serde_json::Value,
    pub created_at: u64,
}

impl RollbackHistory {
    /// Build the composite key for the history table.
    pub fn table_key(&self) -> String {
        format!("{}:{:04}", self.operation_id, self.ordinal)
    }
}

// ── Version metadata ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    #[default]
    Version,
    Alias,
    Custom,
}

labels!(TagKind {
    Version => "version",
    Alias => "alias",
    Custom => "custom",
});

/// Human alias for a version (`stable`, `2024-harvest`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionTag {
    pub id: Uuid,
    pub version_id: VersionId,
    pub name: String,
    pub kind: TagKind,
    pub description: Option<String>,
    pub active: bool,
    pub created_by: Option<ActorId>,
    pub created_at: u64,
}

impl VersionTag {
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.version_id, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    #[default]
    Chaincode,
    Library,
    External,
}

labels!(DependencyKind {
    Chaincode => "chaincode",
    Library => "library",
    External => "external",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDependency {
    pub id: Uuid,
    pub version_id: VersionId,
    pub name: String,
    pub version: String,
    pub kind: DependencyKind,
    pub required: bool,
    pub created_at: u64,
}

impl VersionDependency {
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.version_id, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseType {
    Major,
    Minor,
    #[default]
    Patch,
    Hotfix,
}

labels!(ReleaseType {
    Major => "major",
    Minor => "minor",
    Patch => "patch",
    Hotfix => "hotfix",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionReleaseNote {
    pub id: Uuid,
    pub version_id: VersionId,
    pub title: String,
    pub content: String,
    pub release_type: ReleaseType,
    pub breaking_changes: Vec<String>,
    pub new_features: Vec<String>,
    pub bug_fixes: Vec<String>,
    pub improvements: Vec<String>,
    pub created_by: Option<ActorId>,
    pub created_at: u64,
    pub ordinal: u64,
}

impl VersionReleaseNote {
    pub fn table_key(&self) -> String {
        format!("{}:{:020}", self.version_id, self.ordinal)
    }
}

/// Memoized result of comparing two recorded versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionComparison {
    pub id: Uuid,
    pub from_version_id: VersionId,
    pub to_version_id: VersionId,
    pub kind: ComparisonKind,
    pub summary: String,
    pub breaking_changes: u32,
    pub new_features: u32,
    pub bug_fixes: u32,
    pub created_at: u64,
}

impl VersionComparison {
    pub fn table_key(&self) -> String {
        comparison_key(self.from_version_id, self.to_version_id)
    }
}

pub fn comparison_key(from: VersionId, to: VersionId) -> String {
    format!("{from}:{to}")
}

// ── Deployment log ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Succeeded,
    Failed,
    /// Stopped by a gate before any external call.
    Blocked,
}

labels!(LogStatus {
    Succeeded => "succeeded",
    Failed => "failed",
    Blocked => "blocked",
});

/// One lifecycle operation attempt. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentLogEntry {
    pub id: Uuid,
    pub ordinal: u64,
    pub operation: LifecycleStage,
    pub name: String,
    pub channel: String,
    pub version: String,
    pub sequence: u64,
    pub version_id: Option<VersionId>,
    pub status: LogStatus,
    pub request: serde_json::Value,
    pub response: serde_json::Value,
    pub error: Option<String>,
    pub started_at: u64,
    pub completed_at: u64,
    pub duration_ms: u64,
    pub actor: ActorId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_accessors_address_the_right_record() {
        let mut v = sample_version();
        v.stage_mut(LifecycleStage::Approve).status = StageStatus::Failed;
        assert_eq!(v.approve.status, StageStatus::Failed);
        assert_eq!(v.stage(LifecycleStage::Install).status, StageStatus::Pending);
        assert!(!v.is_committed());
    }

    #[test]
    fn composite_keys() {
        let v = sample_version();
        assert_eq!(v.unique_key(), "trace/teatrace/1.0.0#1");

        let request_id = Uuid::nil();
        assert_eq!(
            vote_key(request_id, "alice"),
            "00000000-0000-0000-0000-000000000000:alice"
        );
    }

    #[test]
    fn request_expiry_is_inclusive() {
        let req = ApprovalRequest {
            id: Uuid::nil(),
            version_id: Uuid::nil(),
            operation: LifecycleStage::Commit,
            status: ApprovalStatus::Pending,
            requested_by: "alice".into(),
            requested_at: 0,
            expires_at: Some(1_000),
            reason: None,
            required_approvals: 1,
            decided_at: None,
            ordinal: 1,
        };
        assert!(!req.is_expired_at(999));
        assert!(req.is_expired_at(1_000));
    }

    #[test]
    fn status_labels_match_serde_names() {
        assert_eq!(RollbackStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            serde_json::to_string(&RollbackStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(Activation::RolledBack.to_string(), "rolled_back");
        assert!(RollbackStatus::Pending.is_open());
        assert!(!RollbackStatus::Cancelled.is_open());
    }

    fn sample_version() -> ChaincodeVersion {
        ChaincodeVersion {
            id: Uuid::nil(),
            name: "teatrace".into(),
            version: "1.0.0".into(),
            sequence: 1,
            channel: "trace".into(),
            package_id: None,
            label: None,
            package_path: None,
            install: StageRecord::default(),
            approve: StageRecord::default(),
            commit: StageRecord::default(),
            init_required: false,
            endorsement_plugin: None,
            validation_plugin: None,
            collections: Vec::new(),
            activation: Activation::Inactive,
            created_by: None,
            created_at: 0,
            updated_at: 0,
            retired_at: None,
        }
    }
}
