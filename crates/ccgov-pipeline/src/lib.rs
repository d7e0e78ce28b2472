//! ccgov-pipeline — chaincode deployment governance.
//!
//! Takes a chaincode through install → approve → commit against an external
//! admin interface, gated by quorum approvals and automated test suites, and
//! reversible through tracked rollback operations.
//!
//! # Components
//!
//! - **`registry`**: version rows, stage statuses, activation
//! - **`catalog`**: tags, dependencies, release notes, memoized comparisons
//! - **`testgate`**: test suite bookkeeping and the commit gate
//! - **`approval`**: quorum voting on approval requests
//! - **`rollback`**: rollback operations and their history
//! - **`orchestrator`**: sequences the stages
//! - **`deploy_log`**: append-only record of every stage attempt
//! - **`seed`**: loads ccgov.toml policies into the store
//! - **`admin`**: the [`AdminClient`] boundary to the blockchain platform
//!
//! Every component shares one [`ccgov_state::StateStore`] and one
//! [`ccgov_core::Clock`].

pub mod admin;
pub mod approval;
pub mod catalog;
pub mod deploy_log;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod rollback;
pub mod seed;
pub mod testgate;

pub use admin::{AdminClient, AdminError, ChaincodeDefinition, CommittedChaincode, InstalledChaincode};
pub use approval::{ApprovalWorkflow, RequestFilter, VoteOutcome};
pub use catalog::{ReleaseNoteSpec, VersionCatalog, compare_versions};
pub use deploy_log::{DeploymentLog, LogDraft};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{DeployRequest, DeploymentOrchestrator};
pub use registry::{VersionFilter, VersionRegistry, VersionSpec};
pub use rollback::{RollbackEngine, RollbackRequest};
pub use seed::{AppliedConfig, apply_config};
pub use testgate::{CaseReport, GateVerdict, TestGate};
