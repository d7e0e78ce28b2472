//! ccgov-state — embedded state store for chaincode governance.
//!
//! Backed by [redb](https://docs.rs/redb), holds chaincode versions, approval
//! requests and votes, test suites, rollback operations, version metadata,
//! and the deployment log.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{request_id}:{approver}`, `{suite_id}:{case}`) enable
//! prefix scans for child records.
//!
//! Multi-record invariants (one pending request per version and operation,
//! one vote per approver, quorum recomputation, rollback safety) are kept by
//! running the read-check-write inside [`StateStore::write`], which maps to a
//! single redb write transaction. redb admits one writer at a time, so two
//! concurrent callers are serialized and the second observes the first's
//! committed rows.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{ReadTxn, StateStore, TableRead, WriteTxn};
pub use types::*;
