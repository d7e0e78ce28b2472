//! redb table definitions for the governance state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Ordinal keys are zero-padded so lexical order matches insertion order.

use redb::TableDefinition;

/// Shape shared by every table in the store.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Chaincode versions keyed by `{version_id}`.
pub const VERSIONS: JsonTable = TableDefinition::new("chaincode_versions");

/// Unique index: `{channel}/{name}/{version}#{sequence}` -> version id.
pub const VERSION_KEYS: JsonTable = TableDefinition::new("chaincode_version_keys");

/// Approval policies keyed by operation (`install`, `approve`, `commit`).
pub const APPROVAL_POLICIES: JsonTable = TableDefinition::new("approval_policies");

/// Approval requests keyed by `{request_id}`.
pub const APPROVAL_REQUESTS: JsonTable = TableDefinition::new("approval_requests");

/// Approval votes keyed by `{request_id}:{approver}`.
pub const APPROVAL_VOTES: JsonTable = TableDefinition::new("approval_votes");

/// Test configurations keyed by test type.
pub const TEST_CONFIGURATIONS: JsonTable = TableDefinition::new("test_configurations");

/// Test suites keyed by `{suite_id}`.
pub const TEST_SUITES: JsonTable = TableDefinition::new("test_suites");

/// Test cases keyed by `{suite_id}:{case_name}`.
pub const TEST_CASES: JsonTable = TableDefinition::new("test_cases");

/// Rollback operations keyed by `{operation_id}`.
pub const ROLLBACK_OPERATIONS: JsonTable = TableDefinition::new("rollback_operations");

/// Append-only rollback history keyed by `{operation_id}:{ordinal:04}`.
pub const ROLLBACK_HISTORY: JsonTable = TableDefinition::new("rollback_history");

/// Version tags keyed by `{version_id}:{tag_name}`.
pub const VERSION_TAGS: JsonTable = TableDefinition::new("version_tags");

/// Version dependencies keyed by `{version_id}:{dependency_id}`.
pub const VERSION_DEPENDENCIES: JsonTable = TableDefinition::new("version_dependencies");

/// Release notes keyed by `{version_id}:{ordinal:020}`.
pub const VERSION_RELEASE_NOTES: JsonTable = TableDefinition::new("version_release_notes");

/// Memoized comparisons keyed by `{from_version_id}:{to_version_id}`.
pub const VERSION_COMPARISONS: JsonTable = TableDefinition::new("version_comparisons");

/// Append-only deployment log keyed by `{ordinal:020}`.
pub const DEPLOYMENT_LOGS: JsonTable = TableDefinition::new("deployment_logs");

/// Monotonic counters keyed by counter name.
pub const COUNTERS: JsonTable = TableDefinition::new("counters");

/// Every table, for creation on open.
pub const ALL_TABLES: [JsonTable; 16] = [
    VERSIONS,
    VERSION_KEYS,
    APPROVAL_POLICIES,
    APPROVAL_REQUESTS,
    APPROVAL_VOTES,
    TEST_CONFIGURATIONS,
    TEST_SUITES,
    TEST_CASES,
    ROLLBACK_OPERATIONS,
    ROLLBACK_HISTORY,
    VERSION_TAGS,
    VERSION_DEPENDENCIES,
    VERSION_RELEASE_NOTES,
    VERSION_COMPARISONS,
    DEPLOYMENT_LOGS,
    COUNTERS,
];

/// Zero-padded ordinal suitable for lexically ordered keys.
pub fn ordinal_key(ordinal: u64) -> String {
    format!("{ordinal:020}")
}
