//! TestGate — bookkeeping for automated test suites and the commit gate.
//!
//! Tests are executed by an external runner. This module records suites and
//! their cases, derives each suite's aggregate status from its cases, and
//! answers whether a version's latest suite lets a commit through.

use ccgov_core::SharedClock;
use ccgov_state::tables::{TEST_CASES, TEST_CONFIGURATIONS, TEST_SUITES};
use ccgov_state::{
    CaseStatus, StateStore, SuiteId, SuiteStatus, TableRead, TestCase, TestConfiguration,
    TestSuite, VersionId, case_key,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult, require_non_empty};
use crate::registry;

/// Test type consulted by the commit gate unless configured otherwise.
pub const DEFAULT_GATE_TEST_TYPE: &str = "unit";

const SUITE_COUNTER: &str = "test_suites";

/// One case result reported by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,
    pub status: CaseStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
}

impl CaseReport {
    pub fn new(name: &str, status: CaseStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            output: None,
            error: None,
            duration_ms: None,
        }
    }
}

/// Answer of the test gate for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Satisfied,
    Blocked {
        suite_id: Option<SuiteId>,
        failed_cases: u32,
        status: Option<SuiteStatus>,
    },
}

impl GateVerdict {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, GateVerdict::Satisfied)
    }

    /// Convert a blocked verdict into the error surfaced to callers.
    pub fn into_result(self) -> PipelineResult<()> {
        match self {
            GateVerdict::Satisfied => Ok(()),
            GateVerdict::Blocked {
                suite_id,
                failed_cases,
                status,
            } => Err(PipelineError::TestsNotPassed {
                suite_id,
                failed_cases,
                status,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestGate {
    store: StateStore,
    clock: SharedClock,
    gate_test_type: String,
}

impl TestGate {
    pub fn new(store: StateStore, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            gate_test_type: DEFAULT_GATE_TEST_TYPE.to_string(),
        }
    }

    /// Use `test_type` instead of `unit` for the commit gate.
    pub fn with_gate_test_type(mut self, test_type: &str) -> Self {
        self.gate_test_type = test_type.to_string();
        self
    }

    pub fn gate_test_type(&self) -> &str {
        &self.gate_test_type
    }

    // ── Configuration ──────────────────────────────────────────────

    pub fn set_configuration(
        &self,
        test_type: &str,
        command: Option<&str>,
        timeout_secs: u64,
        required_to_pass: bool,
    ) -> PipelineResult<TestConfiguration> {
        require_non_empty("test_type", test_type)?;
        let config = TestConfiguration {
            test_type: test_type.to_string(),
            command: command.map(str::to_string),
            timeout_secs,
            required_to_pass,
            active: true,
            updated_at: self.clock.now_ms(),
        };
        self.store.put(TEST_CONFIGURATIONS, test_type, &config)?;
        info!(test_type, required_to_pass, "test configuration set");
        Ok(config)
    }

    pub fn configuration(&self, test_type: &str) -> PipelineResult<Option<TestConfiguration>> {
        Ok(self.store.get(TEST_CONFIGURATIONS, test_type)?)
    }

    pub fn configurations(&self) -> PipelineResult<Vec<TestConfiguration>> {
        Ok(self.store.list(TEST_CONFIGURATIONS)?)
    }

    /// Whether a passing suite of `test_type` is required before commit.
    pub fn is_mandatory(&self, test_type: &str) -> PipelineResult<bool> {
        Ok(self
            .configuration(test_type)?
            .is_some_and(|c| c.active && c.required_to_pass))
    }

    // ── Suites ─────────────────────────────────────────────────────

    /// Open a new suite for `version_id` in `running` state.
    pub fn run_suite(
        &self,
        version_id: VersionId,
        test_type: &str,
        triggered_by: Option<&str>,
    ) -> PipelineResult<SuiteId> {
        require_non_empty("test_type", test_type)?;
        let now = self.clock.now_ms();
        let suite = self.store.write(|txn| {
            let version = registry::load(txn, version_id)?;
            let ordinal = txn.next_ordinal(SUITE_COUNTER)?;
            let suite = TestSuite {
                id: Uuid::new_v4(),
                version_id,
                name: format!("{}-{}-{}", version.name, version.version, test_type),
                test_type: test_type.to_string(),
                status: SuiteStatus::Running,
                total: 0,
                passed: 0,
                failed: 0,
                skipped: 0,
                started_at: Some(now),
                completed_at: None,
                duration_ms: None,
                error: None,
                created_by: triggered_by.map(str::to_string),
                created_at: now,
                ordinal,
            };
            txn.put(TEST_SUITES, &suite.id.to_string(), &suite)?;
            Ok::<_, PipelineError>(suite)
        })?;
        info!(suite_id = %suite.id, version_id = %version_id, test_type, "test suite started");
        Ok(suite.id)
    }

    /// Insert or replace a case by name and recompute the suite aggregate.
    pub fn record_case(&self, suite_id: SuiteId, report: &CaseReport) -> PipelineResult<TestSuite> {
        require_non_empty("case name", &report.name)?;
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            let mut suite = load_suite(txn, suite_id)?;
            if suite.status == SuiteStatus::Skipped {
                return Err(PipelineError::Validation(format!(
                    "test suite {suite_id} was skipped"
                )));
            }

            let key = case_key(suite_id, &report.name);
            let existing: Option<TestCase> = txn.get(TEST_CASES, &key)?;
            let case = TestCase {
                id: existing.as_ref().map_or_else(Uuid::new_v4, |c| c.id),
                suite_id,
                name: report.name.clone(),
                status: report.status,
                output: report.output.clone(),
                error: report.error.clone(),
                duration_ms: report.duration_ms,
                created_at: existing.as_ref().map_or(now, |c| c.created_at),
                updated_at: now,
            };
            txn.put(TEST_CASES, &key, &case)?;

            let cases: Vec<TestCase> = txn.scan_prefix(TEST_CASES, &format!("{suite_id}:"))?;
            let previous = suite.status;
            apply_aggregate(&mut suite, &cases, now);
            txn.put(TEST_SUITES, &suite.id.to_string(), &suite)?;

            if previous != suite.status {
                info!(suite_id = %suite_id, from = %previous, to = %suite.status, "test suite status changed");
            } else {
                debug!(suite_id = %suite_id, case = %report.name, "test case recorded");
            }
            Ok(suite)
        })
    }

    /// Mark a suite skipped. Skipped suites accept no further cases.
    pub fn skip_suite(&self, suite_id: SuiteId, reason: &str) -> PipelineResult<TestSuite> {
        require_non_empty("reason", reason)?;
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            let mut suite = load_suite(txn, suite_id)?;
            if suite.status != SuiteStatus::Skipped {
                suite.status = SuiteStatus::Skipped;
                suite.error = Some(reason.to_string());
                stamp_completion(&mut suite, now);
                txn.put(TEST_SUITES, &suite.id.to_string(), &suite)?;
                info!(suite_id = %suite_id, reason, "test suite skipped");
            }
            Ok(suite)
        })
    }

    pub fn suite(&self, suite_id: SuiteId) -> PipelineResult<TestSuite> {
        self.store.read(|txn| load_suite(txn, suite_id))
    }

    pub fn cases(&self, suite_id: SuiteId) -> PipelineResult<Vec<TestCase>> {
        Ok(self
            .store
            .read(|txn| txn.scan_prefix(TEST_CASES, &format!("{suite_id}:")))?)
    }

    /// Most recently started suite of `test_type` for `version_id`.
    pub fn latest_suite(
        &self,
        version_id: VersionId,
        test_type: &str,
    ) -> PipelineResult<Option<TestSuite>> {
        Ok(self
            .list_suites(version_id)?
            .into_iter()
            .find(|s| s.test_type == test_type))
    }

    /// Suites for `version_id`, newest first.
    pub fn list_suites(&self, version_id: VersionId) -> PipelineResult<Vec<TestSuite>> {
        let mut suites: Vec<TestSuite> = self.store.list(TEST_SUITES)?;
        suites.retain(|s| s.version_id == version_id);
        suites.sort_by(|a, b| b.ordinal.cmp(&a.ordinal));
        Ok(suites)
    }

    // ── Gate ───────────────────────────────────────────────────────

    /// Decide whether `version_id` passes the `test_type` gate.
    ///
    /// With no suite on file the gate holds only when it is not mandatory.
    /// Otherwise the latest suite must have passed.
    pub fn gate_verdict(&self, version_id: VersionId, test_type: &str) -> PipelineResult<GateVerdict> {
        let verdict = match self.latest_suite(version_id, test_type)? {
            None if self.is_mandatory(test_type)? => GateVerdict::Blocked {
                suite_id: None,
                failed_cases: 0,
                status: None,
            },
            None => GateVerdict::Satisfied,
            Some(suite) if suite.status == SuiteStatus::Passed => GateVerdict::Satisfied,
            Some(suite) => GateVerdict::Blocked {
                suite_id: Some(suite.id),
                failed_cases: suite.failed,
                status: Some(suite.status),
            },
        };
        debug!(version_id = %version_id, test_type, ?verdict, "test gate evaluated");
        Ok(verdict)
    }

    pub fn is_gating_satisfied(&self, version_id: VersionId, test_type: &str) -> PipelineResult<bool> {
        Ok(self.gate_verdict(version_id, test_type)?.is_satisfied())
    }
}

/// Aggregate status for a set of cases: any failure fails the suite, then
/// running beats pending, and a suite with nothing outstanding has passed.
pub fn aggregate_status(cases: &[TestCase]) -> SuiteStatus {
    let any = |status: CaseStatus| cases.iter().any(|c| c.status == status);
    if any(CaseStatus::Failed) {
        SuiteStatus::Failed
    } else if any(CaseStatus::Running) {
        SuiteStatus::Running
    } else if any(CaseStatus::Pending) {
        SuiteStatus::Pending
    } else {
        SuiteStatus::Passed
    }
}

fn apply_aggregate(suite: &mut TestSuite, cases: &[TestCase], now: u64) {
    let count = |status: CaseStatus| cases.iter().filter(|c| c.status == status).count() as u32;
    suite.total = cases.len() as u32;
    suite.passed = count(CaseStatus::Passed);
    suite.failed = count(CaseStatus::Failed);
    suite.skipped = count(CaseStatus::Skipped);
    suite.status = aggregate_status(cases);

    match suite.status {
        SuiteStatus::Passed | SuiteStatus::Failed => stamp_completion(suite, now),
        _ => {
            suite.completed_at = None;
            suite.duration_ms = None;
        }
    }
}

fn stamp_completion(suite: &mut TestSuite, now: u64) {
    suite.completed_at = Some(now);
    suite.duration_ms = suite.started_at.map(|start| now.saturating_sub(start));
}

fn load_suite<R: TableRead>(txn: &R, id: SuiteId) -> PipelineResult<TestSuite> {
    txn.get(TEST_SUITES, &id.to_string())?
        .ok_or_else(|| PipelineError::not_found("test suite", id))
}
