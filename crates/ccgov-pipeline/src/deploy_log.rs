//! Append-only deployment log: one entry per lifecycle operation attempt.

use ccgov_core::{LifecycleStage, SharedClock};
use ccgov_state::tables::{DEPLOYMENT_LOGS, ordinal_key};
use ccgov_state::{ActorId, DeploymentLogEntry, LogStatus, StateStore, VersionId};
use tracing::debug;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

const LOG_COUNTER: &str = "deployment_logs";

/// An operation attempt that has started but not been logged yet.
#[derive(Debug, Clone)]
pub struct LogDraft {
    pub operation: LifecycleStage,
    pub name: String,
    pub channel: String,
    pub version: String,
    pub sequence: u64,
    pub version_id: Option<VersionId>,
    pub actor: ActorId,
    pub request: serde_json::Value,
    pub started_at: u64,
}

#[derive(Debug, Clone)]
pub struct DeploymentLog {
    store: StateStore,
    clock: SharedClock,
}

impl DeploymentLog {
    pub fn new(store: StateStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Write the final entry for `draft`. Entries are never updated afterwards.
    pub fn append(
        &self,
        draft: LogDraft,
        status: LogStatus,
        response: serde_json::Value,
        error: Option<String>,
    ) -> PipelineResult<DeploymentLogEntry> {
        let completed_at = self.clock.now_ms();
        let entry = self.store.write(|txn| {
            let ordinal = txn.next_ordinal(LOG_COUNTER)?;
            let entry = DeploymentLogEntry {
                id: Uuid::new_v4(),
                ordinal,
                operation: draft.operation,
                name: draft.name,
                channel: draft.channel,
                version: draft.version,
                sequence: draft.sequence,
                version_id: draft.version_id,
                status,
                request: draft.request,
                response,
                error,
                started_at: draft.started_at,
                completed_at,
                duration_ms: completed_at.saturating_sub(draft.started_at),
                actor: draft.actor,
            };
            txn.put(DEPLOYMENT_LOGS, &ordinal_key(ordinal), &entry)?;
            Ok::<_, PipelineError>(entry)
        })?;
        debug!(
            operation = %entry.operation,
            status = %entry.status,
            duration_ms = entry.duration_ms,
            "deployment log entry written"
        );
        Ok(entry)
    }

    /// Entries for one version, newest first.
    pub fn list_for_version(&self, version_id: VersionId) -> PipelineResult<Vec<DeploymentLogEntry>> {
        self.filtered(|e| e.version_id == Some(version_id))
    }

    /// Entries for every version of a chaincode on a channel, newest first.
    pub fn list_for_chaincode(
        &self,
        name: &str,
        channel: &str,
    ) -> PipelineResult<Vec<DeploymentLogEntry>> {
        self.filtered(|e| e.name == name && e.channel == channel)
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> PipelineResult<Vec<DeploymentLogEntry>> {
        let mut entries = self.filtered(|_| true)?;
        entries.truncate(limit);
        Ok(entries)
    }

    fn filtered<F>(&self, keep: F) -> PipelineResult<Vec<DeploymentLogEntry>>
    where
        F: Fn(&DeploymentLogEntry) -> bool,
    {
        let entries: Vec<DeploymentLogEntry> = self.store.list(DEPLOYMENT_LOGS)?;
        Ok(entries.into_iter().rev().filter(|e| keep(e)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccgov_core::ManualClock;
    use serde_json::json;

    fn draft(log_name: &str, operation: LifecycleStage, started_at: u64) -> LogDraft {
        LogDraft {
            operation,
            name: log_name.to_string(),
            channel: "trace".into(),
            version: "1.0.0".into(),
            sequence: 1,
            version_id: None,
            actor: "alice".into(),
            request: json!({ "label": "teatrace_1.0.0" }),
            started_at,
        }
    }

    #[test]
    fn entries_carry_duration_and_come_back_newest_first() {
        let clock = ManualClock::new(10_000);
        let log = DeploymentLog::new(StateStore::open_in_memory().unwrap(), clock.clone());

        clock.advance_ms(40);
        log.append(
            draft("teatrace", LifecycleStage::Install, 10_000),
            LogStatus::Succeeded,
            json!({ "package_id": "teatrace:abc" }),
            None,
        )
        .unwrap();
        log.append(
            draft("teatrace", LifecycleStage::Approve, 10_040),
            LogStatus::Failed,
            serde_json::Value::Null,
            Some("timeout".into()),
        )
        .unwrap();
        log.append(
            draft("other", LifecycleStage::Install, 10_040),
            LogStatus::Blocked,
            serde_json::Value::Null,
            None,
        )
        .unwrap();

        let entries = log.list_for_chaincode("teatrace", "trace").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, LifecycleStage::Approve);
        assert_eq!(entries[0].error.as_deref(), Some("timeout"));
        assert_eq!(entries[1].duration_ms, 40);
        assert!(entries[0].ordinal > entries[1].ordinal);

        assert_eq!(log.recent(1).unwrap()[0].name, "other");
    }
}
