//! VersionRegistry — the durable record of every chaincode version.
//!
//! Owns all lifecycle writes to [`ChaincodeVersion`] rows: creation under the
//! unique `(channel, name, version, sequence)` key, per-stage status updates,
//! activation when a commit lands, and soft retirement. Resolution helpers
//! (`latest`, `previous active`, `active`) are also exposed as
//! transaction-scoped functions so the rollback engine can evaluate them in
//! the same transaction as its own writes.

use std::cmp::Ordering;

use ccgov_core::{LifecycleStage, SemVer, SharedClock};
use ccgov_state::tables::{VERSION_KEYS, VERSIONS};
use ccgov_state::{
    Activation, ActorId, ChaincodeVersion, StageRecord, StageStatus, StateStore, TableRead,
    VersionId, WriteTxn, version_key,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult, require_non_empty};

/// Everything needed to register a new chaincode version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionSpec {
    pub name: String,
    pub version: String,
    pub sequence: u64,
    pub channel: String,
    pub package_path: Option<String>,
    pub label: Option<String>,
    pub init_required: bool,
    pub endorsement_plugin: Option<String>,
    pub validation_plugin: Option<String>,
    pub collections: Vec<String>,
    pub actor: Option<ActorId>,
}

impl VersionSpec {
    pub fn new(name: &str, channel: &str, version: &str, sequence: u64) -> Self {
        Self {
            name: name.to_string(),
            channel: channel.to_string(),
            version: version.to_string(),
            sequence,
            ..Default::default()
        }
    }

    /// Reject blank identifiers and sequences below 1.
    pub fn validate(&self) -> PipelineResult<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("channel", &self.channel)?;
        require_non_empty("version", &self.version)?;
        if self.sequence < 1 {
            return Err(PipelineError::Validation(format!(
                "sequence must be at least 1, got {}",
                self.sequence
            )));
        }
        Ok(())
    }

    pub fn unique_key(&self) -> String {
        version_key(&self.channel, &self.name, &self.version, self.sequence)
    }
}

/// Selection for [`VersionRegistry::list_versions`].
#[derive(Debug, Clone, Default)]
pub struct VersionFilter {
    pub name: Option<String>,
    pub channel: Option<String>,
    pub include_retired: bool,
}

#[derive(Debug, Clone)]
pub struct VersionRegistry {
    store: StateStore,
    clock: SharedClock,
}

impl VersionRegistry {
    pub fn new(store: StateStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Register a new version. Fails with `Conflict` if the unique key is taken.
    pub fn create_version(&self, spec: &VersionSpec) -> PipelineResult<VersionId> {
        spec.validate()?;
        let now = self.clock.now_ms();
        let version = self.store.write(|txn| insert_version(txn, spec, now))?;
        Ok(version.id)
    }

    /// Return the version registered under `spec`'s unique key, creating it if absent.
    pub fn find_or_create_version(&self, spec: &VersionSpec) -> PipelineResult<ChaincodeVersion> {
        spec.validate()?;
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            let existing: Option<VersionId> = txn.get(VERSION_KEYS, &spec.unique_key())?;
            match existing {
                Some(id) => load(txn, id),
                None => insert_version(txn, spec, now),
            }
        })
    }

    pub fn get_version(&self, id: VersionId) -> PipelineResult<ChaincodeVersion> {
        self.store.read(|txn| load(txn, id))
    }

    /// Look a version up by its unique key.
    pub fn find_version(
        &self,
        name: &str,
        channel: &str,
        version: &str,
        sequence: u64,
    ) -> PipelineResult<Option<ChaincodeVersion>> {
        let key = version_key(channel, name, version, sequence);
        self.store.read(|txn| {
            let id: Option<VersionId> = txn.get(VERSION_KEYS, &key)?;
            match id {
                Some(id) => Ok(Some(load(txn, id)?)),
                None => Ok(None),
            }
        })
    }

    pub fn list_versions(&self, filter: &VersionFilter) -> PipelineResult<Vec<ChaincodeVersion>> {
        let mut versions: Vec<ChaincodeVersion> = self.store.list(VERSIONS)?;
        versions.retain(|v| {
            filter.name.as_ref().is_none_or(|n| &v.name == n)
                && filter.channel.as_ref().is_none_or(|c| &v.channel == c)
                && (filter.include_retired || !v.is_retired())
        });
        versions.sort_by(|a, b| {
            (&a.channel, &a.name, a.sequence).cmp(&(&b.channel, &b.name, b.sequence))
        });
        Ok(versions)
    }

    /// Move one stage of a version to `status`.
    ///
    /// Repeating an update is harmless. A stage that already `succeeded` is
    /// never moved back to `pending`. A commit that succeeds activates the
    /// version and supersedes whichever version of the same chaincode was
    /// active, in the same transaction.
    pub fn update_stage_status(
        &self,
        id: VersionId,
        stage: LifecycleStage,
        status: StageStatus,
        error: Option<&str>,
        actor: Option<&str>,
    ) -> PipelineResult<ChaincodeVersion> {
        let now = self.clock.now_ms();
        self.store
            .write(|txn| apply_stage_status(txn, id, stage, status, error, actor, now))
    }

    /// Record the package id the peer assigned at install.
    pub fn set_package_id(&self, id: VersionId, package_id: &str) -> PipelineResult<()> {
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            let mut version = load(txn, id)?;
            version.package_id = Some(package_id.to_string());
            version.updated_at = now;
            txn.put(VERSIONS, &version.id.to_string(), &version)?;
            Ok(())
        })
    }

    /// Soft-retire a version. The row is kept but no longer resolved as
    /// latest, previous, or active.
    pub fn retire_version(&self, id: VersionId, actor: &str) -> PipelineResult<ChaincodeVersion> {
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            let mut version = load(txn, id)?;
            if version.activation == Activation::Active {
                return Err(PipelineError::Validation(format!(
                    "version {id} is active and cannot be retired"
                )));
            }
            if version.retired_at.is_none() {
                version.retired_at = Some(now);
                version.updated_at = now;
                txn.put(VERSIONS, &version.id.to_string(), &version)?;
                info!(version_id = %id, actor, "chaincode version retired");
            }
            Ok(version)
        })
    }

    /// Highest version by semver precedence, tie-broken by most recent commit.
    pub fn get_latest_version(
        &self,
        name: &str,
        channel: &str,
    ) -> PipelineResult<Option<ChaincodeVersion>> {
        self.store.read(|txn| {
            let versions = versions_of(txn, name, channel)?;
            Ok(versions.into_iter().max_by(latest_order))
        })
    }

    /// Highest committed sequence strictly below `current_sequence`.
    pub fn get_previous_active_version(
        &self,
        name: &str,
        channel: &str,
        current_sequence: u64,
    ) -> PipelineResult<Option<ChaincodeVersion>> {
        self.store
            .read(|txn| previous_committed(txn, name, channel, current_sequence))
    }

    /// The version currently in force for a chaincode on a channel.
    pub fn get_active_version(
        &self,
        name: &str,
        channel: &str,
    ) -> PipelineResult<Option<ChaincodeVersion>> {
        self.store.read(|txn| active(txn, name, channel))
    }

    /// Every non-retired version, newest first.
    pub fn get_version_history(
        &self,
        name: &str,
        channel: &str,
    ) -> PipelineResult<Vec<ChaincodeVersion>> {
        self.store.read(|txn| {
            let mut versions = versions_of(txn, name, channel)?;
            versions.sort_by(|a, b| {
                SemVer::parse(&b.version)
                    .cmp(&SemVer::parse(&a.version))
                    .then(b.sequence.cmp(&a.sequence))
            });
            Ok(versions)
        })
    }
}

fn insert_version(
    txn: &WriteTxn,
    spec: &VersionSpec,
    now: u64,
) -> PipelineResult<ChaincodeVersion> {
    let version = ChaincodeVersion {
        id: Uuid::new_v4(),
        name: spec.name.clone(),
        version: spec.version.clone(),
        sequence: spec.sequence,
        channel: spec.channel.clone(),
        package_id: None,
        label: spec.label.clone(),
        package_path: spec.package_path.clone(),
        install: StageRecord::default(),
        approve: StageRecord::default(),
        commit: StageRecord::default(),
        init_required: spec.init_required,
        endorsement_plugin: spec.endorsement_plugin.clone(),
        validation_plugin: spec.validation_plugin.clone(),
        collections: spec.collections.clone(),
        activation: Activation::Inactive,
        created_by: spec.actor.clone(),
        created_at: now,
        updated_at: now,
        retired_at: None,
    };

    if !txn.insert_new(VERSION_KEYS, &version.unique_key(), &version.id)? {
        return Err(PipelineError::Conflict(format!(
            "chaincode {} version {} sequence {} already exists on channel {}",
            spec.name, spec.version, spec.sequence, spec.channel
        )));
    }
    txn.put(VERSIONS, &version.id.to_string(), &version)?;

    if !SemVer::is_strict(&version.version) {
        warn!(
            version = %version.version,
            name = %version.name,
            "version is not strict semver, ordering falls back to lenient parsing"
        );
    }
    info!(
        version_id = %version.id,
        name = %version.name,
        version = %version.version,
        sequence = version.sequence,
        channel = %version.channel,
        "chaincode version created"
    );
    Ok(version)
}

pub(crate) fn apply_stage_status(
    txn: &WriteTxn,
    id: VersionId,
    stage: LifecycleStage,
    status: StageStatus,
    error: Option<&str>,
    actor: Option<&str>,
    now: u64,
) -> PipelineResult<ChaincodeVersion> {
    let mut version = load(txn, id)?;
    let current = version.stage(stage).status;

    if current == StageStatus::Succeeded && status == StageStatus::Pending {
        debug!(version_id = %id, stage = %stage, "ignoring regression of succeeded stage");
        return Ok(version);
    }

    let record = version.stage_mut(stage);
    record.status = status;
    match status {
        StageStatus::Succeeded => {
            record.at = Some(now);
            record.by = actor.map(str::to_string);
            record.error = None;
        }
        StageStatus::Failed => {
            record.at = Some(now);
            record.by = actor.map(str::to_string);
            record.error = error.map(str::to_string);
        }
        StageStatus::Pending => {
            record.error = None;
        }
    }
    version.updated_at = now;

    if stage == LifecycleStage::Commit
        && status == StageStatus::Succeeded
        && version.activation != Activation::Active
    {
        if let Some(previous) = current_active(txn, &version.name, &version.channel)? {
            if previous.id != version.id {
                set_activation(txn, previous, Activation::Superseded, now)?;
            }
        }
        version.activation = Activation::Active;
    }

    txn.put(VERSIONS, &version.id.to_string(), &version)?;
    info!(
        version_id = %id,
        stage = %stage,
        from = %current,
        to = %status,
        "stage status updated"
    );
    Ok(version)
}

pub(crate) fn load<R: TableRead>(txn: &R, id: VersionId) -> PipelineResult<ChaincodeVersion> {
    txn.get(VERSIONS, &id.to_string())?
        .ok_or_else(|| PipelineError::not_found("chaincode version", id))
}

/// Non-retired versions of one chaincode on one channel.
pub(crate) fn versions_of<R: TableRead>(
    txn: &R,
    name: &str,
    channel: &str,
) -> PipelineResult<Vec<ChaincodeVersion>> {
    let mut versions: Vec<ChaincodeVersion> = txn.scan(VERSIONS)?;
    versions.retain(|v| v.belongs_to(name, channel) && !v.is_retired());
    Ok(versions)
}

/// The version explicitly marked active, if any.
fn current_active<R: TableRead>(
    txn: &R,
    name: &str,
    channel: &str,
) -> PipelineResult<Option<ChaincodeVersion>> {
    Ok(versions_of(txn, name, channel)?
        .into_iter()
        .find(|v| v.activation == Activation::Active))
}

/// The active version, or the highest committed sequence when none is marked.
pub(crate) fn active<R: TableRead>(
    txn: &R,
    name: &str,
    channel: &str,
) -> PipelineResult<Option<ChaincodeVersion>> {
    if let Some(version) = current_active(txn, name, channel)? {
        return Ok(Some(version));
    }
    Ok(versions_of(txn, name, channel)?
        .into_iter()
        .filter(|v| v.is_committed() && v.activation != Activation::RolledBack)
        .max_by_key(|v| v.sequence))
}

pub(crate) fn previous_committed<R: TableRead>(
    txn: &R,
    name: &str,
    channel: &str,
    current_sequence: u64,
) -> PipelineResult<Option<ChaincodeVersion>> {
    Ok(versions_of(txn, name, channel)?
        .into_iter()
        .filter(|v| v.is_committed() && v.sequence < current_sequence)
        .max_by_key(|v| v.sequence))
}

pub(crate) fn set_activation(
    txn: &WriteTxn,
    mut version: ChaincodeVersion,
    activation: Activation,
    now: u64,
) -> PipelineResult<ChaincodeVersion> {
    let from = version.activation;
    version.activation = activation;
    version.updated_at = now;
    txn.put(VERSIONS, &version.id.to_string(), &version)?;
    debug!(version_id = %version.id, %from, to = %activation, "activation changed");
    Ok(version)
}

fn latest_order(a: &ChaincodeVersion, b: &ChaincodeVersion) -> Ordering {
    SemVer::parse(&a.version)
        .cmp(&SemVer::parse(&b.version))
        .then_with(|| commit_time(a).cmp(&commit_time(b)))
        .then(a.sequence.cmp(&b.sequence))
}

fn commit_time(version: &ChaincodeVersion) -> Option<u64> {
    version.is_committed().then_some(version.commit.at).flatten()
}
