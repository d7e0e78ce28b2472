//! Version catalog: tags, declared dependencies, release notes, and memoized
//! comparisons between recorded versions.

use ccgov_core::version::compare;
use ccgov_core::{ComparisonKind, SharedClock};
use ccgov_state::tables::{
    VERSION_COMPARISONS, VERSION_DEPENDENCIES, VERSION_RELEASE_NOTES, VERSION_TAGS,
};
use ccgov_state::{
    ChaincodeVersion, DependencyKind, ReleaseType, StateStore, TableRead, TagKind,
    VersionComparison, VersionDependency, VersionId, VersionReleaseNote, VersionTag,
    comparison_key,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult, require_non_empty};
use crate::registry;

const NOTE_COUNTER: &str = "version_release_notes";

/// Direction of a move between two version strings.
pub fn compare_versions(from: &str, to: &str) -> ComparisonKind {
    ComparisonKind::classify(compare(from, to))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseNoteSpec {
    pub title: String,
    pub content: String,
    pub release_type: ReleaseType,
    pub breaking_changes: Vec<String>,
    pub new_features: Vec<String>,
    pub bug_fixes: Vec<String>,
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VersionCatalog {
    store: StateStore,
    clock: SharedClock,
}

impl VersionCatalog {
    pub fn new(store: StateStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    // ── Tags ───────────────────────────────────────────────────────

    /// Attach a tag to a version. An active tag name is unique per version.
    pub fn create_tag(
        &self,
        version_id: VersionId,
        name: &str,
        kind: TagKind,
        description: Option<&str>,
        actor: Option<&str>,
    ) -> PipelineResult<VersionTag> {
        require_non_empty("tag name", name)?;
        let now = self.clock.now_ms();
        let tag = self.store.write(|txn| {
            registry::load(txn, version_id)?;
            let key = format!("{version_id}:{name}");
            let existing: Option<VersionTag> = txn.get(VERSION_TAGS, &key)?;
            if existing.is_some_and(|t| t.active) {
                return Err(PipelineError::Conflict(format!(
                    "tag {name} already exists on version {version_id}"
                )));
            }
            let tag = VersionTag {
                id: Uuid::new_v4(),
                version_id,
                name: name.to_string(),
                kind,
                description: description.map(str::to_string),
                active: true,
                created_by: actor.map(str::to_string),
                created_at: now,
            };
            txn.put(VERSION_TAGS, &tag.table_key(), &tag)?;
            Ok(tag)
        })?;
        info!(version_id = %version_id, tag = %tag.name, kind = %tag.kind, "version tagged");
        Ok(tag)
    }

    pub fn deactivate_tag(&self, version_id: VersionId, name: &str) -> PipelineResult<VersionTag> {
        self.store.write(|txn| {
            let key = format!("{version_id}:{name}");
            let mut tag: VersionTag = txn
                .get(VERSION_TAGS, &key)?
                .ok_or_else(|| PipelineError::not_found("tag", &key))?;
            tag.active = false;
            txn.put(VERSION_TAGS, &key, &tag)?;
            Ok(tag)
        })
    }

    pub fn tags(&self, version_id: VersionId) -> PipelineResult<Vec<VersionTag>> {
        Ok(self
            .store
            .read(|txn| txn.scan_prefix(VERSION_TAGS, &format!("{version_id}:")))?)
    }

    /// Most recently tagged non-retired version of a chaincode carrying `tag`.
    pub fn find_version_by_tag(
        &self,
        name: &str,
        channel: &str,
        tag: &str,
    ) -> PipelineResult<Option<ChaincodeVersion>> {
        self.store.read(|txn| {
            let tags: Vec<VersionTag> = txn.scan(VERSION_TAGS)?;
            let mut best: Option<(u64, ChaincodeVersion)> = None;
            for t in tags.into_iter().filter(|t| t.active && t.name == tag) {
                let version = registry::load(txn, t.version_id)?;
                if !version.belongs_to(name, channel) || version.is_retired() {
                    continue;
                }
                if best.as_ref().is_none_or(|(at, _)| t.created_at > *at) {
                    best = Some((t.created_at, version));
                }
            }
            Ok(best.map(|(_, v)| v))
        })
    }

    // ── Dependencies ───────────────────────────────────────────────

    pub fn add_dependency(
        &self,
        version_id: VersionId,
        name: &str,
        version: &str,
        kind: DependencyKind,
        required: bool,
    ) -> PipelineResult<VersionDependency> {
        require_non_empty("dependency name", name)?;
        require_non_empty("dependency version", version)?;
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            registry::load(txn, version_id)?;
            let dep = VersionDependency {
                id: Uuid::new_v4(),
                version_id,
                name: name.to_string(),
                version: version.to_string(),
                kind,
                required,
                created_at: now,
            };
            txn.put(VERSION_DEPENDENCIES, &dep.table_key(), &dep)?;
            debug!(version_id = %version_id, dependency = %dep.name, "dependency declared");
            Ok(dep)
        })
    }

    pub fn dependencies(&self, version_id: VersionId) -> PipelineResult<Vec<VersionDependency>> {
        let mut deps: Vec<VersionDependency> = self
            .store
            .read(|txn| txn.scan_prefix(VERSION_DEPENDENCIES, &format!("{version_id}:")))?;
        deps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(deps)
    }

    // ── Release notes ──────────────────────────────────────────────

    pub fn add_release_note(
        &self,
        version_id: VersionId,
        spec: &ReleaseNoteSpec,
        actor: Option<&str>,
    ) -> PipelineResult<VersionReleaseNote> {
        require_non_empty("title", &spec.title)?;
        require_non_empty("content", &spec.content)?;
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            registry::load(txn, version_id)?;
            let note = VersionReleaseNote {
                id: Uuid::new_v4(),
                version_id,
                title: spec.title.clone(),
                content: spec.content.clone(),
                release_type: spec.release_type,
                breaking_changes: spec.breaking_changes.clone(),
                new_features: spec.new_features.clone(),
                bug_fixes: spec.bug_fixes.clone(),
                improvements: spec.improvements.clone(),
                created_by: actor.map(str::to_string),
                created_at: now,
                ordinal: txn.next_ordinal(NOTE_COUNTER)?,
            };
            txn.put(VERSION_RELEASE_NOTES, &note.table_key(), &note)?;
            Ok(note)
        })
    }

    /// Latest release note of a version.
    pub fn release_note(&self, version_id: VersionId) -> PipelineResult<Option<VersionReleaseNote>> {
        self.store.read(|txn| latest_note(txn, version_id))
    }

    // ── Comparisons ────────────────────────────────────────────────

    /// Compare two recorded versions, reusing a stored result when present.
    pub fn compare_version_ids(
        &self,
        from: VersionId,
        to: VersionId,
    ) -> PipelineResult<VersionComparison> {
        let now = self.clock.now_ms();
        self.store.write(|txn| {
            let key = comparison_key(from, to);
            if let Some(stored) = txn.get::<VersionComparison>(VERSION_COMPARISONS, &key)? {
                return Ok(stored);
            }

            let from_version = registry::load(txn, from)?;
            let to_version = registry::load(txn, to)?;
            let kind = compare_versions(&from_version.version, &to_version.version);
            let note = latest_note(txn, to)?;
            let count = |f: fn(&VersionReleaseNote) -> usize| note.as_ref().map_or(0, f) as u32;

            let comparison = VersionComparison {
                id: Uuid::new_v4(),
                from_version_id: from,
                to_version_id: to,
                kind,
                summary: format!(
                    "{} -> {}: {kind}",
                    from_version.version, to_version.version
                ),
                breaking_changes: count(|n| n.breaking_changes.len()),
                new_features: count(|n| n.new_features.len()),
                bug_fixes: count(|n| n.bug_fixes.len()),
                created_at: now,
            };
            txn.put(VERSION_COMPARISONS, &key, &comparison)?;
            debug!(from = %from, to = %to, %kind, "version comparison stored");
            Ok::<_, PipelineError>(comparison)
        })
    }
}

fn latest_note<R: TableRead>(
    txn: &R,
    version_id: VersionId,
) -> PipelineResult<Option<VersionReleaseNote>> {
    let notes: Vec<VersionReleaseNote> =
        txn.scan_prefix(VERSION_RELEASE_NOTES, &format!("{version_id}:"))?;
    Ok(notes.into_iter().last())
}
