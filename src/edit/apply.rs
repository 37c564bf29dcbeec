//! Diff application: re-verifies the prepared state under the advisory
//! write lock and commits the new rows.

use tracing::{debug, error};

use crate::error::{Conflict, MapError};
use crate::store::MapDb;

use super::prepare::{PendingEntry, Prepared};
use super::{DiffEntry, DiffResult};

/// Apply outcome split the orchestrator cares about: conflicts are
/// retried, fatal errors surface unchanged.
pub(crate) enum ApplyError {
    Conflict(Conflict),
    Fatal(MapError),
}

impl From<MapError> for ApplyError {
    fn from(e: MapError) -> Self {
        ApplyError::Fatal(e)
    }
}

pub(crate) fn apply(db: &MapDb, prepared: Prepared) -> Result<DiffResult, ApplyError> {
    let _write = db.apply_lock.lock();
    let now = db.clock.now();
    let mut elements = db.elements.write();
    let mut changesets = db.changesets.write();

    // clock regression guard, re-checked under the lock
    if let Some(latest) = elements.find_latest() {
        if latest.created_at.map_or(false, |t| t > now) {
            error!(
                "element {} was created in the future: {:?} > {}",
                latest.reff, latest.created_at, now
            );
            return Err(MapError::TimeIntegrity.into());
        }
    }

    // the observed versions must still be current
    for &(reff, expected) in &prepared.base_versions {
        let actual = elements.current_version(reff, None);
        if actual != expected {
            return Err(ApplyError::Conflict(Conflict::SnapshotDrift {
                reff,
                expected,
                actual,
            }));
        }
    }

    // no deleted element may have gained a parent since the snapshot
    for &(reff, floor) in &prepared.reference_checks {
        if elements.any_parent_after(std::slice::from_ref(&reff), floor) {
            return Err(ApplyError::Conflict(Conflict::PostSnapshotParent(reff)));
        }
    }

    // the changeset must not have moved under us
    let changeset_id = prepared.changeset.id;
    let remote = changesets
        .get(changeset_id)
        .ok_or(MapError::ChangesetNotFound(changeset_id))?;
    if remote.updated_at != prepared.observed_updated_at {
        return Err(ApplyError::Conflict(Conflict::UpdatedAtDrift(changeset_id)));
    }

    // the id ranges assigned during preparation must still be free
    for &(kind, first, count) in &prepared.assigned_ranges {
        if count > 0 && elements.max_id(kind, None) >= first {
            return Err(ApplyError::Conflict(Conflict::UniqueViolation(kind)));
        }
    }

    // commit: write rows in submission order, then the changeset
    let meta: Vec<(i64, u64)> = prepared
        .elements
        .iter()
        .map(|e| (e.reff.id, e.version))
        .collect();
    for mut element in prepared.elements {
        element.created_at = Some(now);
        elements.insert(element).map_err(ApplyError::Fatal)?;
    }

    let mut changeset = prepared.changeset;
    changeset.updated_at = now;
    if changeset.size_limit_reached && changeset.closed_at.is_none() {
        debug!("changeset {} reached its size cap, auto-closing", changeset.id);
        changeset.closed_at = Some(now);
    }
    changesets.put(changeset);

    let entries = prepared
        .entries
        .iter()
        .map(|entry| match *entry {
            PendingEntry::Applied {
                kind,
                old_id,
                element_idx,
            } => DiffEntry {
                kind,
                old_id,
                new_id: meta[element_idx].0,
                new_version: meta[element_idx].1,
            },
            PendingEntry::Kept { kind, id, version } => DiffEntry {
                kind,
                old_id: id,
                new_id: id,
                new_version: version,
            },
        })
        .collect();

    Ok(DiffResult { entries })
}
