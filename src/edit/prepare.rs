//! Diff preparation: validates one batched change against a consistent
//! snapshot and builds everything the applier needs.
//!
//! Preparation is lock-free and idempotent; all re-checks that guard
//! against concurrent writers happen in the applier.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{error, warn};

use crate::error::{MapError, Result};
use crate::model::{
    Actor, Changeset, Element, ElementRef, ElementType, Member, OpKind, Point, SequenceId,
    Timestamp,
};
use crate::store::{change_bounds, MapDb};

use super::snapshot::LocalSnapshot;
use super::Action;

/// One diff-result row scheduled during preparation.
pub(crate) enum PendingEntry {
    /// A new element row will be written; `element_idx` points into
    /// [`Prepared::elements`].
    Applied {
        kind: ElementType,
        old_id: i64,
        element_idx: usize,
    },
    /// An `if-unused` delete that was dropped; the element keeps its
    /// pre-existing version.
    Kept {
        kind: ElementType,
        id: i64,
        version: u64,
    },
}

/// Output of a successful preparation, consumed by the applier.
pub(crate) struct Prepared {
    /// Snapshot the validation ran against.
    pub at: SequenceId,
    /// Elements to write, in submission order, with real ids assigned and
    /// members remapped.
    pub elements: Vec<Element>,
    pub entries: Vec<PendingEntry>,
    /// Local changeset copy with counters and bounds already advanced.
    pub changeset: Changeset,
    /// `updated_at` observed when the changeset was loaded; the applier
    /// aborts if the stored value has moved.
    pub observed_updated_at: Timestamp,
    /// Store versions observed per ref, re-verified at apply time.
    pub base_versions: Vec<(ElementRef, u64)>,
    /// For each deletion, the sequence floor above which no new parent may
    /// have appeared.
    pub reference_checks: Vec<(ElementRef, SequenceId)>,
    /// Per type: first assigned id and count, re-verified free at apply.
    pub assigned_ranges: Vec<(ElementType, i64, u64)>,
}

type ReferenceOverride = FxHashMap<(ElementRef, bool), FxHashSet<ElementRef>>;

/// Applies the reference delta of one element transition to the override
/// map. `(ref, true)` collects refs that locally added a reference to
/// `ref`; `(ref, false)` collects refs that locally removed one.
fn apply_reference_override(
    overrides: &mut ReferenceOverride,
    reff: ElementRef,
    prev_refs: &FxHashSet<ElementRef>,
    next_refs: &FxHashSet<ElementRef>,
) {
    for &removed in prev_refs.difference(next_refs) {
        overrides.entry((removed, true)).or_default().remove(&reff);
        overrides.entry((removed, false)).or_default().insert(reff);
    }
    for &added in next_refs.difference(prev_refs) {
        overrides.entry((added, true)).or_default().insert(reff);
        overrides.entry((added, false)).or_default().remove(&reff);
    }
}

pub(crate) fn prepare(db: &MapDb, actor: &Actor, actions: &[Action]) -> Result<Prepared> {
    let limits = db.limits();
    let at = db.current_sequence_id();
    let now = db.clock.now();

    // clock regression guard
    if let Some(latest) = db.find_latest_element() {
        if latest.created_at.map_or(false, |t| t > now) {
            error!(
                "element {} was created in the future: {:?} > {}",
                latest.reff, latest.created_at, now
            );
            return Err(MapError::TimeIntegrity);
        }
    }

    // changeset validation: a diff addresses exactly one changeset, owned
    // by the caller and still open, with room for the whole batch
    let changeset_id = actions
        .first()
        .map(|a| a.element.changeset_id)
        .ok_or(MapError::Internal("empty diff reached prepare"))?;
    if actions.iter().any(|a| a.element.changeset_id == 0) {
        return Err(MapError::ChangesetMissing);
    }
    if actions.iter().any(|a| a.element.changeset_id != changeset_id) {
        return Err(MapError::DiffMultipleChangesets);
    }
    let changeset = db
        .changesets
        .read()
        .get(changeset_id)
        .cloned()
        .ok_or(MapError::ChangesetNotFound(changeset_id))?;
    if changeset.user_id != actor.user_id {
        return Err(MapError::ChangesetAccessDenied);
    }
    if let Some(closed_at) = changeset.closed_at {
        return Err(MapError::ChangesetAlreadyClosed {
            id: changeset_id,
            closed_at,
        });
    }
    let cap = limits.changeset_cap(actor.is_moderator());
    if !changeset.fits_size(actions.len() as u64, cap) {
        return Err(MapError::ChangesetTooBig(
            changeset.size + actions.len() as u64,
        ));
    }
    let observed_updated_at = changeset.updated_at;

    // preload the elements addressed by the diff
    let mut snapshot = LocalSnapshot::new(db, at);
    let existing: FxHashSet<ElementRef> = actions
        .iter()
        .map(|a| a.element.reff)
        .filter(|r| r.id > 0)
        .collect();
    snapshot.preload(&existing)?;

    let mut overrides = ReferenceOverride::default();
    let mut reference_checks: FxHashMap<ElementRef, SequenceId> = FxHashMap::default();
    let mut bbox_points: Vec<Point> = Vec::new();
    let mut bbox_refs: FxHashSet<ElementRef> = FxHashSet::default();
    let mut out_elements: Vec<Element> = Vec::new();
    let mut entries: Vec<PendingEntry> = Vec::new();
    let (mut num_create, mut num_modify, mut num_delete) = (0u64, 0u64, 0u64);

    for action in actions {
        let element = action.element.clone();
        element.validate(limits)?;

        let prev = if element.version == 1 {
            // action: create
            if element.reff.id >= 0 {
                return Err(MapError::DiffCreateBadId(element.versioned_ref()));
            }
            if let Some(known) = snapshot.peek(element.reff) {
                return Err(MapError::VersionConflict {
                    reff: element.reff,
                    provided: 1,
                    current: known.version,
                });
            }
            None
        } else {
            // action: modify | delete
            let prev = snapshot.latest(element.reff)?;
            if prev.version + 1 != element.version {
                return Err(MapError::VersionConflict {
                    reff: element.reff,
                    provided: element.version,
                    current: prev.version,
                });
            }
            if !prev.visible && !element.visible {
                return Err(MapError::AlreadyDeleted(element.versioned_ref()));
            }
            if prev.created_at.map_or(false, |t| t > now) {
                error!(
                    "element {} was created in the future: {:?} > {}",
                    prev.reff, prev.created_at, now
                );
                return Err(MapError::TimeIntegrity);
            }
            Some(prev)
        };

        // update reference overrides before performing checks; elements
        // may reference their own new version
        let prev_refs = prev
            .as_ref()
            .map(Element::member_ref_set)
            .unwrap_or_default();
        let next_refs = element.member_ref_set();
        apply_reference_override(&mut overrides, element.reff, &prev_refs, &next_refs);

        // every member must resolve to a visible latest version
        for &member_ref in &next_refs {
            if member_ref == element.reff {
                continue;
            }
            let visible = snapshot
                .latest(member_ref)
                .map(|m| m.visible)
                .unwrap_or(false);
            if !visible {
                return Err(MapError::MemberNotFound {
                    parent: element.versioned_ref(),
                    member: member_ref,
                });
            }
        }

        // a delete must leave no references behind, locally or remotely
        if !element.visible && prev.as_ref().map_or(false, |p| p.visible) {
            let mut discard = false;
            let local_positive = overrides
                .get(&(element.reff, true))
                .filter(|refs| !refs.is_empty());
            if let Some(refs) = local_positive {
                if action.if_unused {
                    discard = true;
                } else {
                    let mut used_by: Vec<ElementRef> = refs.iter().copied().collect();
                    used_by.sort_unstable();
                    return Err(MapError::ElementInUse {
                        reff: element.versioned_ref(),
                        used_by,
                    });
                }
            }
            if !discard && element.reff.id > 0 {
                let negative = overrides
                    .get(&(element.reff, false))
                    .cloned()
                    .unwrap_or_default();
                let parents = db.get_parents(
                    std::slice::from_ref(&element.reff),
                    None,
                    None,
                    Some(negative.len() + 1),
                );
                let mut remote: Vec<ElementRef> = parents
                    .iter()
                    .map(|p| p.reff)
                    .filter(|r| !negative.contains(r))
                    .collect();
                if !remote.is_empty() {
                    if action.if_unused {
                        discard = true;
                    } else {
                        remote.sort_unstable();
                        return Err(MapError::ElementInUse {
                            reff: element.versioned_ref(),
                            used_by: remote,
                        });
                    }
                } else {
                    let floor = parents
                        .iter()
                        .map(|p| p.sequence_id)
                        .fold(at, SequenceId::max);
                    reference_checks.entry(element.reff).or_insert(floor);
                }
            }
            if discard {
                // roll the override delta back; the element stays visible
                apply_reference_override(&mut overrides, element.reff, &next_refs, &prev_refs);
                let prev = prev.ok_or(MapError::Internal("discarded delete without prev"))?;
                entries.push(PendingEntry::Kept {
                    kind: element.reff.kind,
                    id: element.reff.id,
                    version: prev.version,
                });
                continue;
            }
        }

        push_bbox_info(&snapshot, prev.as_ref(), &element, &mut bbox_points, &mut bbox_refs);

        match element.op_kind() {
            OpKind::Create => num_create += 1,
            OpKind::Modify => num_modify += 1,
            OpKind::Delete => num_delete += 1,
        }
        entries.push(PendingEntry::Applied {
            kind: element.reff.kind,
            old_id: element.reff.id,
            element_idx: out_elements.len(),
        });
        snapshot.push(element.clone());
        out_elements.push(element);
    }

    // resolve deferred bbox refs in one batch, recursing ways to nodes
    let deferred: Vec<ElementRef> = bbox_refs.into_iter().filter(|r| r.id > 0).collect();
    if !deferred.is_empty() {
        for element in db.get_current(&deferred, Some(at), true, None) {
            if let Some(point) = element.point {
                bbox_points.push(point);
            } else if element.reff.kind == ElementType::Node {
                warn!("node {} has no point", element.reff);
            }
        }
    }

    // advance the local changeset copy
    let mut changeset = changeset;
    if !changeset.increase_size(num_create, num_modify, num_delete, cap) {
        return Err(MapError::ChangesetTooBig(
            changeset.size + num_create + num_modify + num_delete,
        ));
    }
    if !bbox_points.is_empty() {
        changeset.bounds = change_bounds(&changeset.bounds, &bbox_points, limits);
    }

    // assign placeholder ids in first-seen order per type, then remap members
    let mut next_ids: [Option<i64>; 3] = [None; 3];
    let mut first_ids: [Option<i64>; 3] = [None; 3];
    let mut assigned: FxHashMap<ElementRef, i64> = FxHashMap::default();
    for element in &mut out_elements {
        if element.reff.id >= 0 {
            continue;
        }
        let old = element.reff;
        let new_id = match assigned.get(&old) {
            Some(&id) => id,
            None => {
                let slot = old.kind.index();
                let next = next_ids[slot]
                    .get_or_insert_with(|| db.max_element_id(old.kind, Some(at)) + 1);
                first_ids[slot].get_or_insert(*next);
                let id = *next;
                *next += 1;
                assigned.insert(old, id);
                id
            }
        };
        element.reff.id = new_id;
    }
    for element in &mut out_elements {
        for member in &mut element.members {
            if member.reff.id < 0 {
                member.reff.id = *assigned
                    .get(&member.reff)
                    .ok_or(MapError::Internal("unresolved placeholder member"))?;
            }
        }
    }
    let assigned_ranges: Vec<(ElementType, i64, u64)> = ElementType::ALL
        .iter()
        .filter_map(|&kind| {
            let slot = kind.index();
            match (first_ids[slot], next_ids[slot]) {
                (Some(first), Some(next)) => Some((kind, first, (next - first) as u64)),
                _ => None,
            }
        })
        .collect();

    Ok(Prepared {
        at,
        elements: out_elements,
        entries,
        changeset,
        observed_updated_at,
        base_versions: snapshot
            .base_versions()
            .iter()
            .map(|(&reff, &version)| (reff, version))
            .collect(),
        reference_checks: reference_checks.into_iter().collect(),
        assigned_ranges,
    })
}

/// Collects the geometry-change contributions of one action.
///
/// Nodes contribute their old and new point; ways contribute all member
/// nodes of the previous and next version; relations contribute either the
/// full membership (tags changed, or a relation-typed member changed) or
/// only the symmetric difference. Refs without a locally-known point are
/// deferred for one batched resolution at the end of preparation.
fn push_bbox_info(
    snapshot: &LocalSnapshot<'_>,
    prev: Option<&Element>,
    element: &Element,
    points: &mut Vec<Point>,
    refs: &mut FxHashSet<ElementRef>,
) {
    let mut contribute = |reff: ElementRef| {
        if let Some(local) = snapshot.peek(reff) {
            if let Some(point) = local.point {
                points.push(point);
            }
        } else {
            refs.insert(reff);
        }
    };

    match element.reff.kind {
        ElementType::Node => {
            if let Some(point) = element.point {
                points.push(point);
            }
            if let Some(point) = prev.and_then(|p| p.point) {
                points.push(point);
            }
        }
        ElementType::Way => {
            let prev_refs = prev.map(Element::member_ref_set).unwrap_or_default();
            let next_refs = element.member_ref_set();
            for &reff in prev_refs.union(&next_refs) {
                contribute(reff);
            }
        }
        ElementType::Relation => {
            let prev_members: FxHashSet<&Member> =
                prev.map(|p| p.members.iter().collect()).unwrap_or_default();
            let next_members: FxHashSet<&Member> = element.members.iter().collect();
            let changed: Vec<&Member> = prev_members
                .symmetric_difference(&next_members)
                .copied()
                .collect();
            let contains_relation = changed
                .iter()
                .any(|m| m.reff.kind == ElementType::Relation);
            let tags_changed = prev.map_or(true, |p| p.tags != element.tags);

            let diff_refs: FxHashSet<ElementRef> = if tags_changed || contains_relation {
                prev_members
                    .union(&next_members)
                    .map(|m| m.reff)
                    .collect()
            } else {
                changed.iter().map(|m| m.reff).collect()
            };
            for reff in diff_refs {
                if reff.kind == ElementType::Relation {
                    continue;
                }
                contribute(reff);
            }
        }
    }
}
