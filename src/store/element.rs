//! Append-only element table with version, member and changeset indexes.
//!
//! Rows are immutable once written except for `next_sequence_id`, which is
//! set exactly once when a later version supersedes the row. "Current at
//! snapshot S" means the row's sequence is `<= S` and its successor is
//! absent or `> S`; because sequences only grow, reads at a fixed S are
//! repeatable without holding locks across calls.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{MapError, Result};
use crate::model::{
    AnyElementRef, ChangesetId, Element, ElementRef, ElementType, Point, Rect, SequenceId, TypedId,
    VersionedElementRef,
};

/// Sort order for changeset element listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangesetOrder {
    ById,
    BySequence,
}

#[derive(Default)]
pub(crate) struct ElementTable {
    /// `rows[i].sequence_id == i + 1`.
    rows: Vec<Element>,
    /// Row indexes per element, ascending by version.
    versions: FxHashMap<TypedId, Vec<u32>>,
    /// Row indexes of every row that lists the key as a member.
    member_rows: FxHashMap<TypedId, Vec<u32>>,
    by_changeset: FxHashMap<ChangesetId, Vec<u32>>,
    /// Points of current visible nodes, for geometry scans.
    current_node_points: FxHashMap<TypedId, Point>,
    /// Per-type log of `(sequence, new max id)`, for snapshot max-id reads.
    max_id_log: [Vec<(SequenceId, i64)>; 3],
}

fn current_at(row: &Element, at: Option<SequenceId>) -> bool {
    match at {
        None => row.next_sequence_id.is_none(),
        Some(s) => {
            row.sequence_id <= s && row.next_sequence_id.map_or(true, |next| next > s)
        }
    }
}

impl ElementTable {
    pub fn current_sequence_id(&self) -> SequenceId {
        self.rows.len() as SequenceId
    }

    pub fn find_latest(&self) -> Option<&Element> {
        self.rows.last()
    }

    /// Largest assigned id for the type; 0 when none exist.
    pub fn max_id(&self, kind: ElementType, at: Option<SequenceId>) -> i64 {
        let log = &self.max_id_log[kind.index()];
        match at {
            None => log.last().map_or(0, |&(_, id)| id),
            Some(s) => {
                let idx = log.partition_point(|&(seq, _)| seq <= s);
                if idx == 0 {
                    0
                } else {
                    log[idx - 1].1
                }
            }
        }
    }

    fn current_row(&self, reff: ElementRef, at: Option<SequenceId>) -> Option<&Element> {
        let tid = TypedId::pack(reff)?;
        let idxs = self.versions.get(&tid)?;
        // versions ascend in both version and sequence; the newest row with
        // sequence <= S is the current one at S
        idxs.iter()
            .rev()
            .map(|&i| &self.rows[i as usize])
            .find(|row| match at {
                None => true,
                Some(s) => row.sequence_id <= s,
            })
    }

    /// Current version number of the element; 0 if it never existed at
    /// the snapshot.
    pub fn current_version(&self, reff: ElementRef, at: Option<SequenceId>) -> u64 {
        self.current_row(reff, at).map_or(0, |row| row.version)
    }

    /// Version history of one element, optionally bounded and limited.
    pub fn get_versions(
        &self,
        reff: ElementRef,
        at: Option<SequenceId>,
        version_range: Option<(u64, u64)>,
        ascending: bool,
        limit: Option<usize>,
    ) -> Vec<Element> {
        let Some(tid) = TypedId::pack(reff) else {
            return Vec::new();
        };
        let Some(idxs) = self.versions.get(&tid) else {
            return Vec::new();
        };
        let filtered = idxs.iter().map(|&i| &self.rows[i as usize]).filter(|row| {
            at.map_or(true, |s| row.sequence_id <= s)
                && version_range.map_or(true, |(lo, hi)| row.version >= lo && row.version <= hi)
        });
        let mut out: Vec<Element> = filtered.cloned().collect();
        if !ascending {
            out.reverse();
        }
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        out
    }

    /// Exact version rows, ordered ascending by `(type, id, version)`.
    pub fn get_versioned(
        &self,
        refs: &[VersionedElementRef],
        at: Option<SequenceId>,
        limit: Option<usize>,
    ) -> Vec<Element> {
        let mut out: Vec<Element> = refs
            .iter()
            .filter_map(|vref| {
                let tid = TypedId::pack(vref.unversioned())?;
                let idxs = self.versions.get(&tid)?;
                let version = vref.version;
                if version == 0 {
                    return None;
                }
                // versions are contiguous from 1
                let row = idxs
                    .get(version as usize - 1)
                    .map(|&i| &self.rows[i as usize])?;
                if at.map_or(true, |s| row.sequence_id <= s) {
                    Some(row.clone())
                } else {
                    None
                }
            })
            .collect();
        out.sort_by_key(|e| (e.reff.kind, e.reff.id, e.version));
        out.dedup_by_key(|e| e.sequence_id);
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        out
    }

    /// Current rows for the given refs; optionally follows way members one
    /// level to their current nodes.
    pub fn get_current(
        &self,
        refs: &[ElementRef],
        at: Option<SequenceId>,
        recurse_ways: bool,
        limit: Option<usize>,
    ) -> Vec<Element> {
        let requested: FxHashSet<ElementRef> = refs.iter().copied().collect();
        let mut out: Vec<Element> = Vec::new();
        let mut seen: FxHashSet<SequenceId> = FxHashSet::default();
        for &reff in refs {
            if let Some(row) = self.current_row(reff, at).filter(|r| current_at(r, at)) {
                if seen.insert(row.sequence_id) {
                    out.push(row.clone());
                }
            }
        }
        if recurse_ways {
            let node_refs: Vec<ElementRef> = out
                .iter()
                .filter(|e| e.reff.kind == ElementType::Way)
                .flat_map(|way| way.members.iter().map(|m| m.reff))
                .filter(|r| !requested.contains(r))
                .collect();
            for reff in node_refs {
                if let Some(row) = self.current_row(reff, at).filter(|r| current_at(r, at)) {
                    if seen.insert(row.sequence_id) {
                        out.push(row.clone());
                    }
                }
            }
        }
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        out
    }

    /// Mixed versioned/unversioned lookup aligned to the input order.
    ///
    /// Duplicates are re-resolved; callers de-duplicate by sequence id.
    pub fn get_by_mixed(
        &self,
        refs: &[AnyElementRef],
        at: Option<SequenceId>,
        limit: Option<usize>,
    ) -> Vec<Option<Element>> {
        let mut out: Vec<Option<Element>> = Vec::with_capacity(refs.len());
        let mut resolved = 0usize;
        for reff in refs {
            if limit.map_or(false, |l| resolved >= l) {
                out.push(None);
                continue;
            }
            let hit = match reff {
                AnyElementRef::Current(r) => self
                    .current_row(*r, at)
                    .filter(|row| current_at(row, at))
                    .cloned(),
                AnyElementRef::Versioned(v) => self
                    .get_versioned(std::slice::from_ref(v), at, Some(1))
                    .into_iter()
                    .next(),
            };
            if hit.is_some() {
                resolved += 1;
            }
            out.push(hit);
        }
        out
    }

    /// Current rows that currently reference any of the member refs.
    pub fn get_parents(
        &self,
        member_refs: &[ElementRef],
        at: Option<SequenceId>,
        parent_type: Option<ElementType>,
        limit: Option<usize>,
    ) -> Vec<Element> {
        // ways and relations can only be members of relations
        let only_ways_relations = member_refs
            .iter()
            .all(|r| r.kind != ElementType::Node);
        let parent_type = match parent_type {
            Some(t) => Some(t),
            None if only_ways_relations => Some(ElementType::Relation),
            None => None,
        };

        let mut out: Vec<Element> = Vec::new();
        let mut seen: FxHashSet<SequenceId> = FxHashSet::default();
        for &reff in member_refs {
            let Some(tid) = TypedId::pack(reff) else {
                continue;
            };
            let Some(idxs) = self.member_rows.get(&tid) else {
                continue;
            };
            for &i in idxs {
                let row = &self.rows[i as usize];
                if !current_at(row, at) {
                    continue;
                }
                if parent_type.map_or(false, |t| row.reff.kind != t) {
                    continue;
                }
                if seen.insert(row.sequence_id) {
                    out.push(row.clone());
                    if limit.map_or(false, |l| out.len() >= l) {
                        return out;
                    }
                }
            }
        }
        out
    }

    /// Whether any row written after `after` lists one of the refs as a
    /// member. Used by the applier's post-snapshot reference re-check.
    pub fn any_parent_after(&self, member_refs: &[ElementRef], after: SequenceId) -> bool {
        member_refs.iter().any(|&reff| {
            TypedId::pack(reff)
                .and_then(|tid| self.member_rows.get(&tid))
                // entries are appended in sequence order
                .and_then(|idxs| idxs.last())
                .map_or(false, |&i| self.rows[i as usize].sequence_id > after)
        })
    }

    pub fn get_by_changeset(&self, changeset_id: ChangesetId, order: ChangesetOrder) -> Vec<Element> {
        let Some(idxs) = self.by_changeset.get(&changeset_id) else {
            return Vec::new();
        };
        let mut out: Vec<Element> = idxs.iter().map(|&i| self.rows[i as usize].clone()).collect();
        match order {
            ChangesetOrder::ById => out.sort_by_key(|e| (e.reff.kind, e.reff.id, e.version)),
            ChangesetOrder::BySequence => out.sort_by_key(|e| e.sequence_id),
        }
        out
    }

    /// Current visible nodes whose point falls inside the rectangle,
    /// ordered by id for determinism.
    pub fn nodes_in_rect(&self, rect: &Rect, limit: Option<usize>) -> Vec<Element> {
        let mut hits: Vec<TypedId> = self
            .current_node_points
            .iter()
            .filter(|(_, &p)| rect.contains(p))
            .map(|(&tid, _)| tid)
            .collect();
        hits.sort_unstable();
        if let Some(limit) = limit {
            hits.truncate(limit);
        }
        hits.into_iter()
            .filter_map(|tid| {
                self.current_row(tid.unpack(), None)
                    .filter(|row| row.visible)
                    .cloned()
            })
            .collect()
    }

    /// Appends one element row, assigning its sequence id and superseding
    /// the previous current version.
    pub fn insert(&mut self, mut element: Element) -> Result<SequenceId> {
        let tid = TypedId::pack(element.reff)
            .ok_or(MapError::Internal("cannot store a placeholder element"))?;
        let seq = self.rows.len() as SequenceId + 1;
        element.sequence_id = seq;
        element.next_sequence_id = None;
        let row_idx = self.rows.len() as u32;

        let idxs = self.versions.entry(tid).or_default();
        if let Some(&prev_idx) = idxs.last() {
            let prev = &mut self.rows[prev_idx as usize];
            if prev.version + 1 != element.version {
                return Err(MapError::Internal("non-contiguous element version write"));
            }
            prev.next_sequence_id = Some(seq);
        } else if element.version != 1 {
            return Err(MapError::Internal("first element version must be 1"));
        }
        idxs.push(row_idx);

        for member in &element.members {
            let member_tid = TypedId::pack(member.reff)
                .ok_or(MapError::Internal("cannot store a placeholder member"))?;
            self.member_rows.entry(member_tid).or_default().push(row_idx);
        }
        self.by_changeset
            .entry(element.changeset_id)
            .or_default()
            .push(row_idx);

        let log = &mut self.max_id_log[element.reff.kind.index()];
        if log.last().map_or(true, |&(_, id)| element.reff.id > id) {
            log.push((seq, element.reff.id));
        }

        match (element.visible, element.point) {
            (true, Some(point)) => {
                self.current_node_points.insert(tid, point);
            }
            _ => {
                self.current_node_points.remove(&tid);
            }
        }

        self.rows.push(element);
        Ok(seq)
    }
}
