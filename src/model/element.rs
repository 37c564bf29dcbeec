//! The versioned element row and its structural validation.

use rustc_hash::FxHashSet;

use crate::config::Limits;
use crate::error::{MapError, Result};
use crate::model::geometry::Point;
use crate::model::refs::{ElementRef, ElementType, VersionedElementRef};
use crate::model::tags::{validate_tags, TagMap};
use crate::model::{ChangesetId, SequenceId, Timestamp};

/// One entry of an element's ordered member list.
///
/// Way members carry an empty role; relation members may carry any role
/// up to the configured length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub reff: ElementRef,
    pub role: String,
}

impl Member {
    pub fn new(reff: ElementRef, role: impl Into<String>) -> Member {
        Member {
            reff,
            role: role.into(),
        }
    }

    pub fn node(id: i64) -> Member {
        Member::new(ElementRef::new(ElementType::Node, id), "")
    }
}

/// The per-element operation kind, derived from version and visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Create,
    Modify,
    Delete,
}

/// A single version of one map element.
///
/// Rows are append-only: a modify or delete writes a new row with
/// `version = prev.version + 1`. `sequence_id` is zero until the row is
/// committed; `next_sequence_id` marks supersession by a later version.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub sequence_id: SequenceId,
    pub changeset_id: ChangesetId,
    pub reff: ElementRef,
    pub version: u64,
    pub visible: bool,
    pub tags: TagMap,
    pub point: Option<Point>,
    pub members: Vec<Member>,
    pub created_at: Option<Timestamp>,
    pub next_sequence_id: Option<SequenceId>,
}

impl Element {
    fn bare(kind: ElementType, changeset_id: ChangesetId, id: i64, version: u64) -> Element {
        Element {
            sequence_id: 0,
            changeset_id,
            reff: ElementRef::new(kind, id),
            version,
            visible: true,
            tags: TagMap::new(),
            point: None,
            members: Vec::new(),
            created_at: None,
            next_sequence_id: None,
        }
    }

    pub fn node(
        changeset_id: ChangesetId,
        id: i64,
        version: u64,
        point: Point,
        tags: TagMap,
    ) -> Element {
        let mut e = Element::bare(ElementType::Node, changeset_id, id, version);
        e.point = Some(point);
        e.tags = tags;
        e
    }

    pub fn way(
        changeset_id: ChangesetId,
        id: i64,
        version: u64,
        node_ids: Vec<i64>,
        tags: TagMap,
    ) -> Element {
        let mut e = Element::bare(ElementType::Way, changeset_id, id, version);
        e.members = node_ids.into_iter().map(Member::node).collect();
        e.tags = tags;
        e
    }

    pub fn relation(
        changeset_id: ChangesetId,
        id: i64,
        version: u64,
        members: Vec<Member>,
        tags: TagMap,
    ) -> Element {
        let mut e = Element::bare(ElementType::Relation, changeset_id, id, version);
        e.members = members;
        e.tags = tags;
        e
    }

    /// A deletion row: hidden, with tags, geometry and members cleared.
    pub fn tombstone(
        kind: ElementType,
        changeset_id: ChangesetId,
        id: i64,
        version: u64,
    ) -> Element {
        let mut e = Element::bare(kind, changeset_id, id, version);
        e.visible = false;
        e
    }

    pub fn versioned_ref(&self) -> VersionedElementRef {
        self.reff.versioned(self.version)
    }

    pub fn op_kind(&self) -> OpKind {
        if self.version == 1 {
            OpKind::Create
        } else if self.visible {
            OpKind::Modify
        } else {
            OpKind::Delete
        }
    }

    /// The set of logical refs this element's members point at.
    pub fn member_ref_set(&self) -> FxHashSet<ElementRef> {
        self.members.iter().map(|m| m.reff).collect()
    }

    /// Structural validation of an element payload against the limits.
    ///
    /// Version semantics against the predecessor are the edit engine's
    /// concern; this checks only the shape of one row.
    pub fn validate(&self, limits: &Limits) -> Result<()> {
        let bad = |detail: &str| MapError::BadElement {
            reff: self.reff,
            detail: detail.to_owned(),
        };

        if self.reff.id == 0 {
            return Err(bad("element id cannot be zero"));
        }
        if self.version == 0 {
            return Err(bad("element version must be positive"));
        }
        validate_tags(&self.tags, limits)?;

        if !self.visible {
            if self.version == 1 {
                return Err(bad("element cannot be hidden on creation"));
            }
            if !self.tags.is_empty() {
                return Err(bad("hidden element cannot have tags"));
            }
            if self.point.is_some() {
                return Err(bad("hidden element cannot have coordinates"));
            }
            if !self.members.is_empty() {
                return Err(bad("hidden element cannot have members"));
            }
            return Ok(());
        }

        match self.reff.kind {
            ElementType::Node => {
                if !self.members.is_empty() {
                    return Err(bad("node cannot have members"));
                }
                if self.point.is_none() {
                    return Err(bad("node requires coordinates"));
                }
            }
            ElementType::Way => {
                if self.point.is_some() {
                    return Err(bad("way cannot have coordinates"));
                }
                if self.members.len() < 2 {
                    return Err(bad("way requires at least two nodes"));
                }
                if self.members.len() > limits.way_members_max {
                    return Err(bad("way has too many members"));
                }
                if self.members.iter().any(|m| !m.role.is_empty()) {
                    return Err(bad("way members cannot have roles"));
                }
                if self.members.iter().any(|m| m.reff.kind != ElementType::Node) {
                    return Err(bad("way members must be nodes"));
                }
            }
            ElementType::Relation => {
                if self.point.is_some() {
                    return Err(bad("relation cannot have coordinates"));
                }
                if self.members.len() > limits.relation_members_max {
                    return Err(bad("relation has too many members"));
                }
                if self
                    .members
                    .iter()
                    .any(|m| m.role.len() > limits.member_role_max_len)
                {
                    return Err(bad("relation member role is too long"));
                }
            }
        }
        Ok(())
    }
}
