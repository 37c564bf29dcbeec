//! Changesets, their comments, and the acting user.

use smallvec::SmallVec;

use crate::model::geometry::Rect;
use crate::model::tags::TagMap;
use crate::model::{ChangesetId, Timestamp, UserId};

/// Elevated roles an authenticated user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Moderator,
    Administrator,
}

/// The authenticated caller of a mutating operation, as produced by the
/// external authentication oracle. Anonymous edits are not accepted, so
/// a user id is always present.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: UserId,
    pub roles: Vec<UserRole>,
}

impl Actor {
    pub fn new(user_id: UserId) -> Actor {
        Actor {
            user_id,
            roles: Vec::new(),
        }
    }

    pub fn with_roles(user_id: UserId, roles: Vec<UserRole>) -> Actor {
        Actor { user_id, roles }
    }

    /// Moderators and administrators share the elevated limits.
    pub fn is_moderator(&self) -> bool {
        self.roles
            .iter()
            .any(|r| matches!(r, UserRole::Moderator | UserRole::Administrator))
    }
}

/// A user-initiated, bounded-duration session grouping element operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    pub id: ChangesetId,
    pub user_id: UserId,
    pub tags: TagMap,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    /// Total element operations applied so far.
    pub size: u64,
    pub num_create: u64,
    pub num_modify: u64,
    pub num_delete: u64,
    pub num_comments: u64,
    /// Accumulated geographic extent: up to the configured number of
    /// disjoint rectangles.
    pub bounds: SmallVec<[Rect; 10]>,
    /// Set when `size` reached the cap; the applier closes the changeset
    /// on commit.
    pub size_limit_reached: bool,
}

impl Changeset {
    pub fn new(id: ChangesetId, user_id: UserId, tags: TagMap, now: Timestamp) -> Changeset {
        Changeset {
            id,
            user_id,
            tags,
            created_at: now,
            updated_at: now,
            closed_at: None,
            size: 0,
            num_create: 0,
            num_modify: 0,
            num_delete: 0,
            num_comments: 0,
            bounds: SmallVec::new(),
            size_limit_reached: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Whether `additional` more operations would still fit under `cap`.
    pub fn fits_size(&self, additional: u64, cap: u64) -> bool {
        self.size + additional <= cap
    }

    /// Applies per-kind operation deltas. Returns false (without
    /// modification) when the cap would be exceeded; marks the at-cap
    /// flag when the new size reaches it exactly.
    pub fn increase_size(
        &mut self,
        num_create: u64,
        num_modify: u64,
        num_delete: u64,
        cap: u64,
    ) -> bool {
        let new_size = self.size + num_create + num_modify + num_delete;
        if new_size > cap {
            return false;
        }
        if new_size == cap {
            self.size_limit_reached = true;
        }
        self.size = new_size;
        self.num_create += num_create;
        self.num_modify += num_modify;
        self.num_delete += num_delete;
        true
    }
}

/// A discussion entry appended to a changeset, ordered by id.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangesetComment {
    pub id: u64,
    pub changeset_id: ChangesetId,
    pub user_id: UserId,
    pub body: String,
    pub created_at: Timestamp,
    /// Logically hidden by a moderator; retained in storage.
    pub hidden: bool,
}
