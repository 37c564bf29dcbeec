//! Core data model: element identity, versioned rows, changesets and
//! geographic primitives.

mod changeset;
mod element;
mod geometry;
mod refs;
mod tags;

pub use changeset::{Actor, Changeset, ChangesetComment, UserRole};
pub use element::{Element, Member, OpKind};
pub use geometry::{Point, Rect, COORD_PRECISION};
pub use refs::{AnyElementRef, ElementRef, ElementType, TypedId, VersionedElementRef};
pub use tags::{validate_tags, TagMap};

/// Monotonically increasing commit sequence number; `0` means "empty".
pub type SequenceId = u64;

/// Changeset identifier.
pub type ChangesetId = u64;

/// User identifier, as issued by the external authentication oracle.
pub type UserId = u64;

/// Server timestamp.
pub type Timestamp = time::OffsetDateTime;
