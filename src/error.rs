use thiserror::Error;

use crate::model::{ChangesetId, ElementRef, Timestamp, VersionedElementRef};

pub type Result<T> = std::result::Result<T, MapError>;

/// Terminal failures surfaced to the request boundary.
///
/// Every variant carries the first-triggering ref so the collaborating
/// transport layer can format the user-visible message. Retryable
/// optimistic conflicts never appear here; they are consumed by the
/// edit orchestrator (see [`Conflict`]).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MapError {
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("invalid bounding box: {0}")]
    BadBoundingBox(String),
    #[error("invalid tags: {0}")]
    BadTags(String),
    #[error("invalid element {reff}: {detail}")]
    BadElement { reff: ElementRef, detail: String },
    #[error("incoherent query parameters: {0}")]
    BadQueryParams(&'static str),
    #[error("invalid comment: {0}")]
    BadComment(&'static str),
    #[error("placeholder id must be negative on create: {0}")]
    DiffCreateBadId(VersionedElementRef),
    #[error("diff must reference a single changeset")]
    DiffMultipleChangesets,

    #[error("changeset {0} not found")]
    ChangesetNotFound(ChangesetId),
    #[error("element {0} not found")]
    ElementNotFound(ElementRef),
    #[error("element version {0} not found")]
    VersionNotFound(VersionedElementRef),
    #[error("changeset comment {0} not found")]
    CommentNotFound(u64),

    #[error("changeset can only be modified by its owner")]
    ChangesetAccessDenied,
    #[error("moderator role required")]
    ModeratorRequired,

    #[error("changeset {id} was closed at {closed_at}")]
    ChangesetAlreadyClosed { id: ChangesetId, closed_at: Timestamp },
    #[error("element operation is missing a changeset reference")]
    ChangesetMissing,
    #[error("version mismatch for {reff}: provided {provided}, server had {current}")]
    VersionConflict {
        reff: ElementRef,
        provided: u64,
        current: u64,
    },
    #[error("changeset {0}: user already subscribed")]
    AlreadySubscribed(ChangesetId),
    #[error("changeset {0}: user is not subscribed")]
    NotSubscribed(ChangesetId),

    #[error("element {0} is currently deleted")]
    ElementGone(ElementRef),

    #[error("member {member} of {parent} does not exist or is not visible")]
    MemberNotFound {
        parent: VersionedElementRef,
        member: ElementRef,
    },
    #[error("element {reff} is still referenced by {used_by:?}")]
    ElementInUse {
        reff: VersionedElementRef,
        used_by: Vec<ElementRef>,
    },
    #[error("element {0} is already deleted")]
    AlreadyDeleted(VersionedElementRef),

    #[error("changeset size {0} exceeds the maximum")]
    ChangesetTooBig(u64),
    #[error("map query area is too large")]
    MapQueryAreaTooBig,
    #[error("map query returned too many nodes")]
    MapQueryNodesLimitExceeded,

    #[error("time integrity violation detected")]
    TimeIntegrity,
    #[error("edit contention persisted after {attempts} attempts: {last}")]
    EditContention { attempts: u32, last: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl MapError {
    /// HTTP status code this error maps to at the request boundary.
    pub fn status(&self) -> u16 {
        match self {
            MapError::MalformedDocument(_)
            | MapError::BadBoundingBox(_)
            | MapError::BadTags(_)
            | MapError::BadElement { .. }
            | MapError::BadQueryParams(_)
            | MapError::BadComment(_)
            | MapError::DiffCreateBadId(_)
            | MapError::DiffMultipleChangesets
            | MapError::AlreadySubscribed(_)
            | MapError::NotSubscribed(_) => 400,
            MapError::ChangesetAccessDenied | MapError::ModeratorRequired => 403,
            MapError::ChangesetNotFound(_)
            | MapError::ElementNotFound(_)
            | MapError::VersionNotFound(_)
            | MapError::CommentNotFound(_) => 404,
            MapError::ChangesetAlreadyClosed { .. }
            | MapError::ChangesetMissing
            | MapError::VersionConflict { .. } => 409,
            MapError::ElementGone(_) => 410,
            MapError::MemberNotFound { .. }
            | MapError::ElementInUse { .. }
            | MapError::AlreadyDeleted(_) => 412,
            MapError::ChangesetTooBig(_)
            | MapError::MapQueryAreaTooBig
            | MapError::MapQueryNodesLimitExceeded => 413,
            MapError::TimeIntegrity
            | MapError::EditContention { .. }
            | MapError::Cancelled
            | MapError::Internal(_) => 500,
        }
    }
}

/// Recoverable write-race conflicts, retried by the edit orchestrator.
///
/// These never cross the crate boundary: the orchestrator either retries
/// them away or converts the last one into [`MapError::EditContention`].
#[derive(Debug, Clone, Error, PartialEq)]
pub(crate) enum Conflict {
    #[error("element {reff} is not the latest version ({actual} != {expected})")]
    SnapshotDrift {
        reff: ElementRef,
        expected: u64,
        actual: u64,
    },
    #[error("changeset {0} was modified concurrently")]
    UpdatedAtDrift(ChangesetId),
    #[error("element {0} gained a parent after the snapshot")]
    PostSnapshotParent(ElementRef),
    #[error("assigned {0} id range was claimed concurrently")]
    UniqueViolation(crate::model::ElementType),
}
