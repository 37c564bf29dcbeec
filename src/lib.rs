//! # Meridian - Versioned Map Element Store
//!
//! Meridian is the server-side core of a collaborative map editing API:
//! a versioned, append-only store of nodes, ways and relations, edited
//! through batched changes grouped under user-authored changesets and
//! applied with optimistic concurrency control.
//!
//! ## Quick Start
//!
//! ```rust
//! use meridian::{Action, Actor, Element, Limits, MapDb, Point, TagMap};
//!
//! let db = MapDb::new(Limits::default());
//! let actor = Actor::new(1);
//!
//! // open a changeset and create a node through it
//! let changeset = db.create_changeset(&actor, TagMap::new())?;
//! let node = Element::node(changeset, -1, 1, Point::new(13.4, 52.5)?, TagMap::new());
//! let result = db.apply_diff(&actor, &[Action::new(node)])?;
//!
//! let assigned = result.entries[0].new_id;
//! assert!(assigned > 0);
//! # Ok::<(), meridian::MapError>(())
//! ```
//!
//! ## Architecture
//!
//! - **Store layer**: append-only element rows with version, member and
//!   changeset indexes; snapshot reads by sequence id.
//! - **Edit layer**: lock-free diff preparation, re-verified application
//!   under an advisory write lock, bounded optimistic retries.
//! - **Query layer**: bbox closure queries and changeset listings.
//! - **Wire layer**: `osmChange`, element and changeset documents.

pub mod config;
pub mod edit;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod service;
pub mod store;
pub mod wire;

// Re-export the main public API
pub use crate::config::Limits;
pub use crate::edit::{Action, DiffEntry, DiffResult};
pub use crate::error::{MapError, Result};
pub use crate::model::{
    Actor, AnyElementRef, Changeset, ChangesetComment, ChangesetId, Element, ElementRef,
    ElementType, Member, Point, Rect, SequenceId, TagMap, Timestamp, TypedId, UserId, UserRole,
    VersionedElementRef,
};
pub use crate::query::{ChangesetQuery, MapQueryOptions};
pub use crate::store::{ChangesetOrder, Clock, MapDb, SystemClock};
