//! Read queries layered above the store: bbox closure and changeset
//! listings.

mod changesets;
mod map;

pub use changesets::ChangesetQuery;
pub use map::MapQueryOptions;
