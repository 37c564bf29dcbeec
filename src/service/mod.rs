//! Service facades over the store: changeset lifecycle and element
//! boundary semantics.

mod changeset;
mod element;
