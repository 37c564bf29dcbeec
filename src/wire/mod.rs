//! Wire documents for the 0.6 API surface.
//!
//! The transport encoding is JSON via serde; decoding validates structure
//! and produces engine-level values, encoding renders committed state.

mod changeset;
mod element;
mod osmchange;

pub use changeset::{ChangesetCommentDoc, ChangesetDoc, ChangesetQueryParams};
pub use element::{ElementDoc, MemberDoc};
pub use osmchange::{
    decode_osm_change, encode_diff_result, encode_osm_change, ActionDoc, ActionKind, DiffEntryDoc,
    OsmChangeDoc,
};

use time::format_description::well_known::Rfc3339;

use crate::error::{MapError, Result};
use crate::model::Timestamp;

pub(crate) fn format_timestamp(ts: Timestamp) -> Result<String> {
    ts.format(&Rfc3339)
        .map_err(|_| MapError::Internal("timestamp formatting failed"))
}

pub(crate) fn parse_timestamp(s: &str) -> Result<Timestamp> {
    Timestamp::parse(s, &Rfc3339)
        .map_err(|_| MapError::MalformedDocument(format!("invalid timestamp: {s}")))
}
