//! Changeset documents and query parameters.

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};
use crate::model::{Changeset, ChangesetComment, ChangesetId, Rect, TagMap, UserId};
use crate::query::ChangesetQuery;

use super::{format_timestamp, parse_timestamp};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesetCommentDoc {
    pub id: u64,
    pub user_id: UserId,
    pub body: String,
    pub created_at: String,
}

/// One changeset as rendered for reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesetDoc {
    pub id: ChangesetId,
    pub user_id: UserId,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
    pub open: bool,
    pub changes_count: u64,
    pub comments_count: u64,
    #[serde(default, skip_serializing_if = "TagMap::is_empty")]
    pub tags: TagMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<ChangesetCommentDoc>,
}

impl ChangesetDoc {
    pub fn encode(changeset: &Changeset, comments: &[ChangesetComment]) -> Result<ChangesetDoc> {
        let union = changeset
            .bounds
            .iter()
            .copied()
            .reduce(|a, b| a.union(&b));
        Ok(ChangesetDoc {
            id: changeset.id,
            user_id: changeset.user_id,
            created_at: format_timestamp(changeset.created_at)?,
            updated_at: format_timestamp(changeset.updated_at)?,
            closed_at: changeset.closed_at.map(format_timestamp).transpose()?,
            open: changeset.is_open(),
            changes_count: changeset.size,
            comments_count: changeset.num_comments,
            tags: changeset.tags.clone(),
            min_lon: union.map(|r| r.min_lon),
            min_lat: union.map(|r| r.min_lat),
            max_lon: union.map(|r| r.max_lon),
            max_lat: union.map(|r| r.max_lat),
            comments: comments
                .iter()
                .map(|c| {
                    Ok(ChangesetCommentDoc {
                        id: c.id,
                        user_id: c.user_id,
                        body: c.body.clone(),
                        created_at: format_timestamp(c.created_at)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

/// Raw changeset listing parameters, as supplied by the transport layer.
///
/// `user_id` and `display_name` are mutually exclusive; resolving a
/// display name to a user id is the user-directory collaborator's job,
/// so a lone `display_name` is rejected here as well.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangesetQueryParams {
    #[serde(default)]
    pub bbox: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub created_before: Option<String>,
    #[serde(default)]
    pub closed_after: Option<String>,
    #[serde(default)]
    pub ids: Option<Vec<ChangesetId>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ChangesetQueryParams {
    pub fn into_query(self) -> Result<ChangesetQuery> {
        if self.user_id.is_some() && self.display_name.is_some() {
            return Err(MapError::BadQueryParams(
                "user_id and display_name are mutually exclusive",
            ));
        }
        if self.display_name.is_some() {
            return Err(MapError::BadQueryParams(
                "display_name must be resolved to a user_id by the caller",
            ));
        }
        Ok(ChangesetQuery {
            ids: self.ids,
            user_id: self.user_id,
            open: self.open,
            closed: self.closed,
            created_before: self.created_before.as_deref().map(parse_timestamp).transpose()?,
            closed_after: self.closed_after.as_deref().map(parse_timestamp).transpose()?,
            bbox: self.bbox.as_deref().map(Rect::parse_bbox).transpose()?,
            limit: self.limit,
        })
    }
}
