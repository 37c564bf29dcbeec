//! Changeset listing queries.

use crate::error::{MapError, Result};
use crate::model::{Changeset, ChangesetId, Rect, Timestamp, UserId};
use crate::store::MapDb;

/// Filters for [`MapDb::find_changesets`]. All filters compose with AND;
/// `open` and `closed` are mutually exclusive.
#[derive(Debug, Clone, Default)]
pub struct ChangesetQuery {
    pub ids: Option<Vec<ChangesetId>>,
    pub user_id: Option<UserId>,
    pub open: bool,
    pub closed: bool,
    pub created_before: Option<Timestamp>,
    pub closed_after: Option<Timestamp>,
    pub bbox: Option<Rect>,
    pub limit: Option<usize>,
}

impl MapDb {
    /// Lists changesets matching the query, newest first.
    pub fn find_changesets(&self, query: &ChangesetQuery) -> Result<Vec<Changeset>> {
        if query.open && query.closed {
            return Err(MapError::BadQueryParams(
                "open and closed are mutually exclusive",
            ));
        }

        let table = self.changesets.read();
        let mut out: Vec<Changeset> = table
            .iter()
            .filter(|cs| {
                if let Some(ids) = &query.ids {
                    if !ids.contains(&cs.id) {
                        return false;
                    }
                }
                if let Some(user_id) = query.user_id {
                    if cs.user_id != user_id {
                        return false;
                    }
                }
                if query.open && !cs.is_open() {
                    return false;
                }
                if query.closed && cs.is_open() {
                    return false;
                }
                if let Some(before) = query.created_before {
                    if cs.created_at >= before {
                        return false;
                    }
                }
                if let Some(after) = query.closed_after {
                    if !cs.closed_at.map_or(false, |closed| closed > after) {
                        return false;
                    }
                }
                if let Some(bbox) = query.bbox {
                    if !cs.bounds.iter().any(|r| r.intersects(&bbox)) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.id.cmp(&a.id));
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    pub fn count_changesets_by_user(&self, user_id: UserId) -> usize {
        self.changesets
            .read()
            .iter()
            .filter(|cs| cs.user_id == user_id)
            .count()
    }
}
