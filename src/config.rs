use std::time::Duration;

/// Operational limits enforced by the edit engine and the query layer.
///
/// The defaults match the public API contract; tests inject shrunken
/// values where exercising the full-size boundary would be wasteful.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum byte length of a tag key.
    pub tag_key_max_len: usize,
    /// Maximum byte length of a tag value.
    pub tag_value_max_len: usize,
    /// Maximum number of tag entries per element or changeset.
    pub tags_max_entries: usize,
    /// Maximum aggregate byte size of one tag set.
    pub tags_max_bytes: usize,
    /// Maximum number of way members.
    pub way_members_max: usize,
    /// Maximum number of relation members.
    pub relation_members_max: usize,
    /// Maximum byte length of a relation member role.
    pub member_role_max_len: usize,
    /// Changeset size cap for ordinary users.
    pub changeset_size_max: u64,
    /// Changeset size cap for moderators and administrators.
    pub changeset_size_max_moderator: u64,
    /// Maximum byte length of a changeset comment body.
    pub changeset_comment_max_len: usize,
    /// Maximum number of accumulated changeset bounds rectangles.
    pub changeset_bbox_limit: usize,
    /// Distance floor (degrees) for bounds-rectangle buffering and merging.
    pub bbox_merge_distance: f64,
    /// Buffer ratio applied to a rectangle's side before intersection tests.
    pub bbox_merge_ratio: f64,
    /// Maximum map query area in square degrees.
    pub map_query_area_max: f64,
    /// Legacy map query node ceiling.
    pub map_query_legacy_nodes: usize,
    /// Wall-clock budget for optimistic edit retries.
    pub edit_retry_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            tag_key_max_len: 255,
            tag_value_max_len: 255,
            tags_max_entries: 255,
            tags_max_bytes: 64 * 1024,
            way_members_max: 2_000,
            relation_members_max: 32_000,
            member_role_max_len: 255,
            changeset_size_max: 10_000,
            changeset_size_max_moderator: 20_000,
            changeset_comment_max_len: 5_000,
            changeset_bbox_limit: 10,
            bbox_merge_distance: 3.0,
            bbox_merge_ratio: 0.5,
            map_query_area_max: 0.25,
            map_query_legacy_nodes: 50_000,
            edit_retry_timeout: Duration::from_secs(30),
        }
    }
}

impl Limits {
    /// Changeset size cap for the given actor roles.
    pub fn changeset_cap(&self, moderator: bool) -> u64 {
        if moderator {
            self.changeset_size_max_moderator
        } else {
            self.changeset_size_max
        }
    }
}
