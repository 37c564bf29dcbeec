//! Tag set validation.

use std::collections::BTreeMap;

use crate::config::Limits;
use crate::error::{MapError, Result};

/// Ordered tag map. Keys are unique, insertion order is irrelevant.
pub type TagMap = BTreeMap<String, String>;

/// Validates a tag set against the configured limits.
///
/// Checks entry count, per-key and per-value byte lengths, the aggregate
/// byte budget and empty keys.
pub fn validate_tags(tags: &TagMap, limits: &Limits) -> Result<()> {
    if tags.len() > limits.tags_max_entries {
        return Err(MapError::BadTags(format!(
            "too many tags: {} > {}",
            tags.len(),
            limits.tags_max_entries
        )));
    }
    let mut total = 0usize;
    for (key, value) in tags {
        if key.is_empty() {
            return Err(MapError::BadTags("empty tag key".to_owned()));
        }
        if key.len() > limits.tag_key_max_len {
            return Err(MapError::BadTags(format!(
                "tag key too long: {} > {}",
                key.len(),
                limits.tag_key_max_len
            )));
        }
        if value.len() > limits.tag_value_max_len {
            return Err(MapError::BadTags(format!(
                "tag value too long for key {key:?}: {} > {}",
                value.len(),
                limits.tag_value_max_len
            )));
        }
        total += key.len() + value.len();
    }
    if total > limits.tags_max_bytes {
        return Err(MapError::BadTags(format!(
            "tag set too large: {total} > {}",
            limits.tags_max_bytes
        )));
    }
    Ok(())
}
