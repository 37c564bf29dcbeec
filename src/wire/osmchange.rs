//! The `osmChange` document and the diff result.

use serde::{Deserialize, Serialize};

use crate::edit::{Action, DiffResult};
use crate::error::{MapError, Result};

use super::element::ElementDoc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Modify,
    Delete,
}

/// One action of an `osmChange` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDoc {
    pub action: ActionKind,
    #[serde(flatten)]
    pub element: ElementDoc,
    /// Delete-only marker: silently skip the delete when the target is
    /// still referenced.
    #[serde(default, rename = "if-unused", skip_serializing_if = "std::ops::Not::not")]
    pub if_unused: bool,
}

/// A batched change: a mixed sequence of create/modify/delete actions,
/// applied in order under a single changeset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsmChangeDoc {
    pub changes: Vec<ActionDoc>,
}

/// One `<diffResult>` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntryDoc {
    #[serde(rename = "type")]
    pub kind: String,
    pub old_id: i64,
    pub new_id: i64,
    pub new_version: u64,
}

/// Decodes an `osmChange` JSON document into engine actions.
///
/// Creates ignore the supplied version; modifies and deletes target the
/// successor of the version the client based its edit on.
pub fn decode_osm_change(json: &str) -> Result<Vec<Action>> {
    let doc: OsmChangeDoc =
        serde_json::from_str(json).map_err(|e| MapError::MalformedDocument(e.to_string()))?;
    doc.changes
        .iter()
        .map(|action_doc| {
            let element = match action_doc.action {
                ActionKind::Create => action_doc.element.decode(1, true)?,
                ActionKind::Modify => {
                    require_base_version(action_doc)?;
                    action_doc.element.decode(action_doc.element.version + 1, true)?
                }
                ActionKind::Delete => {
                    require_base_version(action_doc)?;
                    action_doc
                        .element
                        .decode(action_doc.element.version + 1, false)?
                }
            };
            Ok(Action {
                element,
                if_unused: action_doc.if_unused && action_doc.action == ActionKind::Delete,
            })
        })
        .collect()
}

fn require_base_version(action_doc: &ActionDoc) -> Result<()> {
    if action_doc.element.version == 0 {
        return Err(MapError::MalformedDocument(format!(
            "{:?} action requires a version",
            action_doc.action
        )));
    }
    Ok(())
}

/// Renders committed element rows as an `osmChange` document, as served
/// by the changeset download endpoint. The action kind is recovered from
/// each row: first versions are creates, hidden rows deletes, the rest
/// modifies.
pub fn encode_osm_change(elements: &[crate::model::Element]) -> Result<OsmChangeDoc> {
    use crate::model::OpKind;

    let changes = elements
        .iter()
        .map(|element| {
            let action = match element.op_kind() {
                OpKind::Create => ActionKind::Create,
                OpKind::Modify => ActionKind::Modify,
                OpKind::Delete => ActionKind::Delete,
            };
            Ok(ActionDoc {
                action,
                element: ElementDoc::encode(element)?,
                if_unused: false,
            })
        })
        .collect::<Result<Vec<ActionDoc>>>()?;
    Ok(OsmChangeDoc { changes })
}

/// Renders an applied diff's placeholder map as `<diffResult>` rows.
pub fn encode_diff_result(result: &DiffResult) -> Vec<DiffEntryDoc> {
    result
        .entries
        .iter()
        .map(|entry| DiffEntryDoc {
            kind: entry.kind.name().to_owned(),
            old_id: entry.old_id,
            new_id: entry.new_id,
            new_version: entry.new_version,
        })
        .collect()
}
