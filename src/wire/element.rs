//! Element document encode/decode.

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};
use crate::model::{
    ChangesetId, Element, ElementRef, ElementType, Member, Point, TagMap,
};

use super::format_timestamp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDoc {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub reff: i64,
    #[serde(default)]
    pub role: String,
}

/// One element as carried on the wire, for both uploads and reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDoc {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    /// On upload: the version the client based its edit on (0 for
    /// creates). On read: the stored version.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub changeset: ChangesetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "TagMap::is_empty")]
    pub tags: TagMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ElementDoc {
    /// Renders a committed element row.
    pub fn encode(element: &Element) -> Result<ElementDoc> {
        let timestamp = element.created_at.map(format_timestamp).transpose()?;
        Ok(ElementDoc {
            kind: element.reff.kind.name().to_owned(),
            id: element.reff.id,
            version: element.version,
            changeset: element.changeset_id,
            visible: Some(element.visible),
            lon: element.point.map(|p| p.lon),
            lat: element.point.map(|p| p.lat),
            tags: element.tags.clone(),
            nodes: match element.reff.kind {
                ElementType::Way => element.members.iter().map(|m| m.reff.id).collect(),
                _ => Vec::new(),
            },
            members: match element.reff.kind {
                ElementType::Relation => element
                    .members
                    .iter()
                    .map(|m| MemberDoc {
                        kind: m.reff.kind.name().to_owned(),
                        reff: m.reff.id,
                        role: m.role.clone(),
                    })
                    .collect(),
                _ => Vec::new(),
            },
            timestamp,
        })
    }

    /// Decodes an upload payload into an engine element with the given
    /// version and visibility (both determined by the enclosing action).
    pub(crate) fn decode(&self, version: u64, visible: bool) -> Result<Element> {
        let kind: ElementType = self.kind.parse()?;
        if self.changeset == 0 {
            return Err(MapError::ChangesetMissing);
        }
        if !visible {
            return Ok(Element::tombstone(kind, self.changeset, self.id, version));
        }
        let element = match kind {
            ElementType::Node => {
                let (lon, lat) = match (self.lon, self.lat) {
                    (Some(lon), Some(lat)) => (lon, lat),
                    _ => {
                        return Err(MapError::BadElement {
                            reff: ElementRef::new(kind, self.id),
                            detail: "node requires lon and lat".to_owned(),
                        })
                    }
                };
                Element::node(
                    self.changeset,
                    self.id,
                    version,
                    Point::new(lon, lat)?,
                    self.tags.clone(),
                )
            }
            ElementType::Way => Element::way(
                self.changeset,
                self.id,
                version,
                self.nodes.clone(),
                self.tags.clone(),
            ),
            ElementType::Relation => {
                let members = self
                    .members
                    .iter()
                    .map(|m| {
                        let member_kind: ElementType = m.kind.parse()?;
                        Ok(Member::new(
                            ElementRef::new(member_kind, m.reff),
                            m.role.clone(),
                        ))
                    })
                    .collect::<Result<Vec<Member>>>()?;
                Element::relation(self.changeset, self.id, version, members, self.tags.clone())
            }
        };
        Ok(element)
    }
}
