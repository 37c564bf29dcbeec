//! Element read facade and single-element edit wrappers.
//!
//! Reads implement the boundary semantics: unknown refs are not-found,
//! a hidden current version is gone (not not-found). Single-element
//! create/update/delete are one-action diffs through the optimistic
//! pipeline, implicitly enclosed in their declared changeset.

use rustc_hash::FxHashSet;

use crate::edit::Action;
use crate::error::{MapError, Result};
use crate::model::{
    Actor, AnyElementRef, Element, ElementRef, ElementType, SequenceId, VersionedElementRef,
};
use crate::store::MapDb;

impl MapDb {
    /// Current version of one element; 410 semantics when hidden.
    pub fn read_element(&self, reff: ElementRef) -> Result<Element> {
        let element = self
            .get_current(std::slice::from_ref(&reff), None, false, None)
            .into_iter()
            .next()
            .ok_or(MapError::ElementNotFound(reff))?;
        if !element.visible {
            return Err(MapError::ElementGone(reff));
        }
        Ok(element)
    }

    /// One specific version of an element.
    pub fn read_element_version(&self, vref: VersionedElementRef) -> Result<Element> {
        self.get_by_versioned(std::slice::from_ref(&vref), None, None)
            .into_iter()
            .next()
            .ok_or(MapError::VersionNotFound(vref))
    }

    /// All versions of an element, oldest first.
    pub fn read_element_history(&self, reff: ElementRef) -> Result<Vec<Element>> {
        let history = self.get_versions(reff, None, None, true, None);
        if history.is_empty() {
            return Err(MapError::ElementNotFound(reff));
        }
        Ok(history)
    }

    /// Multi-element read over mixed current/versioned refs. Fails with
    /// the first unresolved ref; duplicates collapse in the result.
    pub fn read_elements(&self, refs: &[AnyElementRef]) -> Result<Vec<Element>> {
        let resolved = self.get_by_mixed(refs, None, None);
        let mut seen: FxHashSet<SequenceId> = FxHashSet::default();
        let mut out: Vec<Element> = Vec::new();
        for (reff, element) in refs.iter().zip(resolved) {
            let element = element.ok_or(MapError::ElementNotFound(reff.unversioned()))?;
            if seen.insert(element.sequence_id) {
                out.push(element);
            }
        }
        Ok(out)
    }

    /// Current parents of one element, optionally narrowed by type.
    pub fn read_element_parents(
        &self,
        reff: ElementRef,
        parent_type: Option<ElementType>,
    ) -> Vec<Element> {
        self.get_parents(std::slice::from_ref(&reff), None, parent_type, None)
    }

    /// A way or relation together with its current members; member ways
    /// additionally bring their nodes.
    pub fn read_element_full(&self, reff: ElementRef) -> Result<Vec<Element>> {
        if reff.kind == ElementType::Node {
            return Err(MapError::BadQueryParams(
                "full reads apply to ways and relations",
            ));
        }
        let element = self.read_element(reff)?;
        let member_refs: Vec<ElementRef> = {
            let mut seen: FxHashSet<ElementRef> = FxHashSet::default();
            element
                .members
                .iter()
                .map(|m| m.reff)
                .filter(|r| seen.insert(*r))
                .collect()
        };
        let mut out = vec![element];
        out.extend(self.get_current(&member_refs, None, true, None));
        Ok(out)
    }

    /// Creates one element and returns its assigned id.
    pub fn create_element(&self, actor: &Actor, mut element: Element) -> Result<i64> {
        if element.reff.id >= 0 {
            element.reff.id = -1;
        }
        element.version = 1;
        let result = self.apply_diff(actor, &[Action::new(element)])?;
        result
            .entries
            .first()
            .map(|e| e.new_id)
            .ok_or(MapError::Internal("single-element diff returned no rows"))
    }

    /// Modifies one element and returns its new version.
    pub fn update_element(&self, actor: &Actor, element: Element) -> Result<u64> {
        let result = self.apply_diff(actor, &[Action::new(element)])?;
        result
            .entries
            .first()
            .map(|e| e.new_version)
            .ok_or(MapError::Internal("single-element diff returned no rows"))
    }

    /// Deletes one element and returns its new version. `vref.version` is
    /// the version the caller observed; the write targets its successor.
    pub fn delete_element(
        &self,
        actor: &Actor,
        vref: VersionedElementRef,
        changeset_id: crate::model::ChangesetId,
    ) -> Result<u64> {
        let tombstone = Element::tombstone(vref.kind, changeset_id, vref.id, vref.version + 1);
        self.update_element(actor, tombstone)
    }
}
