//! Local element snapshot used during diff preparation.
//!
//! A lazily populated map from element ref to that element's history tail.
//! Local state is the single source of truth while a diff is validated:
//! once a ref is loaded from the store it is never fetched again, and
//! placeholder refs are only ever resolved locally.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{MapError, Result};
use crate::model::{Element, ElementRef, SequenceId};
use crate::store::MapDb;

pub(crate) struct LocalSnapshot<'a> {
    db: &'a MapDb,
    at: SequenceId,
    state: FxHashMap<ElementRef, Vec<Element>>,
    /// Versions observed in the store at load time, re-verified by the
    /// applier against the then-current state.
    base_versions: FxHashMap<ElementRef, u64>,
}

impl<'a> LocalSnapshot<'a> {
    pub fn new(db: &'a MapDb, at: SequenceId) -> LocalSnapshot<'a> {
        LocalSnapshot {
            db,
            at,
            state: FxHashMap::default(),
            base_versions: FxHashMap::default(),
        }
    }

    /// Loads the current rows for all positively-identified refs in one
    /// batch; fails with the first missing ref.
    pub fn preload(&mut self, refs: &FxHashSet<ElementRef>) -> Result<()> {
        let positive: Vec<ElementRef> = refs.iter().copied().filter(|r| r.id > 0).collect();
        if positive.is_empty() {
            return Ok(());
        }
        let elements = self
            .db
            .get_current(&positive, Some(self.at), false, None);
        if elements.len() != positive.len() {
            let found: FxHashSet<ElementRef> = elements.iter().map(|e| e.reff).collect();
            let missing = positive
                .iter()
                .copied()
                .find(|r| !found.contains(r))
                .ok_or(MapError::Internal("preload count mismatch"))?;
            return Err(MapError::ElementNotFound(missing));
        }
        for element in elements {
            self.record_loaded(element);
        }
        Ok(())
    }

    fn record_loaded(&mut self, element: Element) {
        self.base_versions.insert(element.reff, element.version);
        self.state.insert(element.reff, vec![element]);
    }

    pub fn contains(&self, reff: ElementRef) -> bool {
        self.state.contains_key(&reff)
    }

    /// Newest locally-known version without touching the store.
    pub fn peek(&self, reff: ElementRef) -> Option<&Element> {
        self.state.get(&reff).and_then(|tail| tail.last())
    }

    /// Newest version of the ref, loading from the store on first use.
    /// Placeholder refs must already be known locally.
    pub fn latest(&mut self, reff: ElementRef) -> Result<Element> {
        if let Some(element) = self.peek(reff) {
            return Ok(element.clone());
        }
        if reff.is_placeholder() {
            return Err(MapError::ElementNotFound(reff));
        }
        let mut elements = self
            .db
            .get_current(std::slice::from_ref(&reff), Some(self.at), false, None);
        let element = elements.pop().ok_or(MapError::ElementNotFound(reff))?;
        self.record_loaded(element.clone());
        Ok(element)
    }

    /// Appends a newly-validated element version to the local tail.
    pub fn push(&mut self, element: Element) {
        self.state.entry(element.reff).or_default().push(element);
    }

    pub fn base_versions(&self) -> &FxHashMap<ElementRef, u64> {
        &self.base_versions
    }
}
