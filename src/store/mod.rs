//! The `MapDb` facade: tables, locks and the snapshot read API.

mod bounds;
mod changeset;
mod element;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Limits;
use crate::model::{
    AnyElementRef, ChangesetId, Element, ElementRef, ElementType, SequenceId, Timestamp,
    VersionedElementRef,
};

pub use element::ChangesetOrder;

pub(crate) use bounds::change_bounds;
pub(crate) use changeset::ChangesetTable;
pub(crate) use element::ElementTable;

/// Server time source. The contract requires monotonically non-decreasing
/// timestamps; the edit engine guards against regressions with its time
/// integrity checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source used outside tests.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now_utc()
    }
}

/// The versioned map element store.
///
/// Readers operate on committed rows filtered by a snapshot sequence id
/// and are never blocked; writers serialize on the advisory apply lock for
/// the duration of one applied diff.
pub struct MapDb {
    pub(crate) limits: Limits,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) elements: RwLock<ElementTable>,
    pub(crate) changesets: RwLock<ChangesetTable>,
    /// Advisory exclusive lock serializing diff application.
    pub(crate) apply_lock: Mutex<()>,
}

impl MapDb {
    pub fn new(limits: Limits) -> MapDb {
        MapDb::with_clock(limits, Arc::new(SystemClock))
    }

    pub fn with_clock(limits: Limits, clock: Arc<dyn Clock>) -> MapDb {
        MapDb {
            limits,
            clock,
            elements: RwLock::new(ElementTable::default()),
            changesets: RwLock::new(ChangesetTable::default()),
            apply_lock: Mutex::new(()),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The snapshot token: advances on every committed element write.
    /// `0` when the store is empty.
    pub fn current_sequence_id(&self) -> SequenceId {
        self.elements.read().current_sequence_id()
    }

    /// Largest assigned id for the type at the snapshot; `0` when none.
    pub fn max_element_id(&self, kind: ElementType, at: Option<SequenceId>) -> i64 {
        self.elements.read().max_id(kind, at)
    }

    /// Current version of the element; `0` if it never existed at the
    /// snapshot.
    pub fn current_version(&self, reff: ElementRef, at: Option<SequenceId>) -> u64 {
        self.elements.read().current_version(reff, at)
    }

    /// Version history of one element.
    pub fn get_versions(
        &self,
        reff: ElementRef,
        at: Option<SequenceId>,
        version_range: Option<(u64, u64)>,
        ascending: bool,
        limit: Option<usize>,
    ) -> Vec<Element> {
        self.elements
            .read()
            .get_versions(reff, at, version_range, ascending, limit)
    }

    /// Exact version rows, ascending by `(type, id, version)`.
    pub fn get_by_versioned(
        &self,
        refs: &[VersionedElementRef],
        at: Option<SequenceId>,
        limit: Option<usize>,
    ) -> Vec<Element> {
        self.elements.read().get_versioned(refs, at, limit)
    }

    /// Current rows for the refs; `recurse_ways` additionally pulls the
    /// current member nodes of any returned way (one level).
    pub fn get_current(
        &self,
        refs: &[ElementRef],
        at: Option<SequenceId>,
        recurse_ways: bool,
        limit: Option<usize>,
    ) -> Vec<Element> {
        self.elements
            .read()
            .get_current(refs, at, recurse_ways, limit)
    }

    /// Mixed versioned/unversioned lookup, aligned to the input order.
    pub fn get_by_mixed(
        &self,
        refs: &[AnyElementRef],
        at: Option<SequenceId>,
        limit: Option<usize>,
    ) -> Vec<Option<Element>> {
        self.elements.read().get_by_mixed(refs, at, limit)
    }

    /// Current elements that currently reference any of the member refs.
    pub fn get_parents(
        &self,
        member_refs: &[ElementRef],
        at: Option<SequenceId>,
        parent_type: Option<ElementType>,
        limit: Option<usize>,
    ) -> Vec<Element> {
        self.elements
            .read()
            .get_parents(member_refs, at, parent_type, limit)
    }

    /// All element rows written under one changeset.
    pub fn get_by_changeset(&self, changeset_id: ChangesetId, order: ChangesetOrder) -> Vec<Element> {
        self.elements.read().get_by_changeset(changeset_id, order)
    }

    pub(crate) fn find_latest_element(&self) -> Option<Element> {
        self.elements.read().find_latest().cloned()
    }
}
