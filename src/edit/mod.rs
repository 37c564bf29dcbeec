//! The optimistic edit pipeline: prepare, apply, retry.
//!
//! Preparation validates a batched change against a lock-free snapshot;
//! application re-verifies and commits under the advisory write lock; the
//! orchestrator retries recoverable write races within a wall-clock
//! budget. Terminal validation failures surface immediately.

mod apply;
mod prepare;
mod snapshot;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::error::{MapError, Result};
use crate::model::{Actor, Element, ElementType};
use crate::store::MapDb;

use apply::{apply, ApplyError};
use prepare::prepare;

/// One `osmChange` action: an element payload plus the delete-only
/// `if-unused` marker.
///
/// The operation kind is encoded in the payload: `version == 1` creates,
/// a hidden payload deletes, anything else modifies.
#[derive(Debug, Clone)]
pub struct Action {
    pub element: Element,
    pub if_unused: bool,
}

impl Action {
    pub fn new(element: Element) -> Action {
        Action {
            element,
            if_unused: false,
        }
    }

    pub fn if_unused(element: Element) -> Action {
        Action {
            element,
            if_unused: true,
        }
    }
}

/// One row of the diff result returned to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub kind: ElementType,
    /// The id as submitted; negative for placeholders.
    pub old_id: i64,
    pub new_id: i64,
    pub new_version: u64,
}

/// Placeholder-id mapping of one applied diff, in submission order.
/// `if-unused` deletes that were kept appear with their pre-existing
/// version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub entries: Vec<DiffEntry>,
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.map_or(false, |flag| flag.load(Ordering::Relaxed))
}

fn commit(
    db: &MapDb,
    actor: &Actor,
    actions: &[Action],
    cancel: Option<&AtomicBool>,
) -> Result<DiffResult> {
    if actions.is_empty() {
        return Ok(DiffResult::default());
    }

    let started = Instant::now();
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        if is_cancelled(cancel) {
            return Err(MapError::Cancelled);
        }
        let prepared = prepare(db, actor, actions)?;
        if is_cancelled(cancel) {
            return Err(MapError::Cancelled);
        }
        match apply(db, prepared) {
            Ok(result) => return Ok(result),
            Err(ApplyError::Fatal(e)) => return Err(e),
            Err(ApplyError::Conflict(conflict)) => {
                if started.elapsed() < db.limits().edit_retry_timeout {
                    match attempt {
                        1..=2 => debug!("optimistic edit failed at attempt {attempt}, retrying: {conflict}"),
                        3 => info!("optimistic edit failed at attempt {attempt}, retrying: {conflict}"),
                        _ => warn!("optimistic edit failed at attempt {attempt}, retrying: {conflict}"),
                    }
                    continue;
                }
                error!("optimistic edit failed and timed out after {attempt} attempts: {conflict}");
                return Err(MapError::EditContention {
                    attempts: attempt,
                    last: conflict.to_string(),
                });
            }
        }
    }
}

impl MapDb {
    /// Applies one batched change atomically, retrying recoverable write
    /// races within the configured budget.
    ///
    /// On success every submitted action is reflected in the result, in
    /// submission order, with placeholder ids mapped to their assigned
    /// ids.
    pub fn apply_diff(&self, actor: &Actor, actions: &[Action]) -> Result<DiffResult> {
        commit(self, actor, actions, None)
    }

    /// [`MapDb::apply_diff`] with caller cancellation, honored between
    /// retry attempts and immediately after preparation.
    pub fn apply_diff_cancellable(
        &self,
        actor: &Actor,
        actions: &[Action],
        cancel: &AtomicBool,
    ) -> Result<DiffResult> {
        commit(self, actor, actions, Some(cancel))
    }
}
