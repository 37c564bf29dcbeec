//! Bbox queries: the transitive closure of currently-visible elements
//! around the nodes inside a rectangle.

use std::thread;

use rustc_hash::FxHashSet;

use crate::error::{MapError, Result};
use crate::model::{Element, ElementRef, ElementType, Rect, SequenceId};
use crate::store::MapDb;

/// Options for [`MapDb::find_by_geom`].
#[derive(Debug, Clone)]
pub struct MapQueryOptions {
    /// Maximum number of matching nodes to fetch.
    pub nodes_limit: Option<usize>,
    /// Enforce the legacy node ceiling; the query fails once the result
    /// exceeds it.
    pub legacy_nodes_limit: bool,
    /// Skip fetching the full node membership of parent ways.
    pub partial_ways: bool,
    /// Include parent relations of the matched nodes and ways.
    pub include_relations: bool,
}

impl Default for MapQueryOptions {
    fn default() -> Self {
        Self {
            nodes_limit: None,
            legacy_nodes_limit: false,
            partial_ways: false,
            include_relations: true,
        }
    }
}

impl MapDb {
    /// The `/map` query: full-area read with the legacy node ceiling and
    /// the bbox area precheck.
    pub fn map_query(&self, rect: Rect) -> Result<Vec<Element>> {
        if rect.area() > self.limits.map_query_area_max {
            return Err(MapError::MapQueryAreaTooBig);
        }
        self.find_by_geom(
            rect,
            &MapQueryOptions {
                nodes_limit: Some(self.limits.map_query_legacy_nodes),
                legacy_nodes_limit: true,
                ..MapQueryOptions::default()
            },
        )
    }

    /// Finds currently-visible elements by geometry.
    ///
    /// Matching is performed on nodes only; the result additionally
    /// carries the nodes' parent ways, those ways' parent relations and
    /// full node membership, and the nodes' parent relations, ordered as
    /// listed and de-duplicated by write sequence.
    pub fn find_by_geom(&self, rect: Rect, options: &MapQueryOptions) -> Result<Vec<Element>> {
        let legacy_cap = self.limits.map_query_legacy_nodes;
        let fetch_limit = if options.legacy_nodes_limit {
            // one extra row to detect ceiling overflow
            Some(legacy_cap + 1)
        } else {
            options.nodes_limit
        };

        // the snapshot and the matching nodes come from one table view
        let (at, nodes): (SequenceId, Vec<Element>) = {
            let table = self.elements.read();
            (table.current_sequence_id(), table.nodes_in_rect(&rect, fetch_limit))
        };
        if at == 0 || nodes.is_empty() {
            return Ok(Vec::new());
        }
        if options.legacy_nodes_limit && nodes.len() > legacy_cap {
            return Err(MapError::MapQueryNodesLimitExceeded);
        }

        let node_refs: Vec<ElementRef> = nodes.iter().map(|n| n.reff).collect();
        let node_ref_set: FxHashSet<ElementRef> = node_refs.iter().copied().collect();

        let ways = self.get_parents(&node_refs, Some(at), Some(ElementType::Way), None);
        let way_refs: Vec<ElementRef> = ways.iter().map(|w| w.reff).collect();
        let member_refs: Vec<ElementRef> = if options.partial_ways {
            Vec::new()
        } else {
            let mut seen: FxHashSet<ElementRef> = FxHashSet::default();
            ways.iter()
                .flat_map(|w| w.members.iter().map(|m| m.reff))
                .filter(|r| !node_ref_set.contains(r) && seen.insert(*r))
                .collect()
        };

        // independent sub-reads fan out; the snapshot pins them all
        let (way_relations, node_relations, way_nodes) = thread::scope(|scope| {
            let way_rel_handle = (options.include_relations && !way_refs.is_empty()).then(|| {
                scope.spawn(|| {
                    self.get_parents(&way_refs, Some(at), Some(ElementType::Relation), None)
                })
            });
            let node_rel_handle = options.include_relations.then(|| {
                scope.spawn(|| {
                    self.get_parents(&node_refs, Some(at), Some(ElementType::Relation), None)
                })
            });
            let way_nodes = if member_refs.is_empty() {
                Vec::new()
            } else {
                self.get_current(&member_refs, Some(at), false, Some(member_refs.len()))
            };
            let way_relations = match way_rel_handle {
                Some(handle) => handle
                    .join()
                    .map_err(|_| MapError::Internal("map query worker panicked"))?,
                None => Vec::new(),
            };
            let node_relations = match node_rel_handle {
                Some(handle) => handle
                    .join()
                    .map_err(|_| MapError::Internal("map query worker panicked"))?,
                None => Vec::new(),
            };
            Ok::<_, MapError>((way_relations, node_relations, way_nodes))
        })?;

        let mut seen: FxHashSet<SequenceId> = FxHashSet::default();
        let mut result: Vec<Element> = Vec::new();
        for element in nodes
            .into_iter()
            .chain(ways)
            .chain(way_relations)
            .chain(node_relations)
            .chain(way_nodes)
        {
            if seen.insert(element.sequence_id) {
                result.push(element);
            }
        }
        Ok(result)
    }
}
