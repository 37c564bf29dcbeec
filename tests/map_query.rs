mod common;

use common::*;

use meridian::{
    Action, Element, ElementRef, ElementType, MapError, MapQueryOptions, Member, Rect, Result,
    TagMap,
};

fn node_ref(id: i64) -> ElementRef {
    ElementRef::new(ElementType::Node, id)
}

fn kinds(elements: &[Element]) -> Vec<ElementType> {
    elements.iter().map(|e| e.reff.kind).collect()
}

/// A way crossing the box edge, with a relation on the way and another on
/// the inside node.
struct Fixture {
    inside: i64,
    outside: i64,
    way: i64,
    way_relation: i64,
    node_relation: i64,
}

fn build_fixture(db: &meridian::MapDb) -> Fixture {
    let actor = actor();
    let changeset = open_changeset(db, &actor);
    let inside = create_node(db, &actor, changeset, 0.5, 0.5);
    let outside = create_node(db, &actor, changeset, 30.0, 30.0);
    let way = create_way(db, &actor, changeset, vec![inside, outside]);

    let on_way = Element::relation(
        changeset,
        -1,
        1,
        vec![Member::new(ElementRef::new(ElementType::Way, way), "outer")],
        TagMap::new(),
    );
    let way_relation = db.apply_diff(&actor, &[Action::new(on_way)]).unwrap().entries[0].new_id;

    let on_node = Element::relation(
        changeset,
        -2,
        1,
        vec![Member::new(node_ref(inside), "stop")],
        TagMap::new(),
    );
    let node_relation = db.apply_diff(&actor, &[Action::new(on_node)]).unwrap().entries[0].new_id;

    Fixture {
        inside,
        outside,
        way,
        way_relation,
        node_relation,
    }
}

#[test]
fn bbox_query_returns_the_transitive_closure() -> Result<()> {
    let db = db();
    let f = build_fixture(&db);

    let rect = Rect::new(0.0, 0.0, 1.0, 1.0);
    let elements = db.find_by_geom(rect, &MapQueryOptions::default())?;

    let ids: Vec<(ElementType, i64)> = elements.iter().map(|e| (e.reff.kind, e.reff.id)).collect();
    assert!(ids.contains(&(ElementType::Node, f.inside)));
    assert!(ids.contains(&(ElementType::Way, f.way)));
    assert!(ids.contains(&(ElementType::Relation, f.way_relation)));
    assert!(ids.contains(&(ElementType::Relation, f.node_relation)));
    // the way's outside node is pulled in for full geometry
    assert!(ids.contains(&(ElementType::Node, f.outside)));
    assert_eq!(elements.len(), 5);

    // matching nodes come first, way nodes last
    assert_eq!(kinds(&elements)[0], ElementType::Node);
    assert_eq!(elements.last().map(|e| e.reff.id), Some(f.outside));
    Ok(())
}

#[test]
fn partial_ways_skip_outside_nodes() -> Result<()> {
    let db = db();
    let f = build_fixture(&db);
    let rect = Rect::new(0.0, 0.0, 1.0, 1.0);

    let elements = db.find_by_geom(
        rect,
        &MapQueryOptions {
            partial_ways: true,
            ..MapQueryOptions::default()
        },
    )?;
    let ids: Vec<i64> = elements.iter().map(|e| e.reff.id).collect();
    assert!(!ids.contains(&f.outside));
    Ok(())
}

#[test]
fn relations_can_be_excluded() -> Result<()> {
    let db = db();
    let f = build_fixture(&db);
    let rect = Rect::new(0.0, 0.0, 1.0, 1.0);

    let elements = db.find_by_geom(
        rect,
        &MapQueryOptions {
            include_relations: false,
            ..MapQueryOptions::default()
        },
    )?;
    assert!(elements.iter().all(|e| e.reff.kind != ElementType::Relation));
    assert!(elements.iter().any(|e| e.reff.id == f.way && e.reff.kind == ElementType::Way));
    Ok(())
}

#[test]
fn empty_store_returns_nothing() -> Result<()> {
    let db = db();
    let rect = Rect::new(0.0, 0.0, 0.4, 0.4);
    assert!(db.map_query(rect)?.is_empty());
    Ok(())
}

#[test]
fn hidden_nodes_are_not_matched() -> Result<()> {
    let db = db();
    let actor = actor();
    let changeset = open_changeset(&db, &actor);
    let id = create_node(&db, &actor, changeset, 0.1, 0.1);
    db.delete_element(&actor, node_ref(id).versioned(1), changeset)?;

    let rect = Rect::new(0.0, 0.0, 0.4, 0.4);
    assert!(db.map_query(rect)?.is_empty());
    Ok(())
}

#[test]
fn legacy_node_ceiling_fails_the_query() -> Result<()> {
    let limits = meridian::Limits {
        map_query_legacy_nodes: 2,
        ..meridian::Limits::default()
    };
    let db = db_with_limits(limits);
    let actor = actor();
    let changeset = open_changeset(&db, &actor);
    for i in 0..3 {
        create_node(&db, &actor, changeset, 0.1 * (i as f64 + 1.0), 0.1);
    }

    let rect = Rect::new(0.0, 0.0, 0.4, 0.4);
    let err = db.map_query(rect).unwrap_err();
    assert_eq!(err, MapError::MapQueryNodesLimitExceeded);
    assert_eq!(err.status(), 413);

    // without the legacy flag the same query succeeds
    let elements = db.find_by_geom(rect, &MapQueryOptions::default())?;
    assert_eq!(elements.len(), 3);

    // at the ceiling the legacy query still passes
    let narrow = Rect::new(0.0, 0.0, 0.25, 0.2);
    assert_eq!(db.map_query(narrow)?.len(), 2);
    Ok(())
}

#[test]
fn bbox_area_is_bounded() {
    let db = db();
    // 0.25 square degrees passes (empty result), a hair more fails
    assert!(db.map_query(Rect::new(0.0, 0.0, 0.5, 0.5)).is_ok());
    let err = db.map_query(Rect::new(0.0, 0.0, 0.5001, 0.5)).unwrap_err();
    assert_eq!(err, MapError::MapQueryAreaTooBig);
    assert_eq!(err.status(), 413);
}

#[test]
fn results_are_deduplicated_by_write_sequence() -> Result<()> {
    let db = db();
    let actor = actor();
    let changeset = open_changeset(&db, &actor);
    // both way nodes are inside the box, so the member fetch would
    // re-resolve them
    let a = create_node(&db, &actor, changeset, 0.1, 0.1);
    let b = create_node(&db, &actor, changeset, 0.2, 0.2);
    create_way(&db, &actor, changeset, vec![a, b]);

    let rect = Rect::new(0.0, 0.0, 0.4, 0.4);
    let elements = db.find_by_geom(rect, &MapQueryOptions::default())?;
    assert_eq!(elements.len(), 3);
    Ok(())
}
