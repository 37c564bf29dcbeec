mod common;

use common::*;
use meridian::{
    Action, Actor, Element, ElementRef, ElementType, Limits, MapError, Member, Result, TagMap,
};

#[test]
fn create_node_assigns_id_and_maps_placeholder() -> Result<()> {
    let db = db();
    let actor = actor();
    let changeset = open_changeset(&db, &actor);

    let node = Element::node(changeset, -1, 1, point(13.4, 52.5), tags(&[("amenity", "bench")]));
    let result = db.apply_diff(&actor, &[Action::new(node)])?;

    assert_eq!(result.entries.len(), 1);
    let entry = &result.entries[0];
    assert_eq!(entry.old_id, -1);
    assert!(entry.new_id > 0);
    assert_eq!(entry.new_version, 1);

    let stored = db.read_element(ElementRef::new(ElementType::Node, entry.new_id))?;
    assert_eq!(stored.version, 1);
    assert_eq!(stored.tags["amenity"], "bench");
    assert!(stored.created_at.is_some());

    let cs = db.get_changeset(changeset)?;
    assert_eq!((cs.num_create, cs.num_modify, cs.num_delete), (1, 0, 0));
    assert_eq!(cs.size, 1);
    assert_eq!(cs.bounds.len(), 1);
    assert!(cs.bounds[0].contains(point(13.4, 52.5)));
    Ok(())
}

#[test]
fn create_way_over_in_diff_nodes() -> Result<()> {
    let db = db();
    let actor = actor();
    let changeset = open_changeset(&db, &actor);

    let actions = vec![
        Action::new(Element::node(changeset, -1, 1, point(0.0, 0.0), TagMap::new())),
        Action::new(Element::node(changeset, -2, 1, point(1.0, 1.0), TagMap::new())),
        Action::new(Element::way(changeset, -1, 1, vec![-1, -2], TagMap::new())),
    ];
    let result = db.apply_diff(&actor, &actions)?;
    assert_eq!(result.entries.len(), 3);

    let node_a = result.entries[0].new_id;
    let node_b = result.entries[1].new_id;
    let way_id = result.entries[2].new_id;
    assert_ne!(node_a, node_b);

    // members were remapped to the assigned node ids
    let way = db.read_element(ElementRef::new(ElementType::Way, way_id))?;
    assert_eq!(way.version, 1);
    let member_ids: Vec<i64> = way.members.iter().map(|m| m.reff.id).collect();
    assert_eq!(member_ids, vec![node_a, node_b]);

    let cs = db.get_changeset(changeset)?;
    assert!(cs.bounds.iter().any(|r| r.contains(point(0.0, 0.0))));
    assert!(cs.bounds.iter().any(|r| r.contains(point(1.0, 1.0))));
    Ok(())
}

#[test]
fn create_with_positive_id_is_rejected() {
    let db = db();
    let actor = actor();
    let changeset = open_changeset(&db, &actor);

    let node = Element::node(changeset, 17, 1, point(0.0, 0.0), TagMap::new());
    let err = db.apply_diff(&actor, &[Action::new(node)]).unwrap_err();
    assert!(matches!(err, MapError::DiffCreateBadId(_)));
    assert_eq!(err.status(), 400);
}

#[test]
fn duplicate_placeholder_create_conflicts() {
    let db = db();
    let actor = actor();
    let changeset = open_changeset(&db, &actor);

    let actions = vec![
        Action::new(Element::node(changeset, -1, 1, point(0.0, 0.0), TagMap::new())),
        Action::new(Element::node(changeset, -1, 1, point(1.0, 1.0), TagMap::new())),
    ];
    let err = db.apply_diff(&actor, &actions).unwrap_err();
    assert!(matches!(err, MapError::VersionConflict { .. }));
}

#[test]
fn foreign_and_missing_changesets_are_rejected() {
    let db = db();
    let owner = actor();
    let changeset = open_changeset(&db, &owner);

    let node = Element::node(changeset, -1, 1, point(0.0, 0.0), TagMap::new());
    let err = db
        .apply_diff(&Actor::new(2), &[Action::new(node.clone())])
        .unwrap_err();
    assert_eq!(err, MapError::ChangesetAccessDenied);
    assert_eq!(err.status(), 403);

    let mut orphan = node;
    orphan.changeset_id = 999;
    let err = db.apply_diff(&owner, &[Action::new(orphan)]).unwrap_err();
    assert_eq!(err, MapError::ChangesetNotFound(999));
    assert_eq!(err.status(), 404);
}

#[test]
fn diff_across_changesets_is_rejected() {
    let db = db();
    let actor = actor();
    let first = open_changeset(&db, &actor);
    let second = open_changeset(&db, &actor);

    let actions = vec![
        Action::new(Element::node(first, -1, 1, point(0.0, 0.0), TagMap::new())),
        Action::new(Element::node(second, -2, 1, point(1.0, 1.0), TagMap::new())),
    ];
    let err = db.apply_diff(&actor, &actions).unwrap_err();
    assert_eq!(err, MapError::DiffMultipleChangesets);
}

#[test]
fn changeset_cap_rejects_then_auto_closes() -> Result<()> {
    let limits = Limits {
        changeset_size_max: 3,
        ..Limits::default()
    };
    let db = db_with_limits(limits);
    let actor = actor();
    let changeset = open_changeset(&db, &actor);

    let batch = |count: usize| -> Vec<Action> {
        (0..count)
            .map(|i| {
                Action::new(Element::node(
                    changeset,
                    -(i as i64 + 1),
                    1,
                    point(i as f64 * 0.001, 0.0),
                    TagMap::new(),
                ))
            })
            .collect()
    };

    // one past the cap fails up front, nothing is written
    let err = db.apply_diff(&actor, &batch(4)).unwrap_err();
    assert_eq!(err, MapError::ChangesetTooBig(4));
    assert_eq!(err.status(), 413);
    assert_eq!(db.current_sequence_id(), 0);

    // exactly the cap succeeds and auto-closes the changeset
    db.apply_diff(&actor, &batch(3))?;
    let cs = db.get_changeset(changeset)?;
    assert_eq!(cs.size, 3);
    assert!(cs.closed_at.is_some());

    // the closed changeset rejects further writes
    let more = Action::new(Element::node(changeset, -1, 1, point(0.0, 0.0), TagMap::new()));
    let err = db.apply_diff(&actor, &[more]).unwrap_err();
    assert!(matches!(err, MapError::ChangesetAlreadyClosed { .. }));
    assert_eq!(err.status(), 409);
    Ok(())
}

#[test]
fn moderators_get_the_elevated_cap() -> Result<()> {
    let limits = Limits {
        changeset_size_max: 1,
        changeset_size_max_moderator: 2,
        ..Limits::default()
    };
    let db = db_with_limits(limits);
    let moderator = Actor::with_roles(1, vec![meridian::UserRole::Moderator]);
    let changeset = open_changeset(&db, &moderator);

    let actions = vec![
        Action::new(Element::node(changeset, -1, 1, point(0.0, 0.0), TagMap::new())),
        Action::new(Element::node(changeset, -2, 1, point(0.1, 0.1), TagMap::new())),
    ];
    db.apply_diff(&moderator, &actions)?;
    assert_eq!(db.get_changeset(changeset)?.size, 2);
    Ok(())
}

#[test]
fn empty_diff_is_a_no_op() -> Result<()> {
    let db = db();
    let result = db.apply_diff(&actor(), &[])?;
    assert!(result.entries.is_empty());
    assert_eq!(db.current_sequence_id(), 0);
    Ok(())
}

#[test]
fn relation_create_with_roles() -> Result<()> {
    let db = db();
    let actor = actor();
    let changeset = open_changeset(&db, &actor);
    let node = create_node(&db, &actor, changeset, 5.0, 5.0);

    let relation = Element::relation(
        changeset,
        -1,
        1,
        vec![Member::new(ElementRef::new(ElementType::Node, node), "stop")],
        tags(&[("type", "route")]),
    );
    let result = db.apply_diff(&actor, &[Action::new(relation)])?;
    let stored = db.read_element(ElementRef::new(ElementType::Relation, result.entries[0].new_id))?;
    assert_eq!(stored.members[0].role, "stop");
    Ok(())
}
