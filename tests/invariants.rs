mod common;

use common::*;

use proptest::prelude::*;

use meridian::{
    Action, Element, ElementRef, ElementType, MapDb, Member, TagMap,
};

/// A randomized single-node operation against a small id space.
#[derive(Debug, Clone)]
enum Op {
    Create { lon: f64, lat: f64 },
    Modify { slot: usize, lon: f64, lat: f64 },
    Delete { slot: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let coord = -80.0f64..80.0;
    prop_oneof![
        (coord.clone(), coord.clone()).prop_map(|(lon, lat)| Op::Create { lon, lat }),
        (0usize..8, coord.clone(), coord.clone())
            .prop_map(|(slot, lon, lat)| Op::Modify { slot, lon, lat }),
        (0usize..8).prop_map(|slot| Op::Delete { slot }),
    ]
}

/// Applies one op, translating slot indexes to created node ids; ops on
/// empty or exhausted slots are skipped.
fn apply_op(db: &MapDb, changeset: u64, created: &mut Vec<i64>, op: &Op) {
    let actor = actor();
    match *op {
        Op::Create { lon, lat } => {
            let node = Element::node(changeset, -1, 1, point(lon, lat), TagMap::new());
            let result = db.apply_diff(&actor, &[Action::new(node)]).unwrap();
            created.push(result.entries[0].new_id);
        }
        Op::Modify { slot, lon, lat } => {
            let Some(&id) = created.get(slot) else { return };
            let reff = ElementRef::new(ElementType::Node, id);
            let current = db.current_version(reff, None);
            let visible = db
                .get_current(&[reff], None, false, None)
                .pop()
                .map_or(false, |e| e.visible);
            if !visible {
                return;
            }
            let node = Element::node(changeset, id, current + 1, point(lon, lat), TagMap::new());
            db.apply_diff(&actor, &[Action::new(node)]).unwrap();
        }
        Op::Delete { slot } => {
            let Some(&id) = created.get(slot) else { return };
            let reff = ElementRef::new(ElementType::Node, id);
            let visible = db
                .get_current(&[reff], None, false, None)
                .pop()
                .map_or(false, |e| e.visible);
            if !visible {
                return;
            }
            let current = db.current_version(reff, None);
            let tombstone = Element::tombstone(ElementType::Node, changeset, id, current + 1);
            db.apply_diff(&actor, &[Action::new(tombstone)]).unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// After any sequence of operations: versions are contiguous from 1
    /// with exactly one current row, tombstones are empty, counters add
    /// up, and every applied row carries a timestamp.
    #[test]
    fn histories_uphold_the_core_invariants(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let db = db();
        let actor = actor();
        let changeset = db.create_changeset(&actor, TagMap::new()).unwrap();
        let mut created: Vec<i64> = Vec::new();
        for op in &ops {
            apply_op(&db, changeset, &mut created, op);
        }

        for &id in &created {
            let reff = ElementRef::new(ElementType::Node, id);
            let history = db.get_versions(reff, None, None, true, None);
            prop_assert!(!history.is_empty());

            let versions: Vec<u64> = history.iter().map(|e| e.version).collect();
            let expected: Vec<u64> = (1..=history.len() as u64).collect();
            prop_assert_eq!(versions, expected);

            let currents = history.iter().filter(|e| e.next_sequence_id.is_none()).count();
            prop_assert_eq!(currents, 1);

            for element in &history {
                prop_assert!(element.created_at.is_some());
                prop_assert!(element.sequence_id > 0);
                if !element.visible {
                    prop_assert!(element.tags.is_empty());
                    prop_assert!(element.point.is_none());
                    prop_assert!(element.members.is_empty());
                }
                if element.version == 1 {
                    prop_assert!(element.visible);
                }
            }
        }

        let cs = db.get_changeset(changeset).unwrap();
        prop_assert_eq!(cs.size, cs.num_create + cs.num_modify + cs.num_delete);
        prop_assert_eq!(cs.size, db.current_sequence_id());
    }
}

#[test]
fn current_way_members_stay_visible() -> meridian::Result<()> {
    let db = db();
    let actor = actor();
    let changeset = open_changeset(&db, &actor);
    let a = create_node(&db, &actor, changeset, 0.0, 0.0);
    let b = create_node(&db, &actor, changeset, 1.0, 1.0);
    let c = create_node(&db, &actor, changeset, 2.0, 2.0);
    let way = create_way(&db, &actor, changeset, vec![a, b]);

    // rewire the way, then the orphaned node can go
    let next = Element::way(changeset, way, 2, vec![a, c], TagMap::new());
    db.apply_diff(&actor, &[Action::new(next)])?;
    db.delete_element(
        &actor,
        ElementRef::new(ElementType::Node, b).versioned(1),
        changeset,
    )?;

    // every member of every current visible way resolves to a current
    // visible node
    let ways = db.get_current(&[ElementRef::new(ElementType::Way, way)], None, false, None);
    for way in ways.iter().filter(|w| w.visible) {
        for Member { reff, .. } in &way.members {
            let member = db.get_current(&[*reff], None, false, None).pop();
            assert!(member.map_or(false, |m| m.visible));
        }
    }
    Ok(())
}
