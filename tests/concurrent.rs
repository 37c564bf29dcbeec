mod common;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Barrier};
use std::thread;

use common::*;

use meridian::{
    Action, Actor, Element, ElementRef, ElementType, MapError, Result, TagMap,
};

fn node_ref(id: i64) -> ElementRef {
    ElementRef::new(ElementType::Node, id)
}

#[test]
fn version_race_commits_exactly_one_writer() -> Result<()> {
    let db = Arc::new(db());
    let actor = actor();
    let changeset = open_changeset(&db, &actor);
    let id = create_node(&db, &actor, changeset, 0.0, 0.0);

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for worker in 0..2u8 {
        let db = Arc::clone(&db);
        let barrier = Arc::clone(&barrier);
        let actor = actor.clone();
        handles.push(thread::spawn(move || {
            let modified = Element::node(
                changeset,
                id,
                2,
                point(f64::from(worker) + 1.0, 0.0),
                TagMap::new(),
            );
            barrier.wait();
            db.apply_diff(&actor, &[Action::new(modified)])
        }));
    }
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let committed = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1);
    let loser = outcomes.iter().find(|r| r.is_err()).unwrap();
    match loser {
        Err(MapError::VersionConflict {
            reff,
            provided,
            current,
        }) => {
            assert_eq!(*reff, node_ref(id));
            assert_eq!(*provided, 2);
            assert_eq!(*current, 2);
        }
        other => panic!("expected a version conflict, got {other:?}"),
    }

    assert_eq!(db.current_version(node_ref(id), None), 2);
    Ok(())
}

#[test]
fn concurrent_creates_get_distinct_ids() -> Result<()> {
    let db = Arc::new(db());
    let barrier = Arc::new(Barrier::new(4));
    let mut handles = Vec::new();
    for user in 1..=4u64 {
        let db = Arc::clone(&db);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let actor = Actor::new(user);
            let changeset = db.create_changeset(&actor, TagMap::new()).unwrap();
            let node = Element::node(
                changeset,
                -1,
                1,
                point(user as f64, user as f64),
                TagMap::new(),
            );
            barrier.wait();
            db.apply_diff(&actor, &[Action::new(node)])
                .map(|r| r.entries[0].new_id)
        }));
    }
    let mut ids: Vec<i64> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4);
    Ok(())
}

#[test]
fn parallel_edits_to_one_changeset_converge() -> Result<()> {
    let db = Arc::new(db());
    let actor = actor();
    let changeset = open_changeset(&db, &actor);

    let workers = 4;
    let per_worker = 5;
    let barrier = Arc::new(Barrier::new(workers));
    let mut handles = Vec::new();
    for worker in 0..workers {
        let db = Arc::clone(&db);
        let barrier = Arc::clone(&barrier);
        let actor = actor.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..per_worker {
                let lon = worker as f64 + i as f64 * 0.01;
                let node = Element::node(changeset, -1, 1, point(lon, 0.0), TagMap::new());
                db.apply_diff(&actor, &[Action::new(node)]).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let total = (workers * per_worker) as u64;
    let cs = db.get_changeset(changeset)?;
    assert_eq!(cs.size, total);
    assert_eq!(cs.num_create, total);
    assert_eq!(db.current_sequence_id(), total);

    // every created node has exactly one row, still current
    for element in db.get_by_changeset(changeset, meridian::ChangesetOrder::ById) {
        assert_eq!(element.version, 1);
        assert!(element.next_sequence_id.is_none());
    }
    Ok(())
}

#[test]
fn racing_delete_and_reference_never_both_commit() -> Result<()> {
    let db = Arc::new(db());
    let actor = actor();
    let changeset = open_changeset(&db, &actor);
    let a = create_node(&db, &actor, changeset, 0.0, 0.0);
    let b = create_node(&db, &actor, changeset, 1.0, 1.0);

    let barrier = Arc::new(Barrier::new(2));

    let deleter = {
        let db = Arc::clone(&db);
        let barrier = Arc::clone(&barrier);
        let actor = actor.clone();
        thread::spawn(move || {
            barrier.wait();
            db.apply_diff(
                &actor,
                &[Action::new(Element::tombstone(
                    ElementType::Node,
                    changeset,
                    a,
                    2,
                ))],
            )
        })
    };
    let referencer = {
        let db = Arc::clone(&db);
        let barrier = Arc::clone(&barrier);
        let actor = actor.clone();
        thread::spawn(move || {
            barrier.wait();
            let way = Element::way(changeset, -1, 1, vec![a, b], TagMap::new());
            db.apply_diff(&actor, &[Action::new(way)])
        })
    };
    let delete_outcome = deleter.join().unwrap();
    let reference_outcome = referencer.join().unwrap();

    let node_hidden = !db
        .get_current(&[node_ref(a)], None, false, None)
        .pop()
        .map_or(false, |e| e.visible);

    // linearizable outcomes only: whichever committed first excludes the
    // other; they can never both land
    match (delete_outcome.is_ok(), reference_outcome.is_ok()) {
        (true, false) => assert!(node_hidden),
        (false, true) => assert!(!node_hidden),
        (true, true) | (false, false) => panic!("non-linearizable outcome"),
    }
    Ok(())
}

#[test]
fn cancellation_is_honored() {
    let db = db();
    let actor = actor();
    let changeset = open_changeset(&db, &actor);
    let cancel = AtomicBool::new(true);

    let node = Element::node(changeset, -1, 1, point(0.0, 0.0), TagMap::new());
    let err = db
        .apply_diff_cancellable(&actor, &[Action::new(node)], &cancel)
        .unwrap_err();
    assert_eq!(err, MapError::Cancelled);
    assert_eq!(db.current_sequence_id(), 0);
}
