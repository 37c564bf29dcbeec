#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use time::macros::datetime;

use meridian::{
    Action, Actor, ChangesetId, Clock, Element, Limits, MapDb, Point, TagMap, Timestamp,
};

/// Deterministic test clock; advances only when told to.
pub struct TestClock {
    now: Mutex<Timestamp>,
}

impl TestClock {
    pub fn at(start: Timestamp) -> Arc<TestClock> {
        Arc::new(TestClock {
            now: Mutex::new(start),
        })
    }

    pub fn epoch() -> Arc<TestClock> {
        TestClock::at(datetime!(2024-01-01 00:00 UTC))
    }

    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock();
        *now += time::Duration::seconds(seconds);
    }
}

impl Clock for TestClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

pub fn db() -> MapDb {
    MapDb::new(Limits::default())
}

pub fn db_with_limits(limits: Limits) -> MapDb {
    MapDb::new(limits)
}

pub fn actor() -> Actor {
    Actor::new(1)
}

pub fn point(lon: f64, lat: f64) -> Point {
    Point::new(lon, lat).unwrap()
}

pub fn tags(entries: &[(&str, &str)]) -> TagMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn open_changeset(db: &MapDb, actor: &Actor) -> ChangesetId {
    db.create_changeset(actor, TagMap::new()).unwrap()
}

/// Creates one visible node and returns its assigned id.
pub fn create_node(
    db: &MapDb,
    actor: &Actor,
    changeset: ChangesetId,
    lon: f64,
    lat: f64,
) -> i64 {
    let node = Element::node(changeset, -1, 1, point(lon, lat), TagMap::new());
    let result = db.apply_diff(actor, &[Action::new(node)]).unwrap();
    result.entries[0].new_id
}

/// Creates one way over the given node ids and returns its assigned id.
pub fn create_way(
    db: &MapDb,
    actor: &Actor,
    changeset: ChangesetId,
    node_ids: Vec<i64>,
) -> i64 {
    let way = Element::way(changeset, -1, 1, node_ids, TagMap::new());
    let result = db.apply_diff(actor, &[Action::new(way)]).unwrap();
    result.entries[0].new_id
}
