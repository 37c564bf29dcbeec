//! Changeset, comment and subscription tables.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{Changeset, ChangesetComment, ChangesetId, TagMap, Timestamp, UserId};

#[derive(Default)]
pub(crate) struct ChangesetTable {
    changesets: FxHashMap<ChangesetId, Changeset>,
    /// `comments[i].id == i + 1`; append-only, ordered by id.
    comments: Vec<ChangesetComment>,
    subscribers: FxHashMap<ChangesetId, FxHashSet<UserId>>,
    next_changeset_id: ChangesetId,
}

impl ChangesetTable {
    /// Creates an open changeset and auto-subscribes its author.
    pub fn create(&mut self, user_id: UserId, tags: TagMap, now: Timestamp) -> ChangesetId {
        self.next_changeset_id += 1;
        let id = self.next_changeset_id;
        self.changesets
            .insert(id, Changeset::new(id, user_id, tags, now));
        self.subscribers.entry(id).or_default().insert(user_id);
        id
    }

    pub fn get(&self, id: ChangesetId) -> Option<&Changeset> {
        self.changesets.get(&id)
    }

    pub fn get_mut(&mut self, id: ChangesetId) -> Option<&mut Changeset> {
        self.changesets.get_mut(&id)
    }

    /// Replaces a changeset row wholesale; used by the diff applier, which
    /// has already verified `updated_at` did not drift.
    pub fn put(&mut self, changeset: Changeset) {
        self.changesets.insert(changeset.id, changeset);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Changeset> {
        self.changesets.values()
    }

    pub fn append_comment(
        &mut self,
        changeset_id: ChangesetId,
        user_id: UserId,
        body: String,
        now: Timestamp,
    ) -> ChangesetComment {
        let comment = ChangesetComment {
            id: self.comments.len() as u64 + 1,
            changeset_id,
            user_id,
            body,
            created_at: now,
            hidden: false,
        };
        self.comments.push(comment.clone());
        comment
    }

    pub fn comment_mut(&mut self, id: u64) -> Option<&mut ChangesetComment> {
        if id == 0 {
            return None;
        }
        self.comments.get_mut(id as usize - 1)
    }

    /// Discussion entries of one changeset, ordered by id, hidden
    /// comments excluded.
    pub fn comments_of(&self, changeset_id: ChangesetId) -> Vec<ChangesetComment> {
        self.comments
            .iter()
            .filter(|c| c.changeset_id == changeset_id && !c.hidden)
            .cloned()
            .collect()
    }

    pub fn subscribe(&mut self, changeset_id: ChangesetId, user_id: UserId) -> bool {
        self.subscribers
            .entry(changeset_id)
            .or_default()
            .insert(user_id)
    }

    pub fn unsubscribe(&mut self, changeset_id: ChangesetId, user_id: UserId) -> bool {
        self.subscribers
            .get_mut(&changeset_id)
            .map_or(false, |set| set.remove(&user_id))
    }

    pub fn is_subscribed(&self, changeset_id: ChangesetId, user_id: UserId) -> bool {
        self.subscribers
            .get(&changeset_id)
            .map_or(false, |set| set.contains(&user_id))
    }
}
