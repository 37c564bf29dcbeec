//! Changeset lifecycle: create, tag updates, close, discussion,
//! subscriptions.

use tracing::debug;

use crate::error::{MapError, Result};
use crate::model::{
    validate_tags, Actor, Changeset, ChangesetComment, ChangesetId, TagMap,
};
use crate::store::MapDb;

impl MapDb {
    /// Creates an open changeset for the actor and auto-subscribes them.
    pub fn create_changeset(&self, actor: &Actor, tags: TagMap) -> Result<ChangesetId> {
        validate_tags(&tags, &self.limits)?;
        let now = self.clock.now();
        let mut table = self.changesets.write();
        let id = table.create(actor.user_id, tags, now);
        debug!("created changeset {id} for user {}", actor.user_id);
        Ok(id)
    }

    pub fn get_changeset(&self, id: ChangesetId) -> Result<Changeset> {
        self.changesets
            .read()
            .get(id)
            .cloned()
            .ok_or(MapError::ChangesetNotFound(id))
    }

    /// Discussion entries of a changeset, ordered by id; hidden comments
    /// are excluded.
    pub fn get_changeset_comments(&self, id: ChangesetId) -> Result<Vec<ChangesetComment>> {
        let table = self.changesets.read();
        table
            .get(id)
            .ok_or(MapError::ChangesetNotFound(id))?;
        Ok(table.comments_of(id))
    }

    /// Replaces a changeset's tags. Only the owner may update; closed
    /// changesets reject the write.
    pub fn update_changeset_tags(
        &self,
        actor: &Actor,
        id: ChangesetId,
        tags: TagMap,
    ) -> Result<Changeset> {
        validate_tags(&tags, &self.limits)?;
        let now = self.clock.now();
        let mut table = self.changesets.write();
        let changeset = table.get_mut(id).ok_or(MapError::ChangesetNotFound(id))?;
        if changeset.user_id != actor.user_id {
            return Err(MapError::ChangesetAccessDenied);
        }
        if let Some(closed_at) = changeset.closed_at {
            return Err(MapError::ChangesetAlreadyClosed { id, closed_at });
        }
        changeset.tags = tags;
        changeset.updated_at = now;
        Ok(changeset.clone())
    }

    /// Closes a changeset. Only the owner may close; closing twice fails.
    pub fn close_changeset(&self, actor: &Actor, id: ChangesetId) -> Result<()> {
        let now = self.clock.now();
        let mut table = self.changesets.write();
        let changeset = table.get_mut(id).ok_or(MapError::ChangesetNotFound(id))?;
        if changeset.user_id != actor.user_id {
            return Err(MapError::ChangesetAccessDenied);
        }
        if let Some(closed_at) = changeset.closed_at {
            return Err(MapError::ChangesetAlreadyClosed { id, closed_at });
        }
        changeset.closed_at = Some(now);
        changeset.updated_at = now;
        debug!("closed changeset {id}");
        Ok(())
    }

    /// Appends a discussion comment. Any authenticated user may comment;
    /// the changeset's `updated_at` advances.
    pub fn comment_changeset(
        &self,
        actor: &Actor,
        id: ChangesetId,
        body: &str,
    ) -> Result<ChangesetComment> {
        if body.trim().is_empty() {
            return Err(MapError::BadComment("comment body cannot be empty"));
        }
        if body.len() > self.limits.changeset_comment_max_len {
            return Err(MapError::BadComment("comment body is too long"));
        }
        let now = self.clock.now();
        let mut table = self.changesets.write();
        let changeset = table.get_mut(id).ok_or(MapError::ChangesetNotFound(id))?;
        changeset.num_comments += 1;
        changeset.updated_at = now;
        Ok(table.append_comment(id, actor.user_id, body.to_owned(), now))
    }

    /// Logically hides a comment. Moderators only.
    pub fn hide_changeset_comment(&self, actor: &Actor, comment_id: u64) -> Result<()> {
        if !actor.is_moderator() {
            return Err(MapError::ModeratorRequired);
        }
        let mut table = self.changesets.write();
        let comment = table
            .comment_mut(comment_id)
            .ok_or(MapError::CommentNotFound(comment_id))?;
        let changeset_id = comment.changeset_id;
        comment.hidden = true;
        if let Some(changeset) = table.get_mut(changeset_id) {
            changeset.num_comments = changeset.num_comments.saturating_sub(1);
        }
        Ok(())
    }

    pub fn subscribe_changeset(&self, actor: &Actor, id: ChangesetId) -> Result<()> {
        let mut table = self.changesets.write();
        table.get(id).ok_or(MapError::ChangesetNotFound(id))?;
        if !table.subscribe(id, actor.user_id) {
            return Err(MapError::AlreadySubscribed(id));
        }
        Ok(())
    }

    pub fn unsubscribe_changeset(&self, actor: &Actor, id: ChangesetId) -> Result<()> {
        let mut table = self.changesets.write();
        table.get(id).ok_or(MapError::ChangesetNotFound(id))?;
        if !table.unsubscribe(id, actor.user_id) {
            return Err(MapError::NotSubscribed(id));
        }
        Ok(())
    }
}
