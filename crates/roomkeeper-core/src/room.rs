//! State of a single room.
//!
//! `Room` has no interior locking. `RoomDirectory` wraps each one in a mutex
//! and calls into it for the whole of an operation, which is what makes the
//! compound methods below atomic.

use crate::ids::{ItemId, UserId};
use crate::item::{Item, ItemUpdate};
use crate::message::{LockRequest, LockState};
use crate::user::{User, UserProfile};
use std::collections::HashMap;

#[derive(Debug)]
pub struct Room<H> {
    users: Vec<User<H>>,
    locked_items: HashMap<ItemId, UserId>,
    items: Vec<Item>,
}

impl<H> Default for Room<H> {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            locked_items: HashMap::new(),
            items: Vec::new(),
        }
    }
}

impl<H> Room<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> &[User<H>] {
        &self.users
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn profiles(&self) -> Vec<UserProfile> {
        self.users.iter().map(|u| u.profile.clone()).collect()
    }

    pub fn lock_holder(&self, item_id: &str) -> Option<&UserId> {
        self.locked_items.get(item_id)
    }

    pub fn locked_items(&self) -> &HashMap<ItemId, UserId> {
        &self.locked_items
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Append a member. Id uniqueness is the caller's responsibility.
    pub fn add_user(&mut self, user: User<H>) {
        self.users.push(user);
    }

    pub fn update_user(&mut self, profile: UserProfile) -> bool {
        match self.users.iter_mut().find(|u| u.profile.id == profile.id) {
            Some(user) => {
                user.profile.merge(profile);
                true
            }
            None => false,
        }
    }

    /// Drop the member and every lock they hold. Returns the released ids.
    pub fn remove_user(&mut self, user_id: &str) -> Vec<ItemId> {
        self.users.retain(|u| u.profile.id.as_str() != user_id);

        let mut released = Vec::new();
        self.locked_items.retain(|item_id, holder| {
            if holder.as_str() == user_id {
                released.push(item_id.clone());
                false
            } else {
                true
            }
        });
        released
    }

    pub fn can_edit_item(&self, user_id: &str, item_id: &str) -> bool {
        match self.locked_items.get(item_id) {
            None => true,
            Some(holder) => holder == user_id,
        }
    }

    /// Apply each requested transition that is currently allowed and return
    /// the ids whose lock state actually changed.
    pub fn toggle_items_lock(&mut self, user_id: &str, request: &LockRequest) -> Vec<ItemId> {
        let mut changed = Vec::new();
        for item_id in &request.item_ids {
            let applied = match request.lock_state {
                LockState::Locked => {
                    if self.locked_items.contains_key(item_id) {
                        false
                    } else {
                        self.locked_items.insert(item_id.clone(), UserId::from(user_id));
                        true
                    }
                }
                LockState::Unlocked => {
                    if self.lock_holder(item_id.as_str()).is_some_and(|holder| holder == user_id) {
                        self.locked_items.remove(item_id);
                        true
                    } else {
                        false
                    }
                }
            };
            if applied {
                changed.push(item_id.clone());
            }
        }
        changed
    }

    /// Insert items, replacing any with the same id in place. Replacing is
    /// an edit, so ids locked by someone else are skipped. Items without a
    /// creation date get one.
    pub fn add_items(&mut self, user_id: &str, items: Vec<Item>) -> Vec<Item> {
        let mut added = Vec::with_capacity(items.len());
        for mut item in items {
            if !self.can_edit_item(user_id, item.id.as_str()) {
                continue;
            }
            item.stamp();
            match self.items.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => *existing = item.clone(),
                None => self.items.push(item.clone()),
            }
            added.push(item);
        }
        added
    }

    /// Merge updates into items the user may edit. Updates for unknown or
    /// foreign-locked items are dropped.
    pub fn update_items(&mut self, user_id: &str, updates: Vec<ItemUpdate>) -> Vec<ItemUpdate> {
        let mut applied = Vec::new();
        for mut update in updates {
            if !self.can_edit_item(user_id, update.id.as_str()) {
                continue;
            }
            if let Some(item) = self.items.iter_mut().find(|i| i.id == update.id) {
                update.drop_invalid_creation_date();
                item.merge(&update);
                applied.push(update);
            }
        }
        applied
    }

    /// Take every member out, leaving the room empty of users.
    pub fn take_users(&mut self) -> Vec<User<H>> {
        std::mem::take(&mut self.users)
    }

    pub fn into_users(self) -> Vec<User<H>> {
        self.users
    }

    /// Remove items the user may edit, releasing the caller's lock on each.
    pub fn delete_items(&mut self, user_id: &str, ids: Vec<ItemId>) -> Vec<ItemId> {
        let mut removed = Vec::new();
        for id in ids {
            if !self.can_edit_item(user_id, id.as_str()) {
                continue;
            }
            let before = self.items.len();
            self.items.retain(|item| item.id != id);
            if self.items.len() != before {
                self.locked_items.remove(&id);
                removed.push(id);
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn room_with(users: &[&str]) -> Room<()> {
        let mut room = Room::new();
        for id in users {
            room.add_user(User::new(UserProfile::new(*id), ()));
        }
        room
    }

    #[test]
    fn lock_then_unlock() {
        let mut room = room_with(&["u1"]);
        let u1 = UserId::new("u1");

        assert_eq!(room.toggle_items_lock("u1", &LockRequest::lock(["a", "b"])), ["a", "b"]);
        assert_eq!(room.lock_holder("a"), Some(&u1));

        assert_eq!(room.toggle_items_lock("u1", &LockRequest::unlock(["a"])), ["a"]);
        assert_eq!(room.lock_holder("a"), None);
        assert_eq!(room.lock_holder("b"), Some(&u1));
    }

    #[test]
    fn relocking_own_item_is_skipped() {
        let mut room = room_with(&["u1"]);
        let u1 = UserId::new("u1");

        room.toggle_items_lock("u1", &LockRequest::lock(["a"]));
        assert!(room.toggle_items_lock("u1", &LockRequest::lock(["a"])).is_empty());
        assert_eq!(room.lock_holder("a"), Some(&u1));
    }

    #[test]
    fn partial_lock_reports_only_changes() {
        let mut room = room_with(&["u1", "u2"]);
        room.toggle_items_lock("u1", &LockRequest::lock(["a"]));

        let got = room.toggle_items_lock("u2", &LockRequest::lock(["a", "b"]));
        assert_eq!(got, ["b"]);
        assert_eq!(room.lock_holder("a"), Some(&UserId::new("u1")));
    }

    #[test]
    fn cannot_unlock_foreign_lock() {
        let mut room = room_with(&["u1", "u2"]);
        room.toggle_items_lock("u1", &LockRequest::lock(["a"]));

        assert!(room.toggle_items_lock("u2", &LockRequest::unlock(["a"])).is_empty());
        assert_eq!(room.lock_holder("a"), Some(&UserId::new("u1")));
    }

    #[test]
    fn remove_user_releases_only_their_locks() {
        let mut room = room_with(&["u1", "u2"]);
        room.toggle_items_lock("u1", &LockRequest::lock(["a", "b"]));
        room.toggle_items_lock("u2", &LockRequest::lock(["c"]));

        let mut released = room.remove_user("u1");
        released.sort();
        assert_eq!(released, ["a", "b"]);
        assert_eq!(room.users().len(), 1);
        assert_eq!(room.locked_items().len(), 1);
        assert_eq!(room.lock_holder("c"), Some(&UserId::new("u2")));
    }

    #[test]
    fn add_items_stamps_and_replaces() {
        let mut room = room_with(&[]);
        let added = room.add_items("u1", vec![Item::new("a").with_field("x", 1)]);
        assert!(added[0].creation_date.is_some());

        room.add_items("u1", vec![Item::new("b"), Item::new("a").with_field("x", 9)]);
        let ids: Vec<_> = room.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(room.items()[0].fields["x"], json!(9));
    }

    #[test]
    fn update_items_respects_locks() {
        let mut room = room_with(&["u1", "u2"]);
        room.add_items("u1", vec![Item::new("a"), Item::new("b")]);
        room.toggle_items_lock("u1", &LockRequest::lock(["a"]));

        let applied = room.update_items(
            "u2",
            vec![
                ItemUpdate::new("a").with_field("x", 1),
                ItemUpdate::new("b").with_field("x", 2),
                ItemUpdate::new("missing").with_field("x", 3),
            ],
        );

        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].id, "b");
        assert!(!room.items()[0].fields.contains_key("x"));
        assert_eq!(room.items()[1].fields["x"], json!(2));
    }

    #[test]
    fn delete_items_drops_own_lock() {
        let mut room = room_with(&["u1", "u2"]);
        room.add_items("u1", vec![Item::new("a"), Item::new("b")]);
        room.toggle_items_lock("u1", &LockRequest::lock(["a"]));
        room.toggle_items_lock("u2", &LockRequest::lock(["b"]));

        let removed = room.delete_items("u1", vec![ItemId::new("a"), ItemId::new("b")]);
        assert_eq!(removed, ["a"]);
        assert_eq!(room.lock_holder("a"), None);
        assert_eq!(room.items().len(), 1);
    }

    #[test]
    fn add_items_cannot_replace_foreign_locked_item() {
        let mut room = room_with(&["u1", "u2"]);
        room.add_items("u1", vec![Item::new("a").with_field("x", 1)]);
        room.toggle_items_lock("u1", &LockRequest::lock(["a"]));

        let added = room.add_items(
            "u2",
            vec![Item::new("a").with_field("x", 999), Item::new("b")],
        );

        assert_eq!(added.len(), 1);
        assert_eq!(added[0].id, "b");
        assert_eq!(room.items()[0].fields["x"], json!(1));

        let added = room.add_items("u1", vec![Item::new("a").with_field("x", 2)]);
        assert_eq!(added.len(), 1);
        assert_eq!(room.items()[0].fields["x"], json!(2));
    }

    #[test]
    fn update_with_bad_creation_date_drops_that_key() {
        let mut room = room_with(&["u1"]);
        room.add_items("u1", vec![Item::new("a")]);
        let stamped = room.items()[0].creation_date;

        let applied = room.update_items(
            "u1",
            vec![
                ItemUpdate::new("a")
                    .with_field("creationDate", "yesterday-ish")
                    .with_field("x", 4),
            ],
        );

        assert_eq!(applied.len(), 1);
        assert!(!applied[0].fields.contains_key("creationDate"));
        assert_eq!(applied[0].fields["x"], json!(4));
        assert_eq!(room.items()[0].creation_date, stamped);
    }

    #[test]
    fn take_users_keeps_the_board() {
        let mut room = room_with(&["u1", "u2"]);
        room.add_items("u1", vec![Item::new("a")]);

        let taken = room.take_users();
        assert_eq!(taken.len(), 2);
        assert!(room.is_empty());
        assert_eq!(room.items().len(), 1);
    }
}
