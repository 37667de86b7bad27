//! The room directory: single owner of every room's state.
//!
//! Rooms live in a `DashMap`, each behind its own `Mutex`. An operation
//! holds the map guard for its room id and then that room's mutex until it
//! returns, so compound changes (release every lock of a departing user,
//! lock a batch of items, edit only if unlocked) are observed atomically,
//! while unrelated rooms proceed in parallel. No operation spans two rooms.

use crate::ids::{ItemId, RoomId};
use crate::item::{Item, ItemUpdate};
use crate::message::LockRequest;
use crate::room::Room;
use crate::user::{User, UserProfile};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Room id → room state, for one process.
///
/// `H` is the transport's per-user delivery handle.
pub struct RoomDirectory<H> {
    rooms: DashMap<RoomId, Mutex<Room<H>>>,
}

impl<H> Default for RoomDirectory<H> {
    fn default() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }
}

// Operations never leave a room half-modified before a panic point, so a
// poisoned mutex still guards consistent data.
fn lock<H>(room: &Mutex<Room<H>>) -> MutexGuard<'_, Room<H>> {
    room.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<H> RoomDirectory<H> {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_room<R>(&self, room_id: &str, f: impl FnOnce(&mut Room<H>) -> R) -> Option<R> {
        let entry = self.rooms.get(room_id)?;
        let mut room = lock(entry.value());
        Some(f(&mut room))
    }

    /// Ids of every tracked room, in no particular order.
    pub fn list_room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Number of members, or zero for an unknown room.
    pub fn user_count(&self, room_id: &str) -> usize {
        self.with_room(room_id, |room| room.users().len())
            .unwrap_or(0)
    }

    /// Create an empty room. No-op if it already exists.
    pub fn create_room(&self, room_id: impl Into<RoomId>) {
        if let Entry::Vacant(entry) = self.rooms.entry(room_id.into()) {
            tracing::debug!(room = %entry.key(), "room created");
            entry.insert(Mutex::new(Room::new()));
        }
    }

    /// Remove a room. Returns whether it existed.
    pub fn delete_room(&self, room_id: &str) -> bool {
        self.delete_room_with(room_id, |_| {})
    }

    /// Remove a room, calling `on_each_user` once per member.
    ///
    /// Current members are taken out of the room and called back before the
    /// room is removed. No directory lock is held during the callbacks, so
    /// they may call back into the directory. Anyone who joins while they
    /// run is called back after removal.
    pub fn delete_room_with(&self, room_id: &str, mut on_each_user: impl FnMut(&User<H>)) -> bool {
        let Some(members) = self.with_room(room_id, |room| room.take_users()) else {
            return false;
        };
        for user in &members {
            on_each_user(user);
        }

        if let Some((_, room)) = self.rooms.remove(room_id) {
            let room = room.into_inner().unwrap_or_else(PoisonError::into_inner);
            for user in &room.into_users() {
                on_each_user(user);
            }
        }
        tracing::debug!(room = %room_id, members = members.len(), "room deleted");
        true
    }

    /// Remove a room only if nobody is in it. Returns whether it was removed.
    pub fn delete_room_if_empty(&self, room_id: &str) -> bool {
        let removed = self
            .rooms
            .remove_if(room_id, |_, room| lock(room).is_empty())
            .is_some();
        if removed {
            tracing::debug!(room = %room_id, "empty room deleted");
        }
        removed
    }

    /// Add a member, creating the room first if needed.
    ///
    /// The caller guarantees the id is not already present in the room.
    pub fn add_user(&self, room_id: impl Into<RoomId>, user: User<H>) {
        self.add_user_with(room_id, user, |_| {});
    }

    /// Add a member, then run `on_joined` against the room before anyone
    /// else can touch it. Used to hand the newcomer a snapshot that is
    /// consistent with its own arrival.
    pub fn add_user_with<R>(
        &self,
        room_id: impl Into<RoomId>,
        user: User<H>,
        on_joined: impl FnOnce(&Room<H>) -> R,
    ) -> R {
        let room_id = room_id.into();
        tracing::debug!(room = %room_id, user = %user.id(), "user joined");
        let entry = self.rooms.entry(room_id).or_default();
        let mut room = lock(entry.value());
        room.add_user(user);
        on_joined(&room)
    }

    /// Shallow-merge `profile` into the member with the same id.
    ///
    /// Returns false if the room or the member does not exist. The
    /// connection handle is never touched.
    pub fn update_user(&self, room_id: &str, profile: UserProfile) -> bool {
        self.with_room(room_id, |room| room.update_user(profile))
            .unwrap_or(false)
    }

    /// Remove a member and release every lock they held, returning exactly
    /// the item ids that were unlocked.
    pub fn remove_user(&self, room_id: &str, user_id: &str) -> Vec<ItemId> {
        let released = self
            .with_room(room_id, |room| room.remove_user(user_id))
            .unwrap_or_default();
        tracing::debug!(room = %room_id, user = %user_id, released = released.len(), "user left");
        released
    }

    /// True if the item is unlocked or locked by `user_id`. False for an
    /// unknown room.
    pub fn can_edit_item(&self, room_id: &str, user_id: &str, item_id: &str) -> bool {
        self.with_room(room_id, |room| room.can_edit_item(user_id, item_id))
            .unwrap_or(false)
    }

    /// Apply a lock or unlock request and return the ids whose state
    /// changed. Ids already in the requested state, or locked by someone
    /// else, are left out.
    pub fn toggle_items_lock(
        &self,
        room_id: &str,
        user_id: &str,
        request: &LockRequest,
    ) -> Vec<ItemId> {
        let changed = self
            .with_room(room_id, |room| room.toggle_items_lock(user_id, request))
            .unwrap_or_default();
        tracing::debug!(
            room = %room_id,
            user = %user_id,
            state = ?request.lock_state,
            requested = request.item_ids.len(),
            changed = changed.len(),
            "lock toggled"
        );
        changed
    }

    /// Profiles of current members, for `init` snapshots.
    pub fn list_profiles(&self, room_id: &str) -> Vec<UserProfile> {
        self.with_room(room_id, |room| room.profiles())
            .unwrap_or_default()
    }

    /// Items on the room's board, in insertion order.
    pub fn list_items(&self, room_id: &str) -> Vec<Item> {
        self.with_room(room_id, |room| room.items().to_vec())
            .unwrap_or_default()
    }

    /// Put items on the board. Ids locked by someone other than `user_id`
    /// are skipped. Returns the items as stored.
    pub fn add_items(&self, room_id: &str, user_id: &str, items: Vec<Item>) -> Vec<Item> {
        self.with_room(room_id, |room| room.add_items(user_id, items))
            .unwrap_or_default()
    }

    /// Apply the updates `user_id` is allowed to make; returns those.
    pub fn update_items(
        &self,
        room_id: &str,
        user_id: &str,
        updates: Vec<ItemUpdate>,
    ) -> Vec<ItemUpdate> {
        self.with_room(room_id, |room| room.update_items(user_id, updates))
            .unwrap_or_default()
    }

    /// Delete the items `user_id` is allowed to edit; returns their ids.
    pub fn delete_items(&self, room_id: &str, user_id: &str, ids: Vec<ItemId>) -> Vec<ItemId> {
        self.with_room(room_id, |room| room.delete_items(user_id, ids))
            .unwrap_or_default()
    }
}

impl<H: Clone> RoomDirectory<H> {
    /// Current members in join order. Empty for an unknown room.
    pub fn list_users(&self, room_id: &str) -> Vec<User<H>> {
        self.with_room(room_id, |room| room.users().to_vec())
            .unwrap_or_default()
    }
}
