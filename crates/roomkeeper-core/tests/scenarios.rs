//! End-to-end behaviour of the room directory through its public API.

use roomkeeper_core::{ItemId, LockRequest, LockState, RoomDirectory, RoomId, User, UserProfile};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
struct Conn(u32);

fn member(id: &str, conn: u32) -> User<Conn> {
    User::new(UserProfile::new(id), Conn(conn))
}

#[test]
fn lock_released_when_holder_leaves() {
    let dir = RoomDirectory::new();
    dir.create_room("r1");
    dir.add_user("r1", member("u1", 1));

    assert_eq!(dir.toggle_items_lock("r1", "u1", &LockRequest::lock(["a"])), ["a"]);
    assert!(!dir.can_edit_item("r1", "u2", "a"));

    assert_eq!(dir.remove_user("r1", "u1"), ["a"]);
    assert!(dir.can_edit_item("r1", "u2", "a"));
}

#[test]
fn remove_user_twice_releases_nothing_the_second_time() {
    let dir = RoomDirectory::new();
    dir.add_user("r1", member("u1", 1));
    dir.toggle_items_lock("r1", "u1", &LockRequest::lock(["a", "b"]));

    assert_eq!(dir.remove_user("r1", "u1").len(), 2);
    assert!(dir.remove_user("r1", "u1").is_empty());
}

#[test]
fn foreign_lock_never_granted() {
    let dir = RoomDirectory::new();
    dir.add_user("r1", member("u1", 1));
    dir.add_user("r1", member("u2", 2));

    dir.toggle_items_lock("r1", "u1", &LockRequest::lock(["a"]));
    let got = dir.toggle_items_lock("r1", "u2", &LockRequest::lock(["a"]));

    assert!(!got.contains(&ItemId::new("a")));
    assert!(dir.can_edit_item("r1", "u1", "a"));
}

#[test]
fn unlocking_never_locked_item_is_a_no_op() {
    let dir = RoomDirectory::new();
    dir.add_user("r1", member("u1", 1));
    dir.add_user("r1", member("u2", 2));
    dir.toggle_items_lock("r1", "u2", &LockRequest::lock(["b"]));

    assert!(dir.toggle_items_lock("r1", "u1", &LockRequest::unlock(["a", "b"])).is_empty());
    assert!(dir.can_edit_item("r1", "u1", "a"));
    assert!(!dir.can_edit_item("r1", "u1", "b"));
}

#[test]
fn update_user_merges_and_keeps_connection() {
    let dir = RoomDirectory::new();
    let mut profile = UserProfile::new("u1").with_name("Ada");
    profile.extra.insert("color".into(), serde_json::json!("teal"));
    dir.add_user("r1", User::new(profile, Conn(7)));

    assert!(dir.update_user("r1", UserProfile::new("u1").with_name("Grace")));

    let users = dir.list_users("r1");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].handle, Conn(7));
    assert_eq!(users[0].profile.name(), Some("Grace"));
    assert_eq!(users[0].profile.extra["color"], serde_json::json!("teal"));
}

#[test]
fn delete_room_calls_back_once_per_member_before_removal() {
    let dir = RoomDirectory::new();
    dir.add_user("r1", member("u1", 1));
    dir.add_user("r1", member("u2", 2));
    dir.add_user("r2", member("u3", 3));

    let mut seen = Vec::new();
    assert!(dir.delete_room_with("r1", |user| seen.push(user.handle.clone())));

    assert_eq!(seen, [Conn(1), Conn(2)]);
    assert_eq!(dir.list_room_ids(), vec![RoomId::new("r2")]);
    assert!(dir.list_users("r1").is_empty());
}

#[test]
fn lock_map_never_double_maps() {
    let dir = RoomDirectory::new();
    let users = ["u1", "u2", "u3"];
    for (n, id) in users.iter().enumerate() {
        dir.add_user("r1", member(id, n as u32));
    }

    // Mirror of the lock map, rebuilt only from what the directory reports.
    let mut holders: HashMap<ItemId, &str> = HashMap::new();
    let items = ["a", "b", "c", "d"];

    for step in 0..60usize {
        let user = users[step % users.len()];
        let pick = [items[step % items.len()], items[(step * 7 + 1) % items.len()]];
        let request = if step % 3 == 0 {
            LockRequest::unlock(pick)
        } else {
            LockRequest::lock(pick)
        };

        for id in dir.toggle_items_lock("r1", user, &request) {
            match request.lock_state {
                LockState::Locked => {
                    assert!(holders.insert(id, user).is_none(), "item locked twice");
                }
                LockState::Unlocked => {
                    assert_eq!(holders.remove(&id), Some(user));
                }
            }
        }

        for item in items {
            for candidate in users {
                let expected = holders.get(item).is_none_or(|holder| *holder == candidate);
                assert_eq!(dir.can_edit_item("r1", candidate, item), expected);
            }
        }
    }
}
